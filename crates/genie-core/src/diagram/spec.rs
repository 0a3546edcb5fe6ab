use crate::error::ValidationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::OnceLock;

/// Import every generated source starts with.
pub const BASE_IMPORT: &str = "from diagrams import Diagram, Cluster, Edge";

const INDENT: &str = "    ";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_attrs: Option<BTreeMap<String, String>>,
}

/// Structured description of an architecture diagram, produced by the
/// diagram agent and turned into `diagrams` source by [`DiagramSpec::to_source`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiagramSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub clusters: Vec<ClusterSpec>,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
}

static IDENT_RE: OnceLock<Regex> = OnceLock::new();

fn ident_re() -> &'static Regex {
    IDENT_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

fn check_ident(what: &str, value: &str) -> Result<(), ValidationError> {
    if ident_re().is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "{what} '{value}' is not a valid Python identifier"
        )))
    }
}

fn py_str(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{escaped}\"")
}

impl DiagramSpec {
    // -----------------------------------------------------------------------
    // Reference checks
    // -----------------------------------------------------------------------

    /// Check names are unique identifiers and every reference resolves.
    pub fn check_references(&self) -> Result<(), ValidationError> {
        let mut clusters: HashMap<&str, &ClusterSpec> = HashMap::new();
        for c in &self.clusters {
            check_ident("cluster name", &c.name)?;
            if clusters.insert(c.name.as_str(), c).is_some() {
                return Err(ValidationError::new(format!(
                    "cluster '{}' is declared more than once",
                    c.name
                )));
            }
        }
        for c in &self.clusters {
            if let Some(parent) = &c.parent {
                if !clusters.contains_key(parent.as_str()) {
                    return Err(ValidationError::new(format!(
                        "cluster '{}' has unknown parent '{parent}'",
                        c.name
                    )));
                }
            }
            // Walk to the root; revisiting a cluster means a cycle.
            let mut seen = HashSet::new();
            let mut cur = Some(c);
            while let Some(cl) = cur {
                if !seen.insert(cl.name.as_str()) {
                    return Err(ValidationError::new(format!(
                        "cluster '{}' is part of a parent cycle",
                        c.name
                    )));
                }
                cur = cl.parent.as_deref().and_then(|p| clusters.get(p).copied());
            }
        }

        let mut nodes = HashSet::new();
        for n in &self.nodes {
            check_ident("node name", &n.name)?;
            check_ident("node type", &n.node_type)?;
            if !nodes.insert(n.name.as_str()) {
                return Err(ValidationError::new(format!(
                    "node '{}' is declared more than once",
                    n.name
                )));
            }
            if let Some(cluster) = &n.cluster {
                if !clusters.contains_key(cluster.as_str()) {
                    return Err(ValidationError::new(format!(
                        "node '{}' references unknown cluster '{cluster}'",
                        n.name
                    )));
                }
            }
        }

        for conn in &self.connections {
            for end in [&conn.from, &conn.to] {
                if !nodes.contains(end.as_str()) {
                    return Err(ValidationError::new(format!(
                        "connection {} -> {} references undeclared node '{end}'",
                        conn.from, conn.to
                    )));
                }
            }
            if let Some(attrs) = &conn.edge_attrs {
                for key in attrs.keys() {
                    check_ident("edge attribute", key)?;
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Source generation
    // -----------------------------------------------------------------------

    /// Render this diagram as `diagrams` source that writes `<output_stem>.png`
    /// into the working directory it runs in.
    pub fn to_source(&self, title: &str, output_stem: &str) -> Result<String, ValidationError> {
        self.check_references()?;

        let mut out = String::new();
        out.push_str(BASE_IMPORT);
        out.push('\n');
        let mut seen = HashSet::from([BASE_IMPORT.to_string()]);
        for imp in &self.imports {
            let imp = imp.trim();
            if !imp.is_empty() && seen.insert(imp.to_string()) {
                out.push_str(imp);
                out.push('\n');
            }
        }

        let _ = writeln!(
            out,
            "\nwith Diagram({}, show=False, filename={}, outformat=\"png\", direction=\"LR\"):",
            py_str(title),
            py_str(output_stem)
        );

        let mut body = String::new();
        for n in self.nodes.iter().filter(|n| n.cluster.is_none()) {
            write_node(&mut body, n, 1);
        }
        for c in self.clusters.iter().filter(|c| c.parent.is_none()) {
            self.write_cluster(&mut body, c, 1);
        }
        for conn in &self.connections {
            body.push_str(INDENT);
            body.push_str(&conn.from);
            body.push_str(" >> ");
            if let Some(attrs) = conn.edge_attrs.as_ref().filter(|a| !a.is_empty()) {
                let args: Vec<String> = attrs
                    .iter()
                    .map(|(k, v)| format!("{k}={}", py_str(v)))
                    .collect();
                let _ = write!(body, "Edge({}) >> ", args.join(", "));
            }
            body.push_str(&conn.to);
            body.push('\n');
        }
        if body.is_empty() {
            body.push_str(INDENT);
            body.push_str("pass\n");
        }
        out.push_str(&body);
        Ok(out)
    }

    fn write_cluster(&self, out: &mut String, cluster: &ClusterSpec, depth: usize) {
        let pad = INDENT.repeat(depth);
        let _ = writeln!(out, "{pad}with Cluster({}):", py_str(&cluster.label));
        let before = out.len();
        for n in self
            .nodes
            .iter()
            .filter(|n| n.cluster.as_deref() == Some(cluster.name.as_str()))
        {
            write_node(out, n, depth + 1);
        }
        for child in self
            .clusters
            .iter()
            .filter(|c| c.parent.as_deref() == Some(cluster.name.as_str()))
        {
            self.write_cluster(out, child, depth + 1);
        }
        if out.len() == before {
            let _ = writeln!(out, "{pad}{INDENT}pass");
        }
    }
}

fn write_node(out: &mut String, node: &NodeSpec, depth: usize) {
    let _ = writeln!(
        out,
        "{}{} = {}({})",
        INDENT.repeat(depth),
        node.name,
        node.node_type,
        py_str(&node.label)
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, ty: &str, cluster: Option<&str>) -> NodeSpec {
        NodeSpec {
            name: name.into(),
            node_type: ty.into(),
            label: name.to_uppercase(),
            cluster: cluster.map(Into::into),
        }
    }

    fn sample() -> DiagramSpec {
        DiagramSpec {
            imports: vec![
                "from diagrams.gcp.compute import Run".into(),
                "from diagrams.gcp.database import SQL".into(),
            ],
            nodes: vec![
                node("lb", "LoadBalancing", None),
                node("api", "Run", Some("backend")),
                node("db", "SQL", Some("data")),
            ],
            clusters: vec![
                ClusterSpec {
                    name: "backend".into(),
                    label: "Backend".into(),
                    parent: None,
                },
                ClusterSpec {
                    name: "data".into(),
                    label: "Data \"tier\"".into(),
                    parent: Some("backend".into()),
                },
            ],
            connections: vec![
                ConnectionSpec {
                    from: "lb".into(),
                    to: "api".into(),
                    edge_attrs: None,
                },
                ConnectionSpec {
                    from: "api".into(),
                    to: "db".into(),
                    edge_attrs: Some(BTreeMap::from([("label".to_string(), "SQL".to_string())])),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn deserializes_agent_json() {
        let spec: DiagramSpec = serde_json::from_str(
            r#"{"imports": ["from diagrams.gcp.compute import Run"],
                "nodes": [{"name": "api", "type": "Run", "label": "API"}],
                "connections": [{"from": "api", "to": "api"}]}"#,
        )
        .unwrap();
        assert_eq!(spec.nodes[0].node_type, "Run");
        assert!(spec.clusters.is_empty());
        assert!(spec.check_references().is_ok());
    }

    #[test]
    fn source_has_base_import_header_and_nesting() {
        let src = sample().to_source("Checkout", "diagram_abc").unwrap();
        let lines: Vec<&str> = src.lines().collect();
        assert_eq!(lines[0], BASE_IMPORT);
        assert_eq!(lines[1], "from diagrams.gcp.compute import Run");
        assert!(src.contains(
            "with Diagram(\"Checkout\", show=False, filename=\"diagram_abc\", outformat=\"png\", direction=\"LR\"):"
        ));
        assert!(src.contains("    lb = LoadBalancing(\"LB\")\n"));
        assert!(src.contains("    with Cluster(\"Backend\"):\n        api = Run(\"API\")\n"));
        assert!(src.contains("        with Cluster(\"Data \\\"tier\\\"\"):\n            db = SQL(\"DB\")\n"));
        assert!(src.contains("    lb >> api\n"));
        assert!(src.contains("    api >> Edge(label=\"SQL\") >> db\n"));
    }

    #[test]
    fn duplicate_imports_are_emitted_once() {
        let mut spec = sample();
        spec.imports.push(BASE_IMPORT.into());
        spec.imports.push("from diagrams.gcp.compute import Run".into());
        let src = spec.to_source("t", "d").unwrap();
        assert_eq!(src.matches("import Run").count(), 1);
        assert_eq!(src.matches(BASE_IMPORT).count(), 1);
    }

    #[test]
    fn empty_spec_still_produces_valid_block() {
        let src = DiagramSpec::default().to_source("t", "d").unwrap();
        assert!(src.trim_end().ends_with("pass"));
    }

    #[test]
    fn empty_cluster_gets_pass() {
        let spec = DiagramSpec {
            clusters: vec![ClusterSpec {
                name: "empty".into(),
                label: "Empty".into(),
                parent: None,
            }],
            ..Default::default()
        };
        let src = spec.to_source("t", "d").unwrap();
        assert!(src.contains("    with Cluster(\"Empty\"):\n        pass\n"));
    }

    #[test]
    fn connection_to_undeclared_node_is_rejected() {
        let mut spec = sample();
        spec.connections.push(ConnectionSpec {
            from: "api".into(),
            to: "cache".into(),
            edge_attrs: None,
        });
        let err = spec.check_references().unwrap_err();
        assert!(err.message.contains("'cache'"));
    }

    #[test]
    fn node_in_unknown_cluster_is_rejected() {
        let mut spec = sample();
        spec.nodes.push(node("q", "PubSub", Some("messaging")));
        assert!(spec.check_references().unwrap_err().message.contains("messaging"));
    }

    #[test]
    fn duplicate_node_names_are_rejected() {
        let mut spec = sample();
        spec.nodes.push(node("api", "Run", None));
        assert!(spec.check_references().is_err());
    }

    #[test]
    fn parent_cycle_is_rejected() {
        let spec = DiagramSpec {
            clusters: vec![
                ClusterSpec {
                    name: "a".into(),
                    label: "A".into(),
                    parent: Some("b".into()),
                },
                ClusterSpec {
                    name: "b".into(),
                    label: "B".into(),
                    parent: Some("a".into()),
                },
            ],
            ..Default::default()
        };
        assert!(spec.check_references().unwrap_err().message.contains("cycle"));
    }

    #[test]
    fn non_identifier_names_are_rejected() {
        let mut spec = sample();
        spec.nodes.push(node("web-app", "Run", None));
        assert!(spec.check_references().is_err());
    }
}
