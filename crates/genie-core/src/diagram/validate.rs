use super::catalog::{
    class_hint, gcp_case_fix, gcp_classes, invalid_module_hint, Introspection, ModuleIntrospector,
};
use crate::error::ValidationError;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Imports that never need checking.
const KNOWN_GOOD_IMPORTS: &[&str] = &[
    "from diagrams import Diagram",
    "from diagrams import Cluster",
    "from diagrams import Edge",
    "from diagrams import Diagram, Cluster",
    "from diagrams import Diagram, Edge",
    "from diagrams import Cluster, Edge",
    "from diagrams import Diagram, Cluster, Edge",
    "from diagrams import Diagram, Edge, Cluster",
    "from diagrams import Cluster, Diagram",
    "from diagrams import Cluster, Diagram, Edge",
    "from diagrams import Edge, Diagram",
    "from diagrams import Edge, Diagram, Cluster",
    "from diagrams import Edge, Cluster, Diagram",
    "from diagrams import Cluster, Edge, Diagram",
];

const BASIC_CLASSES: &[&str] = &["Diagram", "Cluster", "Edge"];

fn import_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^from\s+([\w.]+)\s+import\s+([\w,\s]+)$").unwrap())
}

fn from_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bfrom\s+").unwrap())
}

fn reversed_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^import\s+([\w,\s]+?)\s+from\s+([\w.]+)").unwrap())
}

/// Checks generated diagram source before it is executed. Must be
/// idempotent: validating the same source twice yields the same verdict.
#[async_trait]
pub trait SourceValidator: Send + Sync {
    async fn validate(&self, source: &str) -> Result<(), ValidationError>;
}

/// One `from M import A, B` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub module: String,
    pub classes: Vec<String>,
    pub line: String,
}

/// Validates the import section of diagram source: static rules first,
/// then the GCP catalog, then (optionally) live introspection for modules
/// the catalog does not cover.
pub struct ImportValidator {
    introspector: Option<Arc<dyn ModuleIntrospector>>,
}

impl ImportValidator {
    pub fn static_only() -> Self {
        Self { introspector: None }
    }

    pub fn with_introspector(introspector: Arc<dyn ModuleIntrospector>) -> Self {
        Self {
            introspector: Some(introspector),
        }
    }
}

#[async_trait]
impl SourceValidator for ImportValidator {
    async fn validate(&self, source: &str) -> Result<(), ValidationError> {
        let pending = check_static(source)?;
        let Some(introspector) = &self.introspector else {
            return Ok(());
        };
        for import in pending {
            match introspector.introspect(&import.module).await {
                Introspection::Classes(exported) => {
                    if let Some(missing) = import.classes.iter().find(|c| !exported.contains(c)) {
                        return Err(ValidationError::at_line(
                            format!(
                                "Module '{}' does not contain class '{}'. {}",
                                import.module,
                                missing,
                                class_hint(&import.module, missing)
                            ),
                            import.line.clone(),
                        ));
                    }
                }
                Introspection::ModuleNotFound => {
                    return Err(ValidationError::at_line(
                        format!(
                            "Module not found: '{}'. Check the documentation for the correct module path",
                            import.module
                        ),
                        import.line.clone(),
                    ));
                }
                Introspection::Unavailable(reason) => {
                    tracing::warn!(module = %import.module, %reason, "skipping import introspection");
                }
            }
        }
        Ok(())
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => line[..i].trim_end(),
        None => line,
    }
}

fn split_classes(list: &str) -> Vec<String> {
    list.split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

fn parse_import(line: &str) -> Option<ImportRef> {
    let caps = import_line_re().captures(line)?;
    Some(ImportRef {
        module: caps[1].to_string(),
        classes: split_classes(&caps[2]),
        line: line.to_string(),
    })
}

/// Rewrites a line holding several `from` statements as one per line.
fn split_merged_imports(line: &str) -> Vec<String> {
    let starts: Vec<usize> = from_keyword_re().find_iter(line).map(|m| m.start()).collect();
    let mut out = Vec::new();
    for (i, start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(line.len());
        if let Some(import) = parse_import(line[*start..end].trim()) {
            out.push(format!("from {} import {}", import.module, import.classes.join(", ")));
        }
    }
    out
}

/// Runs every rule that needs no interpreter. Returns the imports that
/// the catalog could not vouch for; an empty list means the source is
/// fully checked.
pub fn check_static(source: &str) -> Result<Vec<ImportRef>, ValidationError> {
    let mut imports = Vec::new();

    for raw in source.lines() {
        let line = strip_comment(raw.trim());
        if line.is_empty() || KNOWN_GOOD_IMPORTS.contains(&line) {
            continue;
        }

        if line.matches("from ").count() > 1 && line.contains("import ") {
            let splits = split_merged_imports(line);
            let mut message = format!(
                "Syntax error: Found multiple 'from' statements on the same line. Each import \
                 should be on its own line.\n\nProblematic line: '{line}'"
            );
            if !splits.is_empty() {
                message.push_str("\n\nFix by replacing with:\n");
                message.push_str(&splits.join("\n"));
            }
            return Err(ValidationError::at_line(message, line));
        }

        if let Some(caps) = reversed_import_re().captures(line) {
            let classes = split_classes(&caps[1]).join(", ");
            let module = &caps[2];
            return Err(ValidationError::at_line(
                format!(
                    "Syntax error: Incorrect import format. Use separate import statements on \
                     different lines:\nfrom diagrams import Diagram, Cluster\nfrom {module} import {classes}"
                ),
                line,
            ));
        }

        if line.starts_with("from ") {
            let Some(import) = parse_import(line) else {
                return Err(ValidationError::at_line(
                    format!(
                        "Invalid import format: '{line}'. Use the format 'from module import class1, class2'."
                    ),
                    line,
                ));
            };
            if let Some((bad, hint)) = invalid_module_hint(&import.module) {
                return Err(ValidationError::at_line(
                    format!("Invalid module path: '{bad}' does not exist. {hint}"),
                    line,
                ));
            }
            imports.push(import);
        }
    }

    // Only top-level imports: nothing to look up.
    if imports.iter().all(|i| i.module == "diagrams") {
        return Ok(Vec::new());
    }

    let mut pending = Vec::new();
    for import in imports {
        if import.module == "diagrams" {
            if let Some(c) = import.classes.iter().find(|c| !BASIC_CLASSES.contains(&c.as_str())) {
                pending.push(ImportRef {
                    module: import.module.clone(),
                    classes: vec![c.clone()],
                    line: import.line.clone(),
                });
            }
            continue;
        }
        let Some(known) = gcp_classes(&import.module) else {
            pending.push(import);
            continue;
        };
        for class in &import.classes {
            if known.contains(&class.as_str()) {
                continue;
            }
            let message = match gcp_case_fix(class) {
                Some(fixed) if fixed != class => format!(
                    "Case sensitivity issue: Use '{fixed}' instead of '{class}' in {}",
                    import.module
                ),
                _ => format!(
                    "Module '{}' does not contain class '{class}'. Available classes are: {}",
                    import.module,
                    known.join(", ")
                ),
            };
            return Err(ValidationError::at_line(message, import.line.clone()));
        }
    }
    Ok(pending)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
