use crate::diagram::DiagramSpec;
use crate::tickets::TicketPlan;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

// ---------------------------------------------------------------------------
// Use cases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseCase {
    pub id: String,
    pub title: String,
    pub primary_actor: String,
    pub description: String,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub main_flow: Vec<String>,
    #[serde(default)]
    pub alternative_flows: Vec<String>,
    #[serde(default)]
    pub postconditions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UseCaseSet {
    #[serde(default)]
    pub use_cases: Vec<UseCase>,
}

impl UseCaseSet {
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for uc in &self.use_cases {
            let _ = writeln!(out, "## {}: {}\n", uc.id, uc.title);
            let _ = writeln!(out, "**Primary actor:** {}\n", uc.primary_actor);
            let _ = writeln!(out, "{}\n", uc.description);
            section(&mut out, "Preconditions", &uc.preconditions, false);
            section(&mut out, "Main flow", &uc.main_flow, true);
            section(&mut out, "Alternative flows", &uc.alternative_flows, false);
            section(&mut out, "Postconditions", &uc.postconditions, false);
        }
        out
    }
}

fn section(out: &mut String, title: &str, items: &[String], numbered: bool) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "### {title}\n");
    for (i, item) in items.iter().enumerate() {
        if numbered {
            let _ = writeln!(out, "{}. {item}", i + 1);
        } else {
            let _ = writeln!(out, "- {item}");
        }
    }
    out.push('\n');
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// One generated output of the fan-out stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Artifact {
    Text(String),
    UseCases(UseCaseSet),
    Diagram(DiagramSpec),
    Tickets(TicketPlan),
}

impl Artifact {
    /// Contents written to disk under [`crate::types::GenerationKind::file_name`].
    pub fn file_contents(&self) -> serde_json::Result<String> {
        match self {
            Artifact::Text(t) => Ok(t.clone()),
            Artifact::UseCases(u) => serde_json::to_string_pretty(u),
            Artifact::Diagram(d) => serde_json::to_string_pretty(d),
            Artifact::Tickets(t) => serde_json::to_string_pretty(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login() -> UseCase {
        UseCase {
            id: "UC-001".into(),
            title: "Log in with second factor".into(),
            primary_actor: "Registered user".into(),
            description: "User proves identity with password and OTP".into(),
            preconditions: vec!["Account has 2FA enabled".into()],
            main_flow: vec!["Enter password".into(), "Enter OTP".into()],
            alternative_flows: vec![],
            postconditions: vec!["Session created".into()],
        }
    }

    #[test]
    fn decodes_with_missing_lists() {
        let set: UseCaseSet = serde_json::from_str(
            r#"{"use_cases": [{"id": "UC-1", "title": "t", "primary_actor": "a", "description": "d"}]}"#,
        )
        .unwrap();
        assert!(set.use_cases[0].main_flow.is_empty());
    }

    #[test]
    fn markdown_numbers_main_flow_and_skips_empty_sections() {
        let md = UseCaseSet {
            use_cases: vec![login()],
        }
        .to_markdown();
        assert!(md.starts_with("## UC-001: Log in with second factor"));
        assert!(md.contains("1. Enter password\n2. Enter OTP"));
        assert!(!md.contains("Alternative flows"));
    }

    #[test]
    fn text_artifact_is_written_verbatim() {
        assert_eq!(Artifact::Text("# Tests".into()).file_contents().unwrap(), "# Tests");
    }
}
