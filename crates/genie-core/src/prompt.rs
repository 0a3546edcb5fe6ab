//! Pure prompt construction.
//!
//! Every function here is deterministic in its inputs and performs no I/O.
//! A missing required field is a [`GenieError::Configuration`], never a
//! silently empty prompt.

use crate::error::{GenieError, Result};
use crate::types::{ApplicationType, CloudProvider};
use genie_agent::ChatMessage;

// ---------------------------------------------------------------------------
// PromptKind / PromptContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Elaboration,
    Feedback,
    Evaluation,
    UseCases,
    Tests,
    Code,
    Diagram,
    Tickets,
    Repair,
    Review,
    Advice,
}

impl PromptKind {
    fn name(self) -> &'static str {
        match self {
            PromptKind::Elaboration => "elaboration",
            PromptKind::Feedback => "feedback",
            PromptKind::Evaluation => "evaluation",
            PromptKind::UseCases => "use_cases",
            PromptKind::Tests => "tests",
            PromptKind::Code => "code",
            PromptKind::Diagram => "diagram",
            PromptKind::Tickets => "tickets",
            PromptKind::Repair => "repair",
            PromptKind::Review => "review",
            PromptKind::Advice => "advice",
        }
    }
}

/// Inputs a prompt may draw from. Each [`PromptKind`] requires a subset.
#[derive(Debug, Clone, Default)]
pub struct PromptContext<'a> {
    pub requirement: Option<&'a str>,
    pub application_type: Option<ApplicationType>,
    pub language: Option<&'a str>,
    pub document: Option<&'a str>,
    pub feedback: Option<&'a str>,
    pub improvement_areas: &'a [String],
    pub cloud: Option<CloudProvider>,
    pub source: Option<&'a str>,
    pub error: Option<&'a str>,
    pub profile: Option<&'a str>,
    pub person: Option<&'a str>,
    pub message: Option<&'a str>,
    pub history: &'a [ChatMessage],
}

fn require<'a>(value: Option<&'a str>, field: &str, kind: PromptKind) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(GenieError::Configuration(format!(
            "{} prompt requires '{field}'",
            kind.name()
        ))),
    }
}

fn require_copy<T: Copy>(value: Option<T>, field: &str, kind: PromptKind) -> Result<T> {
    value.ok_or_else(|| {
        GenieError::Configuration(format!("{} prompt requires '{field}'", kind.name()))
    })
}

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Instruction appended to prompts so output is produced in `language`.
pub fn language_instruction(language: &str) -> String {
    match language.trim() {
        "" | "English" => "Generate all content in English.".to_string(),
        "Japanese" => "すべてのコンテンツを日本語で生成してください。\
                       専門用語も日本語で適切に翻訳してください。"
            .to_string(),
        "Italian" => "Genera tutti i contenuti in italiano, \
                      con i termini tecnici tradotti appropriatamente."
            .to_string(),
        other => format!("Generate all content in {other}."),
    }
}

fn with_language(body: String, language: Option<&str>) -> String {
    format!("{body}\n\n{}", language_instruction(language.unwrap_or("English")))
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// build_prompt
// ---------------------------------------------------------------------------

pub fn build_prompt(kind: PromptKind, ctx: &PromptContext<'_>) -> Result<String> {
    let prompt = match kind {
        PromptKind::Elaboration => {
            let requirement = require(ctx.requirement, "requirement", kind)?;
            let app = require_copy(ctx.application_type, "application_type", kind)?;
            with_language(
                format!(
                    "Brief Requirement: {requirement}\nApplication Type: {app}\n\n\
                     Please elaborate this brief requirement into a detailed functional \
                     requirements document."
                ),
                ctx.language,
            )
        }
        PromptKind::Feedback => {
            let feedback = require(ctx.feedback, "feedback", kind)?;
            let mut body = format!(
                "Please improve the requirements document based on this feedback:\n\n{feedback}"
            );
            if !ctx.improvement_areas.is_empty() {
                body.push_str("\n\nAreas to improve:\n");
                body.push_str(&bullet_list(ctx.improvement_areas));
            }
            with_language(body, ctx.language)
        }
        PromptKind::Evaluation => {
            let document = require(ctx.document, "document", kind)?;
            format!("Review this requirements document:\n\n{document}")
        }
        PromptKind::UseCases => {
            let document = require(ctx.document, "document", kind)?;
            with_language(
                format!(
                    "Based on the following requirements document, create detailed use cases \
                     that capture the key user interactions and system behaviors:\n\n{document}\n\n\
                     Please identify and create all necessary use cases to fully cover the \
                     functional requirements."
                ),
                ctx.language,
            )
        }
        PromptKind::Tests => {
            let document = require(ctx.document, "document", kind)?;
            with_language(
                format!(
                    "Create comprehensive test cases that verify every functional and \
                     non-functional requirement in this document:\n\n{document}"
                ),
                ctx.language,
            )
        }
        PromptKind::Code => {
            let document = require(ctx.document, "document", kind)?;
            let app = require_copy(ctx.application_type, "application_type", kind)?;
            let cloud = require_copy(ctx.cloud, "cloud", kind)?;
            with_language(
                format!(
                    "Application Type: {app}\nCloud Environment: {cloud}\n\n\
                     Generate sample code that demonstrates how these requirements could be \
                     implemented:\n\n{document}"
                ),
                ctx.language,
            )
        }
        PromptKind::Diagram => {
            let document = require(ctx.document, "document", kind)?;
            let cloud = require_copy(ctx.cloud, "cloud", kind)?;
            let app = ctx.application_type.unwrap_or_default();
            format!(
                "Application Type: {app}\nCloud Environment: {cloud}\n\n\
                 Design a cloud architecture diagram for the requirements below. Use only node \
                 classes that exist in the `{}` package, one import per line.\n\n{document}",
                cloud.diagrams_package()
            )
        }
        PromptKind::Tickets => {
            let document = require(ctx.document, "document", kind)?;
            format!(
                "Create Jira tickets for the following requirements analysis. Only create \
                 tickets that trace back to these requirements.\n\n{document}"
            )
        }
        PromptKind::Repair => {
            let error = require(ctx.error, "error", kind)?;
            let source = require(ctx.source, "source", kind)?;
            format!(
                "I tried to generate the following architecture diagram code, but it has a \
                 validation error:\n\nERROR: {error}\n\nHere is the code that needs to be \
                 fixed:\n\n```python\n{source}\n```\n\nPlease correct the code to fix this \
                 specific error. Make sure all import statements are on separate lines and follow \
                 proper Python syntax. Keep the original diagram logic and components intact.\n\n\
                 Return ONLY the corrected code without explanations."
            )
        }
        PromptKind::Review => {
            let source = require(ctx.source, "source", kind)?;
            let document = require(ctx.document, "document", kind)?;
            format!(
                "Review this code against the requirements it implements.\n\n\
                 REQUIREMENTS:\n{document}\n\nCODE:\n{source}"
            )
        }
        PromptKind::Advice => {
            let profile = require(ctx.profile, "profile", kind)?;
            let message = require(ctx.message, "message", kind)?;
            let person = ctx.person.unwrap_or("this person");
            let history = if ctx.history.is_empty() {
                "No previous messages".to_string()
            } else {
                format_history(ctx.history)
            };
            format!(
                "PERSONALITY PROFILE:\n{profile}\n\nUSER MESSAGE: {message}\n\n\
                 PREVIOUS CONVERSATION:\n{history}\n\n\
                 Provide specific, actionable advice that helps the user communicate more \
                 effectively with {person}."
            )
        }
    };
    Ok(prompt)
}

fn format_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|m| {
            let who = match m.role {
                genie_agent::Role::User => "User",
                _ => "Assistant",
            };
            format!("{who}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Handoff
// ---------------------------------------------------------------------------

/// Rewrite a finished elaboration into a fresh conversation for the use-case
/// agent. Only the document itself crosses over; the refinement history and
/// evaluator exchanges do not.
pub fn build_handoff_context(prior_document: &str, language: &str) -> Result<Vec<ChatMessage>> {
    let ctx = PromptContext {
        document: Some(prior_document),
        language: Some(language),
        ..Default::default()
    };
    Ok(vec![ChatMessage::user(build_prompt(PromptKind::UseCases, &ctx)?)])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn elaboration_ctx<'a>() -> PromptContext<'a> {
        PromptContext {
            requirement: Some("Add two-factor authentication to login"),
            application_type: Some(ApplicationType::WebApplication),
            language: Some("English"),
            ..Default::default()
        }
    }

    #[test]
    fn elaboration_embeds_requirement_and_app_type() {
        let p = build_prompt(PromptKind::Elaboration, &elaboration_ctx()).unwrap();
        assert!(p.starts_with("Brief Requirement: Add two-factor authentication to login\n"));
        assert!(p.contains("Application Type: Web Application"));
        assert!(p.ends_with("Generate all content in English."));
    }

    #[test]
    fn prompts_are_deterministic() {
        let a = build_prompt(PromptKind::Elaboration, &elaboration_ctx()).unwrap();
        let b = build_prompt(PromptKind::Elaboration, &elaboration_ctx()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_requirement_is_configuration_error() {
        let ctx = PromptContext {
            requirement: Some("   "),
            ..elaboration_ctx()
        };
        let err = build_prompt(PromptKind::Elaboration, &ctx).unwrap_err();
        assert!(matches!(err, GenieError::Configuration(ref m) if m.contains("requirement")));
    }

    #[test]
    fn missing_app_type_is_configuration_error() {
        let ctx = PromptContext {
            application_type: None,
            ..elaboration_ctx()
        };
        assert!(build_prompt(PromptKind::Elaboration, &ctx).is_err());
    }

    #[test]
    fn feedback_lists_improvement_areas() {
        let areas = vec!["SMS fallback".to_string(), "Lockout policy".to_string()];
        let ctx = PromptContext {
            feedback: Some("add SMS fallback detail"),
            improvement_areas: &areas,
            ..Default::default()
        };
        let p = build_prompt(PromptKind::Feedback, &ctx).unwrap();
        assert!(p.contains("based on this feedback:\n\nadd SMS fallback detail"));
        assert!(p.contains("Areas to improve:\n- SMS fallback\n- Lockout policy"));
    }

    #[test]
    fn evaluation_has_no_language_suffix() {
        let ctx = PromptContext {
            document: Some("# Doc"),
            language: Some("Japanese"),
            ..Default::default()
        };
        let p = build_prompt(PromptKind::Evaluation, &ctx).unwrap();
        assert_eq!(p, "Review this requirements document:\n\n# Doc");
    }

    #[test]
    fn language_instruction_known_and_fallback() {
        assert!(language_instruction("Italian").contains("italiano"));
        assert!(language_instruction("Japanese").contains("日本語"));
        assert_eq!(language_instruction("German"), "Generate all content in German.");
    }

    #[test]
    fn repair_prompt_embeds_error_and_source() {
        let ctx = PromptContext {
            error: Some("Invalid import format"),
            source: Some("from diagrams import"),
            ..Default::default()
        };
        let p = build_prompt(PromptKind::Repair, &ctx).unwrap();
        assert!(p.contains("ERROR: Invalid import format"));
        assert!(p.contains("```python\nfrom diagrams import\n```"));
    }

    #[test]
    fn diagram_prompt_names_provider_package() {
        let ctx = PromptContext {
            document: Some("doc"),
            cloud: Some(CloudProvider::Aws),
            ..Default::default()
        };
        let p = build_prompt(PromptKind::Diagram, &ctx).unwrap();
        assert!(p.contains("`diagrams.aws`"));
    }

    #[test]
    fn handoff_produces_single_user_message() {
        let msgs = build_handoff_context("## Requirements\n- FR-1", "Italian").unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, genie_agent::Role::User);
        assert!(msgs[0].content.contains("## Requirements\n- FR-1"));
        assert!(msgs[0].content.contains("italiano"));
    }

    #[test]
    fn handoff_rejects_empty_document() {
        assert!(build_handoff_context("", "English").is_err());
    }

    #[test]
    fn advice_without_history_says_so() {
        let ctx = PromptContext {
            profile: Some("DISC Type: D"),
            message: Some("How do I open?"),
            person: Some("Ada"),
            ..Default::default()
        };
        let p = build_prompt(PromptKind::Advice, &ctx).unwrap();
        assert!(p.contains("No previous messages"));
        assert!(p.ends_with("communicate more effectively with Ada."));
    }
}
