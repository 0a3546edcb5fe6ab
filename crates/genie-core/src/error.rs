use genie_agent::AgentError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A static check on a generated artifact failed.
///
/// `message` is embedded verbatim in repair prompts, so it is written for a
/// model as much as for a human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offending_line: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offending_line: None,
        }
    }

    pub fn at_line(message: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offending_line: Some(line.into()),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Error)]
pub enum GenieError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("agent output did not match the expected schema: {message}\n  raw: {raw}")]
    SchemaDecode { message: String, raw: String },

    #[error("validation failed: {0}")]
    Validation(ValidationError),

    #[error("render failed: {0}")]
    Render(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("guardrail '{guardrail}' tripped: {reason}")]
    GuardrailTripped { guardrail: String, reason: String },

    #[error("request cancelled")]
    Cancelled,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not initialized: run 'reqgenie init'")]
    NotInitialized,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl GenieError {
    /// Stable snake_case name of the failure kind, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            GenieError::Configuration(_) | GenieError::NotInitialized => "configuration",
            GenieError::SchemaDecode { .. } => "schema_decode",
            GenieError::Validation(_) => "validation",
            GenieError::Render(_) => "render",
            GenieError::Upstream(_) => "upstream",
            GenieError::GuardrailTripped { .. } => "guardrail_tripped",
            GenieError::Cancelled => "cancelled",
            GenieError::NotFound(_) => "not_found",
            GenieError::Io(_) | GenieError::Yaml(_) | GenieError::Json(_) => "io",
        }
    }
}

impl From<ValidationError> for GenieError {
    fn from(e: ValidationError) -> Self {
        GenieError::Validation(e)
    }
}

impl From<AgentError> for GenieError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::SchemaDecode { raw, source } => GenieError::SchemaDecode {
                message: source.to_string(),
                raw,
            },
            AgentError::GuardrailTripped { guardrail, reason } => {
                GenieError::GuardrailTripped { guardrail, reason }
            }
            AgentError::Configuration(msg) => GenieError::Configuration(msg),
            AgentError::Cancelled => GenieError::Cancelled,
            AgentError::Upstream { status, body } => {
                GenieError::Upstream(format!("status {status}: {body}"))
            }
            AgentError::Http(e) => GenieError::Upstream(e.to_string()),
            AgentError::Process(msg) => GenieError::Upstream(msg),
            AgentError::Io(e) => GenieError::Upstream(format!("agent I/O: {e}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, GenieError>;
