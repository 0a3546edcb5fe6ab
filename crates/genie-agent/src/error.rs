use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("agent output did not match the expected schema: {source}\n  raw: {raw}")]
    SchemaDecode {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("guardrail '{guardrail}' tripped: {reason}")]
    GuardrailTripped { guardrail: String, reason: String },

    #[error("process error: {0}")]
    Process(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("agent call cancelled")]
    Cancelled,
}

impl AgentError {
    /// Raw agent output attached to a decode failure, if any.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            AgentError::SchemaDecode { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
