use serde::{Deserialize, Serialize};

// ─── Messages ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged entry of a conversation sent to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ─── AgentDefinition ──────────────────────────────────────────────────────

/// How the agent's final answer should be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputMode {
    /// Free text, returned verbatim.
    Text,
    /// A single JSON object. `schema_hint` is appended to the instructions so
    /// the model knows which keys to emit; decoding is done by the caller.
    Json { schema_hint: String },
}

/// A persona: everything that distinguishes one agent from another.
///
/// Agents are values, so adding a persona never requires a new type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub output: OutputMode,
}

impl AgentDefinition {
    pub fn text(
        name: impl Into<String>,
        instructions: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: model.into(),
            output: OutputMode::Text,
        }
    }

    pub fn json(
        name: impl Into<String>,
        instructions: impl Into<String>,
        model: impl Into<String>,
        schema_hint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: model.into(),
            output: OutputMode::Json {
                schema_hint: schema_hint.into(),
            },
        }
    }

    pub fn wants_json(&self) -> bool {
        matches!(self.output, OutputMode::Json { .. })
    }

    /// The system message sent ahead of the conversation.
    pub fn system_prompt(&self) -> String {
        match &self.output {
            OutputMode::Text => self.instructions.clone(),
            OutputMode::Json { schema_hint } => format!(
                "{}\n\nRespond with ONLY a single JSON object matching this structure, \
                 with no surrounding prose:\n{}",
                self.instructions, schema_hint
            ),
        }
    }
}

// ─── AgentCall ────────────────────────────────────────────────────────────

/// A fully-resolved request handed to an [`AgentRuntime`](crate::AgentRuntime).
#[derive(Debug, Clone, Serialize)]
pub struct AgentCall {
    pub agent: String,
    pub model: String,
    pub json_output: bool,
    pub messages: Vec<ChatMessage>,
}

impl AgentCall {
    /// Prepend the agent's system prompt to `conversation`.
    pub fn new(agent: &AgentDefinition, conversation: &[ChatMessage]) -> Self {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ChatMessage::system(agent.system_prompt()));
        messages.extend(conversation.iter().cloned());
        Self {
            agent: agent.name.clone(),
            model: agent.model.clone(),
            json_output: agent.wants_json(),
            messages,
        }
    }

    /// Content of the last user message, used by input guardrails.
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
