//! `genie-agent`: generic invocation layer for LLM agent personas.
//!
//! An agent is a value ([`AgentDefinition`]); the thing that executes it is
//! an [`AgentRuntime`]. The [`Invoker`] ties the two together and is the only
//! way the rest of the workspace talks to a model.
//!
//! # Architecture
//!
//! ```text
//! AgentDefinition + [ChatMessage]
//!     │
//!     ▼
//! Invoker          ← input guardrails, one runtime call, output guardrails
//!     │
//!     ▼
//! AgentRuntime     ← OpenAiRuntime (HTTP + SSE) | CommandRuntime (subprocess)
//!     │              | ScriptedRuntime (in-memory)
//!     ▼
//! DeltaStream      ← futures::Stream<Item = Result<String>>; drop to abandon
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use genie_agent::{AgentDefinition, ChatMessage, Invoker, OpenAiRuntime};
//! use tokio_util::sync::CancellationToken;
//!
//! let runtime = OpenAiRuntime::from_env(genie_agent::openai::DEFAULT_BASE_URL, "OPENAI_API_KEY", timeout)?;
//! let invoker = Invoker::new(std::sync::Arc::new(runtime));
//! let agent = AgentDefinition::text("Writer", "Be concise.", "o3-mini");
//! let text = invoker
//!     .invoke_text(&agent, &[ChatMessage::user("say hello")], &CancellationToken::new())
//!     .await?;
//! ```

pub mod error;
pub mod guardrail;
pub mod invoker;
pub mod openai;
pub mod process;
pub mod runner;
pub mod runtime;
pub mod scripted;
pub mod stream;
pub mod types;

pub use error::AgentError;
pub use guardrail::{Guardrail, MinWords, RequiredSections};
pub use invoker::{decode_structured, Invoker};
pub use openai::OpenAiRuntime;
pub use process::CommandRuntime;
pub use runtime::AgentRuntime;
pub use scripted::{Reply, ScriptedRuntime};
pub use stream::DeltaStream;
pub use types::{AgentCall, AgentDefinition, ChatMessage, OutputMode, Role};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, AgentError>;
