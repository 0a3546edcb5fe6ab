use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::guardrail::{self, Guardrail};
use crate::runner;
use crate::runtime::AgentRuntime;
use crate::types::{AgentCall, AgentDefinition, ChatMessage};
use crate::{AgentError, Result};

// ─── Invoker ──────────────────────────────────────────────────────────────

/// The single entry point for calling any agent persona.
///
/// Every `invoke_*` method performs exactly one runtime call. Input
/// guardrails registered for the agent run before the call, output
/// guardrails after it; either can fail the invocation with
/// [`AgentError::GuardrailTripped`].
#[derive(Clone)]
pub struct Invoker {
    runtime: Arc<dyn AgentRuntime>,
    input_guards: HashMap<String, Vec<Arc<dyn Guardrail>>>,
    output_guards: HashMap<String, Vec<Arc<dyn Guardrail>>>,
}

impl Invoker {
    pub fn new(runtime: Arc<dyn AgentRuntime>) -> Self {
        Self {
            runtime,
            input_guards: HashMap::new(),
            output_guards: HashMap::new(),
        }
    }

    /// Check the last user message sent to `agent` with `guard`.
    pub fn guard_input(mut self, agent: &str, guard: Arc<dyn Guardrail>) -> Self {
        self.input_guards
            .entry(agent.to_string())
            .or_default()
            .push(guard);
        self
    }

    /// Check the final text produced by `agent` with `guard`.
    pub fn guard_output(mut self, agent: &str, guard: Arc<dyn Guardrail>) -> Self {
        self.output_guards
            .entry(agent.to_string())
            .or_default()
            .push(guard);
        self
    }

    pub fn runtime(&self) -> &Arc<dyn AgentRuntime> {
        &self.runtime
    }

    /// Blocking mode: return the agent's final text.
    pub async fn invoke_text(
        &self,
        agent: &AgentDefinition,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<String> {
        let call = self.prepare(agent, messages)?;
        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            text = self.runtime.complete(&call) => text?,
        };
        self.finish(agent, text)
    }

    /// Blocking mode: decode the agent's final text into `T`.
    ///
    /// The raw text is carried on [`AgentError::SchemaDecode`] when decoding
    /// fails; nothing is coerced.
    pub async fn invoke_structured<T: DeserializeOwned>(
        &self,
        agent: &AgentDefinition,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<T> {
        let text = self.invoke_text(agent, messages, cancel).await?;
        decode_structured(&text)
    }

    /// Streaming mode: forward each delta to `on_delta` and return the
    /// concatenation once the stream ends.
    pub async fn invoke_streamed<F>(
        &self,
        agent: &AgentDefinition,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
        on_delta: F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let call = self.prepare(agent, messages)?;
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            stream = self.runtime.stream(&call) => stream?,
        };
        let text = runner::collect(stream, cancel, on_delta).await?;
        self.finish(agent, text)
    }

    fn prepare(&self, agent: &AgentDefinition, messages: &[ChatMessage]) -> Result<AgentCall> {
        let call = AgentCall::new(agent, messages);
        if let Some(guards) = self.input_guards.get(&agent.name) {
            let input = call.last_user_content().unwrap_or_default();
            guardrail::enforce(guards, input)?;
        }
        tracing::debug!(
            agent = %agent.name,
            model = %agent.model,
            runtime = self.runtime.name(),
            messages = call.messages.len(),
            "invoking agent"
        );
        Ok(call)
    }

    fn finish(&self, agent: &AgentDefinition, text: String) -> Result<String> {
        if let Some(guards) = self.output_guards.get(&agent.name) {
            guardrail::enforce(guards, &text)?;
        }
        tracing::debug!(agent = %agent.name, chars = text.len(), "agent finished");
        Ok(text)
    }
}

// ─── Structured decoding ──────────────────────────────────────────────────

/// Decode the first JSON object found in `raw`.
///
/// Models frequently wrap JSON in markdown fences or a sentence of prose;
/// both are tolerated. Anything else is a [`AgentError::SchemaDecode`].
pub fn decode_structured<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let candidate = extract_json_object(raw).unwrap_or(raw);
    serde_json::from_str(candidate).map_err(|source| AgentError::SchemaDecode {
        raw: raw.to_string(),
        source,
    })
}

/// The slice from the first `{` to the last `}`, if both exist in order.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

// ─── Tests ────────────────────────────────────────────────────────────────
