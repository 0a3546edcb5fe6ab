use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::runtime::AgentRuntime;
use crate::stream::DeltaStream;
use crate::types::AgentCall;
use crate::{AgentError, Result};

/// A canned answer for [`ScriptedRuntime`].
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Reported as an upstream failure with this body.
    Fail(String),
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }

    fn into_result(self) -> Result<String> {
        match self {
            Reply::Text(t) => Ok(t),
            Reply::Fail(body) => Err(AgentError::Upstream { status: 500, body }),
        }
    }
}

/// In-memory runtime that answers from per-agent scripts and records every
/// call it receives. Queued replies are consumed first; once a queue is
/// empty the agent's standing reply (if any) is used.
#[derive(Default)]
pub struct ScriptedRuntime {
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    standing: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<AgentCall>>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot reply for `agent`.
    pub fn push(&self, agent: &str, reply: Reply) -> &Self {
        if let Ok(mut q) = self.queued.lock() {
            q.entry(agent.to_string()).or_default().push_back(reply);
        }
        self
    }

    /// Reply with `reply` whenever `agent` has nothing queued.
    pub fn always(&self, agent: &str, reply: Reply) -> &Self {
        if let Ok(mut s) = self.standing.lock() {
            s.insert(agent.to_string(), reply);
        }
        self
    }

    pub fn calls(&self) -> Vec<AgentCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_for(&self, agent: &str) -> usize {
        self.calls
            .lock()
            .map(|c| c.iter().filter(|call| call.agent == agent).count())
            .unwrap_or(0)
    }

    fn answer(&self, call: &AgentCall) -> Result<String> {
        if let Ok(mut c) = self.calls.lock() {
            c.push(call.clone());
        }
        let queued = self
            .queued
            .lock()
            .ok()
            .and_then(|mut q| q.get_mut(&call.agent).and_then(VecDeque::pop_front));
        let reply = match queued {
            Some(r) => Some(r),
            None => self
                .standing
                .lock()
                .ok()
                .and_then(|s| s.get(&call.agent).cloned()),
        };
        reply
            .ok_or_else(|| {
                AgentError::Configuration(format!("no scripted reply for agent '{}'", call.agent))
            })?
            .into_result()
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, call: &AgentCall) -> Result<String> {
        self.answer(call)
    }

    async fn stream(&self, call: &AgentCall) -> Result<DeltaStream> {
        let text = self.answer(call)?;
        // Split on whitespace boundaries so consumers see several deltas.
        let chunks: Vec<Result<String>> = text
            .split_inclusive(' ')
            .map(|s| Ok(s.to_string()))
            .collect();
        Ok(DeltaStream::ready(chunks))
    }
}
