use async_trait::async_trait;

use crate::runner;
use crate::stream::DeltaStream;
use crate::types::AgentCall;
use crate::Result;

/// The boundary to whatever actually executes an agent call.
///
/// Implementations perform exactly one upstream call per method invocation
/// and never retry on their own.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Run `call` to completion and return the final text.
    ///
    /// The default drains [`AgentRuntime::stream`].
    async fn complete(&self, call: &AgentCall) -> Result<String> {
        let stream = self.stream(call).await?;
        runner::concat(stream).await
    }

    /// Run `call` and yield text deltas as they arrive.
    async fn stream(&self, call: &AgentCall) -> Result<DeltaStream>;
}
