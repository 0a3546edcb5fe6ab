use crate::error::ValidationError;
use crate::evaluation::IterationRecord;
use crate::types::GenerationKind;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// PipelineObserver
// ---------------------------------------------------------------------------

/// Progress callbacks for one request. All methods default to no-ops.
pub trait PipelineObserver: Send + Sync {
    fn on_delta(&self, _delta: &str) {}
    fn on_iteration(&self, _record: &IterationRecord) {}
    fn on_artifact(&self, _kind: GenerationKind, _ok: bool) {}
    fn on_repair_attempt(&self, _attempt: u32, _error: &ValidationError) {}
}

pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Logs progress through `tracing`.
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_iteration(&self, record: &IterationRecord) {
        tracing::info!(
            iteration = record.index,
            verdict = ?record.evaluation.verdict,
            areas = record.evaluation.improvement_areas.len(),
            "refinement iteration evaluated"
        );
    }

    fn on_artifact(&self, kind: GenerationKind, ok: bool) {
        if ok {
            tracing::info!(%kind, "artifact generated");
        } else {
            tracing::warn!(%kind, "artifact generation failed");
        }
    }

    fn on_repair_attempt(&self, attempt: u32, error: &ValidationError) {
        tracing::info!(attempt, error = %error.message, "repairing diagram source");
    }
}

// ---------------------------------------------------------------------------
// RequestContext
// ---------------------------------------------------------------------------

/// Everything scoped to one user request, passed explicitly down the call
/// chain.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub cancel: CancellationToken,
    pub observer: Arc<dyn PipelineObserver>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
