use super::validate::SourceValidator;
use crate::agents;
use crate::context::RequestContext;
use crate::error::{GenieError, Result, ValidationError};
use crate::prompt::{build_prompt, PromptContext, PromptKind};
use genie_agent::{AgentDefinition, ChatMessage, Invoker};
use regex::Regex;
use std::sync::OnceLock;

pub const DEFAULT_REPAIR_ATTEMPTS: u32 = 3;

fn python_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```python\s*([\s\S]*?)\s*```").unwrap())
}

/// Pull corrected source out of a repair reply: the first fenced python
/// block, or the whole reply when there is none.
pub fn extract_source(reply: &str) -> String {
    match python_block_re().captures(reply) {
        Some(caps) => caps[1].trim().to_string(),
        None => reply.trim().to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    pub source: String,
    /// Repair calls made; 0 when the input was already valid.
    pub attempts: u32,
}

/// Validate → re-prompt with the exact error → validate again, at most
/// `max_attempts` agent calls. Exhaustion is a terminal validation error.
pub struct RepairLoop<'a> {
    invoker: &'a Invoker,
    validator: &'a dyn SourceValidator,
    agent: AgentDefinition,
    max_attempts: u32,
}

impl<'a> RepairLoop<'a> {
    pub fn new(invoker: &'a Invoker, validator: &'a dyn SourceValidator, model: &str) -> Self {
        Self {
            invoker,
            validator,
            agent: agents::repair(model),
            max_attempts: DEFAULT_REPAIR_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub async fn run(&self, source: &str, ctx: &RequestContext) -> Result<RepairOutcome> {
        let mut source = source.to_string();

        for attempt in 1..=self.max_attempts {
            let error = match self.validator.validate(&source).await {
                Ok(()) => {
                    return Ok(RepairOutcome {
                        source,
                        attempts: attempt - 1,
                    })
                }
                Err(e) => e,
            };
            ctx.observer.on_repair_attempt(attempt, &error);
            tracing::info!(attempt, max = self.max_attempts, error = %error.message, "diagram source invalid, requesting fix");

            let prompt = build_prompt(
                PromptKind::Repair,
                &PromptContext {
                    error: Some(&error.message),
                    source: Some(&source),
                    ..Default::default()
                },
            )?;
            let reply = self
                .invoker
                .invoke_text(&self.agent, &[ChatMessage::user(prompt)], &ctx.cancel)
                .await?;
            source = extract_source(&reply);
        }

        match self.validator.validate(&source).await {
            Ok(()) => Ok(RepairOutcome {
                source,
                attempts: self.max_attempts,
            }),
            Err(last) => Err(GenieError::Validation(ValidationError {
                message: format!(
                    "Failed to auto-correct diagram code after {} attempts. Last error: {}",
                    self.max_attempts, last.message
                ),
                offending_line: last.offending_line,
            })),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PipelineObserver;
    use crate::diagram::validate::ImportValidator;
    use async_trait::async_trait;
    use genie_agent::{Reply, ScriptedRuntime};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct AlwaysInvalid;

    #[async_trait]
    impl SourceValidator for AlwaysInvalid {
        async fn validate(&self, _source: &str) -> std::result::Result<(), ValidationError> {
            Err(ValidationError::at_line("nope", "line 1"))
        }
    }

    fn setup() -> (Arc<ScriptedRuntime>, Invoker) {
        let rt = Arc::new(ScriptedRuntime::new());
        (rt.clone(), Invoker::new(rt))
    }

    #[test]
    fn extracts_fenced_block() {
        assert_eq!(
            extract_source("Here:\n```python\nprint(1)\n```\nDone"),
            "print(1)"
        );
        assert_eq!(extract_source("  print(2)\n"), "print(2)");
    }

    #[tokio::test]
    async fn valid_source_needs_no_calls() {
        let (rt, inv) = setup();
        let v = ImportValidator::static_only();
        let out = RepairLoop::new(&inv, &v, "m")
            .run("from diagrams import Diagram\n", &RequestContext::new())
            .await
            .unwrap();
        assert_eq!(out.attempts, 0);
        assert!(rt.calls().is_empty());
    }

    #[tokio::test]
    async fn merged_imports_are_repaired() {
        let (rt, inv) = setup();
        rt.push(
            agents::REPAIR,
            Reply::text(
                "```python\nfrom diagrams import Cluster\nfrom diagrams.gcp.compute import Functions\n```",
            ),
        );
        let v = ImportValidator::static_only();
        let out = RepairLoop::new(&inv, &v, "m")
            .run(
                "from diagrams import Cluster from diagrams.gcp.compute import Functions\n",
                &RequestContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(out.attempts, 1);
        assert_eq!(
            out.source,
            "from diagrams import Cluster\nfrom diagrams.gcp.compute import Functions"
        );
        let prompt = rt.calls()[0].last_user_content().unwrap_or_default().to_string();
        assert!(prompt.contains("ERROR: Syntax error: Found multiple 'from' statements"));
    }

    #[tokio::test]
    async fn always_failing_validator_is_bounded() {
        let (rt, inv) = setup();
        rt.always(agents::REPAIR, Reply::text("still broken"));

        struct Count(AtomicU32);
        impl PipelineObserver for Count {
            fn on_repair_attempt(&self, _attempt: u32, _error: &ValidationError) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let seen = Arc::new(Count(AtomicU32::new(0)));
        let ctx = RequestContext::new().with_observer(seen.clone());

        let err = RepairLoop::new(&inv, &AlwaysInvalid, "m")
            .run("anything", &ctx)
            .await
            .unwrap_err();
        assert_eq!(rt.calls_for(agents::REPAIR), 3);
        assert_eq!(seen.0.load(Ordering::SeqCst), 3);
        match err {
            GenieError::Validation(v) => {
                assert_eq!(
                    v.message,
                    "Failed to auto-correct diagram code after 3 attempts. Last error: nope"
                );
                assert_eq!(v.offending_line.as_deref(), Some("line 1"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn custom_bound_is_respected() {
        let (rt, inv) = setup();
        rt.always(agents::REPAIR, Reply::text("x"));
        let err = RepairLoop::new(&inv, &AlwaysInvalid, "m")
            .with_max_attempts(1)
            .run("y", &RequestContext::new())
            .await
            .unwrap_err();
        assert_eq!(rt.calls_for(agents::REPAIR), 1);
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn agent_failure_aborts_repair() {
        let (rt, inv) = setup();
        rt.push(agents::REPAIR, Reply::Fail("quota".into()));
        let err = RepairLoop::new(&inv, &AlwaysInvalid, "m")
            .run("y", &RequestContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "upstream");
    }
}
