use crate::agents;
use crate::context::RequestContext;
use crate::error::Result;
use crate::evaluation::{EvaluationResult, IterationRecord};
use crate::prompt::{build_prompt, PromptContext, PromptKind};
use crate::types::RequirementRequest;
use genie_agent::{AgentDefinition, ChatMessage, Invoker};
use serde::{Deserialize, Serialize};

/// Feedback sent in place of the evaluator's when a first-round pass is
/// overridden, or when the evaluator supplied nothing to act on.
const FORCED_REFINEMENT_FEEDBACK: &str =
    "Strengthen the document: make every requirement more specific, measurable and testable, \
     and cover edge cases and failure modes explicitly.";

// ---------------------------------------------------------------------------
// Policy / outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinePolicy {
    /// When at least two iterations are allowed, never accept iteration 1
    /// as final even if the evaluator passes it.
    pub force_at_least_one_refinement: bool,
}

impl Default for RefinePolicy {
    fn default() -> Self {
        Self {
            force_at_least_one_refinement: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Passed,
    MaxIterationsReached,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementOutcome {
    pub final_document: String,
    pub iterations: Vec<IterationRecord>,
    pub termination: Termination,
}

// ---------------------------------------------------------------------------
// RefinementLoop
// ---------------------------------------------------------------------------

/// Generate → evaluate → refine, bounded by the request's `max_iterations`.
///
/// Reaching the bound without a pass is a normal outcome that returns the
/// last draft. Any agent failure aborts the loop and is returned as-is.
pub struct RefinementLoop<'a> {
    invoker: &'a Invoker,
    elaborator: AgentDefinition,
    evaluator: AgentDefinition,
    policy: RefinePolicy,
}

impl<'a> RefinementLoop<'a> {
    pub fn new(invoker: &'a Invoker, model: &str, policy: RefinePolicy) -> Self {
        Self {
            invoker,
            elaborator: agents::elaborator(model),
            evaluator: agents::evaluator(model),
            policy,
        }
    }

    pub async fn run(
        &self,
        request: &RequirementRequest,
        ctx: &RequestContext,
    ) -> Result<RefinementOutcome> {
        let max = request.max_iterations();
        let language = request.target_language();

        let elaboration = build_prompt(
            PromptKind::Elaboration,
            &PromptContext {
                requirement: Some(request.original_text()),
                application_type: Some(request.application_type()),
                language: Some(language),
                ..Default::default()
            },
        )?;
        let mut conversation = vec![ChatMessage::user(elaboration)];
        let mut iterations: Vec<IterationRecord> = Vec::new();

        for index in 1..=max {
            // Generating
            let generated = self
                .invoker
                .invoke_streamed(&self.elaborator, &conversation, &ctx.cancel, |d| {
                    ctx.observer.on_delta(d)
                })
                .await?;

            // Evaluating
            let eval_prompt = build_prompt(
                PromptKind::Evaluation,
                &PromptContext {
                    document: Some(&generated),
                    ..Default::default()
                },
            )?;
            let evaluation: EvaluationResult = self
                .invoker
                .invoke_structured(&self.evaluator, &[ChatMessage::user(eval_prompt)], &ctx.cancel)
                .await?;

            let record = IterationRecord {
                index,
                generated_text: generated,
                evaluation,
            };
            ctx.observer.on_iteration(&record);

            let forced = self.policy.force_at_least_one_refinement && index == 1 && max >= 2;
            let passed = record.evaluation.is_pass() && !forced;
            let at_bound = index == max;

            if passed || at_bound {
                let final_document = record.generated_text.clone();
                iterations.push(record);
                return Ok(RefinementOutcome {
                    final_document,
                    iterations,
                    termination: if passed {
                        Termination::Passed
                    } else {
                        Termination::MaxIterationsReached
                    },
                });
            }

            // Refining
            let overridden = forced && record.evaluation.is_pass();
            if overridden {
                tracing::debug!(iteration = index, "first-round pass overridden by policy");
            }
            let feedback = if overridden || record.evaluation.feedback.trim().is_empty() {
                FORCED_REFINEMENT_FEEDBACK
            } else {
                record.evaluation.feedback.as_str()
            };
            let feedback_prompt = build_prompt(
                PromptKind::Feedback,
                &PromptContext {
                    feedback: Some(feedback),
                    improvement_areas: &record.evaluation.improvement_areas,
                    language: Some(language),
                    ..Default::default()
                },
            )?;
            conversation.push(ChatMessage::assistant(record.generated_text.clone()));
            conversation.push(ChatMessage::user(feedback_prompt));
            iterations.push(record);
        }

        // `RequirementRequest` guarantees max >= 1, so the loop always returns.
        Err(crate::error::GenieError::Configuration(
            "max_iterations must be at least 1".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
