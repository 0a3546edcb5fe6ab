use crate::agents;
use crate::artifact::{Artifact, UseCaseSet};
use crate::context::RequestContext;
use crate::diagram::DiagramSpec;
use crate::error::{GenieError, Result};
use crate::prompt::{build_handoff_context, build_prompt, PromptContext, PromptKind};
use crate::tickets::TicketPlan;
use crate::types::{ApplicationType, CloudProvider, GenerationKind};
use futures::future::join_all;
use genie_agent::{ChatMessage, Invoker};
use std::collections::{BTreeMap, BTreeSet};

/// Per-kind results of one fan-out. A failed kind never hides its siblings.
pub type ArtifactResults = BTreeMap<GenerationKind, Result<Artifact>>;

/// Collapse per-kind results into one: every artifact, or the first error
/// in kind order.
pub fn into_all_or_nothing(results: ArtifactResults) -> Result<BTreeMap<GenerationKind, Artifact>> {
    results
        .into_iter()
        .map(|(kind, r)| r.map(|a| (kind, a)))
        .collect()
}

/// Generates every enabled artifact kind from the final document
/// concurrently. Tasks share only the read-only document.
pub struct FanoutStage<'a> {
    invoker: &'a Invoker,
    model: String,
    application_type: ApplicationType,
    cloud: CloudProvider,
    language: String,
}

impl<'a> FanoutStage<'a> {
    pub fn new(
        invoker: &'a Invoker,
        model: impl Into<String>,
        application_type: ApplicationType,
        cloud: CloudProvider,
        language: impl Into<String>,
    ) -> Self {
        Self {
            invoker,
            model: model.into(),
            application_type,
            cloud,
            language: language.into(),
        }
    }

    pub async fn generate_artifacts(
        &self,
        final_document: &str,
        kinds: &BTreeSet<GenerationKind>,
        ctx: &RequestContext,
    ) -> ArtifactResults {
        let tasks = kinds.iter().map(|&kind| async move {
            let result = self.generate_one(kind, final_document, ctx).await;
            match &result {
                Ok(_) => ctx.observer.on_artifact(kind, true),
                Err(e) => {
                    tracing::warn!(%kind, error = %e, "artifact generation failed");
                    ctx.observer.on_artifact(kind, false);
                }
            }
            (kind, result)
        });
        join_all(tasks).await.into_iter().collect()
    }

    async fn generate_one(
        &self,
        kind: GenerationKind,
        document: &str,
        ctx: &RequestContext,
    ) -> Result<Artifact> {
        let cancel = &ctx.cancel;
        let prompt_ctx = PromptContext {
            document: Some(document),
            language: Some(&self.language),
            application_type: Some(self.application_type),
            cloud: Some(self.cloud),
            ..Default::default()
        };
        match kind {
            GenerationKind::Tests => {
                let prompt = build_prompt(PromptKind::Tests, &prompt_ctx)?;
                let text = self
                    .invoker
                    .invoke_text(&agents::tests(&self.model), &[ChatMessage::user(prompt)], cancel)
                    .await?;
                Ok(Artifact::Text(text))
            }
            GenerationKind::Code => {
                let prompt = build_prompt(PromptKind::Code, &prompt_ctx)?;
                let text = self
                    .invoker
                    .invoke_text(&agents::code(&self.model), &[ChatMessage::user(prompt)], cancel)
                    .await?;
                Ok(Artifact::Text(text))
            }
            GenerationKind::Diagram => {
                let prompt = build_prompt(PromptKind::Diagram, &prompt_ctx)?;
                let spec: DiagramSpec = self
                    .invoker
                    .invoke_structured(&agents::diagram(&self.model), &[ChatMessage::user(prompt)], cancel)
                    .await?;
                spec.check_references()?;
                Ok(Artifact::Diagram(spec))
            }
            GenerationKind::Tickets => {
                let prompt = build_prompt(PromptKind::Tickets, &prompt_ctx)?;
                let plan: TicketPlan = self
                    .invoker
                    .invoke_structured(&agents::tickets(&self.model), &[ChatMessage::user(prompt)], cancel)
                    .await?;
                plan.validate()?;
                Ok(Artifact::Tickets(plan))
            }
            GenerationKind::UseCases => {
                let messages = build_handoff_context(document, &self.language)?;
                let set: UseCaseSet = self
                    .invoker
                    .invoke_structured(&agents::use_cases(&self.model), &messages, cancel)
                    .await?;
                if set.use_cases.is_empty() {
                    return Err(GenieError::SchemaDecode {
                        message: "use case list is empty".into(),
                        raw: String::new(),
                    });
                }
                Ok(Artifact::UseCases(set))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
