//! End-to-end orchestration of one requirement.
//!
//! ```text
//! RequirementRequest
//!     │  input guardrails (optional)
//!     ▼
//! RefinementLoop      elaborate → evaluate → refine, bounded
//!     │  final document
//!     ▼
//! FanoutStage         tests | code | diagram | tickets | use cases, concurrently
//!     │  diagram spec
//!     ▼
//! RepairLoop → DiagramRenderer
//!     │
//!     ▼
//! PipelineReport      persisted under .reqgenie/runs/<request-id>/
//! ```

use crate::agents;
use crate::artifact::Artifact;
use crate::config::Config;
use crate::context::RequestContext;
use crate::diagram::{
    DiagramRenderer, DiagramSpec, GraphvizRenderer, ImportValidator, PythonIntrospector,
    RepairLoop, SourceValidator, DEFAULT_REPAIR_ATTEMPTS, OUTPUT_STEM,
};
use crate::error::{GenieError, Result};
use crate::evaluation::IterationRecord;
use crate::fanout::FanoutStage;
use crate::io;
use crate::paths;
use crate::prompt::{build_prompt, PromptContext, PromptKind};
use crate::refine::{RefinePolicy, RefinementLoop, Termination};
use crate::types::{CloudProvider, GenerationKind, RequirementRequest};
use chrono::{DateTime, Utc};
use genie_agent::{guardrail, ChatMessage, Guardrail, Invoker};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactOutcome {
    Ok { artifact: Artifact },
    Failed { error_kind: String, error: String },
}

impl ArtifactOutcome {
    fn from_result(result: Result<Artifact>) -> Self {
        match result {
            Ok(artifact) => ArtifactOutcome::Ok { artifact },
            Err(e) => ArtifactOutcome::failed(&e),
        }
    }

    fn failed(e: &GenieError) -> Self {
        ArtifactOutcome::Failed {
            error_kind: e.kind().to_string(),
            error: e.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ArtifactOutcome::Ok { .. })
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            ArtifactOutcome::Ok { artifact } => Some(artifact),
            ArtifactOutcome::Failed { .. } => None,
        }
    }
}

/// What happened to the diagram after its structure was generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramOutcome {
    /// Validated source; present once repair succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub repair_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Renderer scratch directory, removed once the image is persisted.
    #[serde(skip)]
    pub render_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub request_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub request: RequirementRequest,
    pub iterations: Vec<IterationRecord>,
    pub termination: Termination,
    pub final_document: String,
    pub artifacts: BTreeMap<GenerationKind, ArtifactOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram: Option<DiagramOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ArtifactOutcome>,
}

impl PipelineReport {
    /// Write the report, the final document and every successful artifact
    /// into `.reqgenie/runs/<request-id>/`. Returns that directory.
    ///
    /// A rendered image is copied in as `architecture.png`, the report is
    /// pointed at the copy and the renderer's scratch directory is removed.
    pub fn persist(&mut self, root: &Path) -> Result<PathBuf> {
        let dir = paths::run_dir(root, &self.request_id.to_string());
        io::ensure_dir(&dir)?;
        io::atomic_write(
            &dir.join(paths::REQUIREMENTS_FILE),
            self.final_document.as_bytes(),
        )?;
        for (kind, outcome) in &self.artifacts {
            if let Some(artifact) = outcome.artifact() {
                io::atomic_write(&dir.join(kind.file_name()), artifact.file_contents()?.as_bytes())?;
            }
        }
        if let Some(diagram) = &mut self.diagram {
            if let Some(source) = &diagram.source {
                io::atomic_write(&dir.join("diagram.py"), source.as_bytes())?;
            }
            if let Some(image) = &diagram.image {
                let copy = dir.join(format!("{OUTPUT_STEM}.png"));
                if *image != copy {
                    std::fs::copy(image, &copy)?;
                }
                diagram.image = Some(copy);
            }
            if let Some(render_dir) = diagram.render_dir.take() {
                if let Err(e) = std::fs::remove_dir_all(&render_dir) {
                    tracing::warn!(dir = %render_dir.display(), error = %e, "failed to remove render dir");
                }
            }
        }
        if let Some(Artifact::Text(review)) = self.review.as_ref().and_then(ArtifactOutcome::artifact) {
            io::atomic_write(&dir.join("review.md"), review.as_bytes())?;
        }
        io::atomic_write(
            &dir.join(paths::REPORT_FILE),
            serde_json::to_string_pretty(self)?.as_bytes(),
        )?;
        tracing::info!(dir = %dir.display(), "run persisted");
        Ok(dir)
    }

    pub fn load(root: &Path, request_id: &str) -> Result<Self> {
        let path = paths::run_dir(root, request_id).join(paths::REPORT_FILE);
        if !path.exists() {
            return Err(GenieError::NotFound(format!("run '{request_id}'")));
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub model: String,
    pub cloud: CloudProvider,
    pub kinds: BTreeSet<GenerationKind>,
    pub policy: RefinePolicy,
    pub repair_attempts: u32,
    /// Review generated code against the final document after fan-out.
    pub review: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            model: "o3-mini".to_string(),
            cloud: CloudProvider::default(),
            kinds: BTreeSet::new(),
            policy: RefinePolicy::default(),
            repair_attempts: DEFAULT_REPAIR_ATTEMPTS,
            review: false,
        }
    }
}

pub struct Pipeline {
    invoker: Invoker,
    options: PipelineOptions,
    input_guards: Vec<Arc<dyn Guardrail>>,
    validator: Arc<dyn SourceValidator>,
    renderer: Option<Arc<dyn DiagramRenderer>>,
}

impl Pipeline {
    /// Pipeline with static diagram validation and no rendering.
    pub fn new(invoker: Invoker, options: PipelineOptions) -> Self {
        Self {
            invoker,
            options,
            input_guards: Vec::new(),
            validator: Arc::new(ImportValidator::static_only()),
            renderer: None,
        }
    }

    /// Everything wired from `.reqgenie/config.yaml`.
    pub fn from_config(config: &Config, root: &Path) -> Result<Self> {
        let options = PipelineOptions {
            model: config.model.clone(),
            cloud: config.cloud,
            kinds: config.artifacts.iter().copied().collect(),
            policy: config.refinement.policy(),
            repair_attempts: config.diagram.repair_attempts,
            review: false,
        };
        let validator: Arc<dyn SourceValidator> = if config.diagram.introspect {
            Arc::new(ImportValidator::with_introspector(Arc::new(
                PythonIntrospector::new(config.diagram.python.clone()),
            )))
        } else {
            Arc::new(ImportValidator::static_only())
        };
        let renderer = GraphvizRenderer::new(
            config.diagram.python.clone(),
            config.diagram.output_dir(root),
        )
        .with_timeout(Duration::from_secs(config.diagram.render_timeout_seconds));

        Ok(Self::new(config.build_invoker()?, options)
            .with_input_guards(config.input_guardrails())
            .with_validator(validator)
            .with_renderer(Arc::new(renderer)))
    }

    pub fn with_input_guards(mut self, guards: Vec<Arc<dyn Guardrail>>) -> Self {
        self.input_guards = guards;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn SourceValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn DiagramRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn options_mut(&mut self) -> &mut PipelineOptions {
        &mut self.options
    }

    #[tracing::instrument(skip_all, fields(request_id = %ctx.request_id))]
    pub async fn run(&self, request: &RequirementRequest, ctx: &RequestContext) -> Result<PipelineReport> {
        guardrail::enforce(&self.input_guards, request.original_text())?;

        let refinement = RefinementLoop::new(&self.invoker, &self.options.model, self.options.policy)
            .run(request, ctx)
            .await?;
        tracing::info!(
            iterations = refinement.iterations.len(),
            termination = ?refinement.termination,
            "refinement finished"
        );

        let fanout = FanoutStage::new(
            &self.invoker,
            self.options.model.clone(),
            request.application_type(),
            self.options.cloud,
            request.target_language(),
        );
        let results = fanout
            .generate_artifacts(&refinement.final_document, &self.options.kinds, ctx)
            .await;
        if ctx.is_cancelled() {
            return Err(GenieError::Cancelled);
        }

        let mut artifacts: BTreeMap<GenerationKind, ArtifactOutcome> = results
            .into_iter()
            .map(|(kind, r)| (kind, ArtifactOutcome::from_result(r)))
            .collect();

        let diagram_spec = match artifacts.get(&GenerationKind::Diagram) {
            Some(ArtifactOutcome::Ok {
                artifact: Artifact::Diagram(spec),
            }) => Some(spec.clone()),
            _ => None,
        };
        let mut diagram = None;
        if let Some(spec) = diagram_spec {
            let (outcome, fatal) = self.finish_diagram(&spec, ctx).await;
            if let Some(e) = fatal {
                artifacts.insert(GenerationKind::Diagram, ArtifactOutcome::failed(&e));
            }
            diagram = Some(outcome);
        }

        let review = if self.options.review {
            Some(self.review_code(&refinement.final_document, &artifacts, ctx).await)
        } else {
            None
        };

        Ok(PipelineReport {
            request_id: ctx.request_id,
            created_at: Utc::now(),
            request: request.clone(),
            iterations: refinement.iterations,
            termination: refinement.termination,
            final_document: refinement.final_document,
            artifacts,
            diagram,
            review,
        })
    }

    /// Source generation, repair and rendering. A second value is returned
    /// when the diagram must count as failed: its source could not be made
    /// valid. Render failures are recorded but keep the structured diagram.
    async fn finish_diagram(
        &self,
        spec: &DiagramSpec,
        ctx: &RequestContext,
    ) -> (DiagramOutcome, Option<GenieError>) {
        let title = spec
            .diagram_type
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Architecture Diagram".to_string());

        let mut outcome = DiagramOutcome {
            source: None,
            repair_attempts: 0,
            image: None,
            error: None,
            render_dir: None,
        };

        let source = match spec.to_source(&title, OUTPUT_STEM) {
            Ok(s) => s,
            Err(e) => {
                outcome.error = Some(e.message.clone());
                return (outcome, Some(GenieError::Validation(e)));
            }
        };

        let repaired = RepairLoop::new(&self.invoker, self.validator.as_ref(), &self.options.model)
            .with_max_attempts(self.options.repair_attempts)
            .run(&source, ctx)
            .await;
        let repaired = match repaired {
            Ok(r) => r,
            Err(e) => {
                outcome.error = Some(e.to_string());
                return (outcome, Some(e));
            }
        };
        outcome.repair_attempts = repaired.attempts;
        outcome.source = Some(repaired.source.clone());

        if let Some(renderer) = &self.renderer {
            match renderer.render(&repaired.source).await {
                Ok(rendered) => {
                    outcome.image = Some(rendered.image);
                    outcome.render_dir = Some(rendered.dir);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "diagram render failed");
                    outcome.error = Some(e.to_string());
                }
            }
        }
        (outcome, None)
    }

    async fn review_code(
        &self,
        document: &str,
        artifacts: &BTreeMap<GenerationKind, ArtifactOutcome>,
        ctx: &RequestContext,
    ) -> ArtifactOutcome {
        let Some(Artifact::Text(code)) = artifacts
            .get(&GenerationKind::Code)
            .and_then(ArtifactOutcome::artifact)
        else {
            return ArtifactOutcome::failed(&GenieError::Configuration(
                "code review requested but no code was generated".into(),
            ));
        };
        ArtifactOutcome::from_result(self.generate_review(code, document, ctx).await)
    }

    async fn generate_review(&self, code: &str, document: &str, ctx: &RequestContext) -> Result<Artifact> {
        let prompt = build_prompt(
            PromptKind::Review,
            &PromptContext {
                source: Some(code),
                document: Some(document),
                ..Default::default()
            },
        )?;
        let text = self
            .invoker
            .invoke_text(
                &agents::reviewer(&self.options.model),
                &[ChatMessage::user(prompt)],
                &ctx.cancel,
            )
            .await?;
        Ok(Artifact::Text(text))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
