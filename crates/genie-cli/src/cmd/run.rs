use crate::cmd::block_on;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Args;
use genie_core::context::TracingObserver;
use genie_core::{
    ApplicationType, Artifact, ArtifactOutcome, Config, GenerationKind, IterationRecord, Pipeline,
    PipelineObserver, PipelineReport, RequestContext, RequirementRequest, ValidationError,
};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct RunArgs {
    /// The brief requirement, e.g. "Add two-factor authentication to login"
    pub requirement: String,

    /// Web Application, Mobile App, Desktop Application, or API/Service
    #[arg(long = "app-type")]
    pub app_type: Option<String>,

    /// Output language (English, Japanese, Italian, ...)
    #[arg(long)]
    pub language: Option<String>,

    /// Maximum refinement iterations
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Comma-separated artifact kinds: tests,code,diagram,tickets,use_cases
    #[arg(long, value_delimiter = ',')]
    pub kinds: Option<Vec<String>>,

    /// Accept a first-round pass from the evaluator
    #[arg(long)]
    pub no_force_refinement: bool,

    /// Review the generated code against the final document
    #[arg(long)]
    pub review: bool,
}

/// Streams elaboration text to stderr and logs everything else.
struct CliObserver {
    stream: bool,
}

impl PipelineObserver for CliObserver {
    fn on_delta(&self, delta: &str) {
        if self.stream {
            let mut err = std::io::stderr().lock();
            let _ = err.write_all(delta.as_bytes());
            let _ = err.flush();
        }
    }

    fn on_iteration(&self, record: &IterationRecord) {
        if self.stream {
            eprintln!();
        }
        TracingObserver.on_iteration(record);
    }

    fn on_artifact(&self, kind: GenerationKind, ok: bool) {
        TracingObserver.on_artifact(kind, ok);
    }

    fn on_repair_attempt(&self, attempt: u32, error: &ValidationError) {
        TracingObserver.on_repair_attempt(attempt, error);
    }
}

pub fn run(root: &Path, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;

    let app_type = match &args.app_type {
        Some(s) => s.parse::<ApplicationType>()?,
        None => config.application_type,
    };
    let language = args.language.clone().unwrap_or_else(|| config.language.clone());
    let iterations = args.iterations.unwrap_or(config.refinement.max_iterations);
    let request = RequirementRequest::new(&args.requirement, app_type, language, iterations)?;

    let mut pipeline = Pipeline::from_config(&config, root).context("failed to set up pipeline")?;
    {
        let options = pipeline.options_mut();
        if let Some(kinds) = &args.kinds {
            options.kinds = kinds
                .iter()
                .map(|k| k.parse::<GenerationKind>())
                .collect::<Result<BTreeSet<_>, _>>()?;
        }
        if args.no_force_refinement {
            options.policy.force_at_least_one_refinement = false;
        }
        options.review = args.review;
    }

    let cancel = CancellationToken::new();
    let ctx = RequestContext::new()
        .with_cancel(cancel.clone())
        .with_observer(Arc::new(CliObserver { stream: !json }));
    let mut report = block_on(async {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
        pipeline.run(&request, &ctx).await
    })?
    .context("pipeline failed")?;

    let dir = report.persist(root).context("failed to persist run")?;

    if json {
        return print_json(&report);
    }
    print_summary(&report, &dir);
    Ok(())
}

fn print_summary(report: &PipelineReport, dir: &Path) {
    println!("\n=== Final requirements document ===\n");
    println!("{}", report.final_document.trim_end());

    println!(
        "\nRefinement: {} iteration(s), {:?}",
        report.iterations.len(),
        report.termination
    );

    let rows = report
        .artifacts
        .iter()
        .map(|(kind, outcome)| {
            let (status, detail) = match outcome {
                ArtifactOutcome::Ok { .. } => ("ok".to_string(), kind.file_name().to_string()),
                ArtifactOutcome::Failed { error_kind, error } => {
                    (format!("failed ({error_kind})"), error.clone())
                }
            };
            vec![kind.to_string(), status, detail]
        })
        .collect();
    println!();
    print_table(&["ARTIFACT", "STATUS", "DETAIL"], rows);

    if let Some(ArtifactOutcome::Ok {
        artifact: Artifact::UseCases(set),
    }) = report.artifacts.get(&GenerationKind::UseCases)
    {
        println!("\n=== Use cases ===\n");
        println!("{}", set.to_markdown().trim_end());
    }

    if let Some(diagram) = &report.diagram {
        match (&diagram.image, &diagram.error) {
            (Some(image), _) => println!(
                "\nDiagram: {} (repair attempts: {})",
                image.display(),
                diagram.repair_attempts
            ),
            (None, Some(err)) => println!("\nDiagram not rendered: {err}"),
            (None, None) => {}
        }
    }

    if let Some(ArtifactOutcome::Failed { error, .. }) = &report.review {
        println!("\nCode review failed: {error}");
    }

    println!("\nSaved to {}", dir.display());
}
