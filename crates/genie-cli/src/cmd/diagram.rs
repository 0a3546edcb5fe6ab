use crate::cmd::{block_on, config_or_default};
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use genie_core::diagram::{
    DiagramRenderer, GraphvizRenderer, ImportValidator, PythonIntrospector, SourceValidator,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Subcommand)]
pub enum DiagramSubcommand {
    /// Check the imports of a diagrams source file
    Validate {
        /// Python source using the `diagrams` package
        file: PathBuf,
        /// Skip module introspection through python
        #[arg(long)]
        no_introspect: bool,
    },

    /// Render a diagrams source file to PNG
    Render {
        file: PathBuf,
        /// Output directory (default: .reqgenie/diagrams)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

pub fn run(root: &Path, subcmd: DiagramSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        DiagramSubcommand::Validate {
            file,
            no_introspect,
        } => validate(root, &file, no_introspect, json),
        DiagramSubcommand::Render { file, out } => render(root, &file, out, json),
    }
}

fn read_source(file: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, file: &Path, no_introspect: bool, json: bool) -> anyhow::Result<()> {
    let config = config_or_default(root)?;
    let source = read_source(file)?;

    let validator = if no_introspect || !config.diagram.introspect {
        ImportValidator::static_only()
    } else {
        ImportValidator::with_introspector(Arc::new(PythonIntrospector::new(
            config.diagram.python.clone(),
        )))
    };
    let result = block_on(validator.validate(&source))?;

    if json {
        let value = match &result {
            Ok(()) => serde_json::json!({ "valid": true }),
            Err(e) => serde_json::json!({ "valid": false, "error": e }),
        };
        print_json(&value)?;
    } else {
        match &result {
            Ok(()) => println!("{}: imports look valid", file.display()),
            Err(e) => {
                println!("{}: {}", file.display(), e.message);
                if let Some(line) = &e.offending_line {
                    println!("  at: {line}");
                }
            }
        }
    }

    if result.is_err() {
        anyhow::bail!("diagram source is invalid");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// render
// ---------------------------------------------------------------------------

fn render(root: &Path, file: &Path, out: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let config = config_or_default(root)?;
    let source = read_source(file)?;
    let out = out.unwrap_or_else(|| config.diagram.output_dir(root));

    let renderer = GraphvizRenderer::new(config.diagram.python.clone(), out)
        .with_timeout(Duration::from_secs(config.diagram.render_timeout_seconds));
    let rendered = block_on(renderer.render(&source))?.context("diagram render failed")?;

    if json {
        print_json(&rendered)?;
    } else {
        println!("Rendered: {}", rendered.image.display());
    }
    Ok(())
}
