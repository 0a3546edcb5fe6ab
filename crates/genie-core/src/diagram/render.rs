//! Executes `diagrams` source with a Python interpreter to produce a PNG.
//!
//! Each render runs in its own freshly created directory, so concurrent
//! renders never collide on output file names. A failed render removes its
//! directory; a successful one leaves it to the caller (see
//! [`RenderedDiagram::discard`]). Graphviz must be reachable as `dot` on
//! `PATH`; its absence is reported before any Python is executed.
//!
//! # Failure mapping
//! Every way the toolchain can fail becomes a distinct [`GenieError::Render`]
//! message: missing Graphviz, missing `diagrams` package, permission errors,
//! Python syntax errors, timeouts, and a clean exit that produced no image.

use crate::error::{GenieError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use uuid::Uuid;

const SCRIPT_NAME: &str = "diagram.py";
const DOT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

const GRAPHVIZ_INSTALL: &str = "Graphviz is required but not installed. Please install it:\n\
- On macOS: brew install graphviz\n\
- On Windows: Download from https://graphviz.org/download/\n\
- On Linux: sudo apt-get install graphviz\n\n\
After installation, make sure the 'dot' command is available in your PATH.";

fn missing_module_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"No module named '([^']+)'").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDiagram {
    pub image: PathBuf,
    /// The source as executed, kept next to the image.
    pub source: PathBuf,
    /// Directory owned by this render.
    pub dir: PathBuf,
}

impl RenderedDiagram {
    /// Remove the render directory once the image has been copied elsewhere.
    pub fn discard(&self) -> Result<()> {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    async fn render(&self, source: &str) -> Result<RenderedDiagram>;
}

/// Renders through `python <dir>/diagram.py` with Graphviz on `PATH`.
pub struct GraphvizRenderer {
    python: String,
    timeout: Duration,
    output_dir: PathBuf,
    check_dot: bool,
}

impl GraphvizRenderer {
    pub fn new(python: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            timeout: Duration::from_secs(30),
            output_dir: output_dir.into(),
            check_dot: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip the `dot -V` check, for interpreters that do not need Graphviz.
    pub fn with_dot_check(mut self, check: bool) -> Self {
        self.check_dot = check;
        self
    }

    async fn render_in(&self, dir: &Path, source: &str) -> Result<RenderedDiagram> {
        let script = dir.join(SCRIPT_NAME);
        tokio::fs::write(&script, source).await?;

        tracing::info!(dir = %dir.display(), python = %self.python, "rendering diagram");
        let child = Command::new(&self.python)
            .arg(SCRIPT_NAME)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GenieError::Render(format!("Error rendering diagram: cannot run {}: {e}", self.python)))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(out) => out?,
            Err(_) => {
                return Err(GenieError::Render(format!(
                    "Diagram rendering timed out after {} seconds",
                    self.timeout.as_secs()
                )))
            }
        };
        tracing::debug!(status = ?output.status.code(), "render subprocess exited");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GenieError::Render(describe_failure(stderr.trim())));
        }

        match find_image(dir)? {
            Some(image) => Ok(RenderedDiagram {
                image,
                source: script,
                dir: dir.to_path_buf(),
            }),
            None => Err(GenieError::Render(
                "Diagram code executed successfully but no image was generated. This might be due \
                 to missing Graphviz dependencies or configuration issues."
                    .into(),
            )),
        }
    }
}

/// Check that Graphviz `dot` is installed. Returns its version banner.
pub async fn check_graphviz() -> Result<String> {
    let dot = which::which("dot").map_err(|_| {
        GenieError::Render(format!(
            "Graphviz command 'dot' not found. Please install Graphviz.\n\n{GRAPHVIZ_INSTALL}"
        ))
    })?;

    let child = Command::new(dot)
        .arg("-V")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| GenieError::Render(format!("Error checking for Graphviz: {e}")))?;

    let output = tokio::time::timeout(DOT_CHECK_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| GenieError::Render("Error checking for Graphviz: 'dot -V' timed out".into()))?
        .map_err(|e| GenieError::Render(format!("Error checking for Graphviz: {e}")))?;

    if !output.status.success() {
        return Err(GenieError::Render(format!(
            "Graphviz command 'dot' returned an error\n\n{GRAPHVIZ_INSTALL}"
        )));
    }
    // dot prints its version on stderr.
    let banner = String::from_utf8_lossy(&output.stderr).trim().to_string();
    tracing::debug!(%banner, "graphviz available");
    Ok(banner)
}

#[async_trait]
impl DiagramRenderer for GraphvizRenderer {
    async fn render(&self, source: &str) -> Result<RenderedDiagram> {
        if self.check_dot {
            check_graphviz().await?;
        }

        let dir = self.output_dir.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;
        let rendered = self.render_in(&dir, source).await;
        if rendered.is_err() {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to remove render dir");
            }
        }
        rendered
    }
}

/// Map interpreter stderr to a message a user can act on.
fn describe_failure(stderr: &str) -> String {
    if stderr.contains("ModuleNotFoundError") {
        if let Some(caps) = missing_module_re().captures(stderr) {
            let module = &caps[1];
            if module == "graphviz" {
                return format!("Error: {GRAPHVIZ_INSTALL}");
            }
            if module.starts_with("diagrams") {
                return "Error: The 'diagrams' Python package is missing. Install it with: pip install diagrams"
                    .into();
            }
            return format!(
                "Error executing diagram code: Module '{module}' not found.\nPlease check the \
                 diagrams documentation at https://diagrams.mingrammer.com/docs/nodes/gcp"
            );
        }
    }
    if stderr.contains("Permission denied") {
        return "Error: Permission denied when trying to create the diagram file. Please check \
                your folder permissions."
            .into();
    }
    if stderr.contains("SyntaxError") {
        return format!("Syntax error in diagram code: {stderr}");
    }
    format!("Error executing diagram code: {stderr}")
}

fn find_image(dir: &Path) -> Result<Option<PathBuf>> {
    let mut pngs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|x| x == "png"))
        .collect();
    pngs.sort();
    Ok(pngs.into_iter().next())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
