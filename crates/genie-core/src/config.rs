use crate::diagram::DEFAULT_REPAIR_ATTEMPTS;
use crate::error::{GenieError, Result};
use crate::paths;
use crate::profile::DEFAULT_PROFILE_BASE_URL;
use crate::refine::RefinePolicy;
use crate::types::{ApplicationType, CloudProvider, GenerationKind};
use genie_agent::{
    AgentRuntime, CommandRuntime, Guardrail, Invoker, MinWords, OpenAiRuntime, RequiredSections,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const KNOWN_LANGUAGES: &[&str] = &["English", "Japanese", "Italian"];

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// AgentBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentBackend {
    OpenAi {
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_agent_timeout")]
        timeout_seconds: u64,
    },
    /// Any program that reads one JSON call on stdin and streams the reply
    /// on stdout.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_agent_timeout")]
        timeout_seconds: u64,
    },
}

fn default_base_url() -> String {
    genie_agent::openai::DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_agent_timeout() -> u64 {
    300
}

impl Default for AgentBackend {
    fn default() -> Self {
        AgentBackend::OpenAi {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_seconds: default_agent_timeout(),
        }
    }
}

impl AgentBackend {
    /// Build the runtime. Credentials are read from the environment here,
    /// so a missing key fails at the first command that needs a model.
    pub fn runtime(&self) -> Result<Arc<dyn AgentRuntime>> {
        let runtime: Arc<dyn AgentRuntime> = match self {
            AgentBackend::OpenAi {
                base_url,
                api_key_env,
                timeout_seconds,
            } => Arc::new(OpenAiRuntime::from_env(
                base_url.clone(),
                api_key_env,
                Duration::from_secs(*timeout_seconds),
            )?),
            AgentBackend::Command {
                program,
                args,
                timeout_seconds,
            } => {
                if program.trim().is_empty() {
                    return Err(GenieError::Configuration(
                        "agent.program must not be empty".into(),
                    ));
                }
                Arc::new(
                    CommandRuntime::new(program.clone(), args.clone())
                        .with_timeout(Duration::from_secs(*timeout_seconds)),
                )
            }
        };
        tracing::debug!(runtime = runtime.name(), "agent runtime ready");
        Ok(runtime)
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_true")]
    pub force_at_least_one_refinement: bool,
}

fn default_max_iterations() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            force_at_least_one_refinement: true,
        }
    }
}

impl RefinementConfig {
    pub fn policy(&self) -> RefinePolicy {
        RefinePolicy {
            force_at_least_one_refinement: self.force_at_least_one_refinement,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramConfig {
    #[serde(default = "default_repair_attempts")]
    pub repair_attempts: u32,
    #[serde(default = "default_render_timeout")]
    pub render_timeout_seconds: u64,
    #[serde(default = "default_python")]
    pub python: String,
    /// Relative paths resolve against the project root. Defaults to
    /// `.reqgenie/diagrams`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Ask the interpreter whether non-catalog modules and classes exist.
    #[serde(default = "default_true")]
    pub introspect: bool,
}

fn default_repair_attempts() -> u32 {
    DEFAULT_REPAIR_ATTEMPTS
}

fn default_render_timeout() -> u64 {
    30
}

fn default_python() -> String {
    "python3".to_string()
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            repair_attempts: default_repair_attempts(),
            render_timeout_seconds: default_render_timeout(),
            python: default_python(),
            output_dir: None,
            introspect: true,
        }
    }
}

impl DiagramConfig {
    pub fn output_dir(&self, root: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => root.join(dir),
            None => paths::diagrams_dir(root),
        }
    }
}

/// Optional policy checks. Both are off unless configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Reject requirements with fewer words than this before any model
    /// call. 0 disables the check.
    #[serde(default)]
    pub min_words: usize,
    /// Require the elaborated document to contain the standard sections.
    #[serde(default)]
    pub required_sections: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    #[serde(default = "default_jira_url_env")]
    pub base_url_env: String,
    #[serde(default = "default_jira_email_env")]
    pub email_env: String,
    #[serde(default = "default_jira_token_env")]
    pub token_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_key: Option<String>,
}

fn default_jira_url_env() -> String {
    "JIRA_BASE_URL".to_string()
}

fn default_jira_email_env() -> String {
    "JIRA_EMAIL".to_string()
}

fn default_jira_token_env() -> String {
    "JIRA_API_TOKEN".to_string()
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url_env: default_jira_url_env(),
            email_env: default_jira_email_env(),
            token_env: default_jira_token_env(),
            project_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilesConfig {
    #[serde(default = "default_profile_token_env")]
    pub token_env: String,
    #[serde(default = "default_profile_base_url")]
    pub base_url: String,
}

fn default_profile_token_env() -> String {
    "CRYSTAL_KNOWS_TOKEN".to_string()
}

fn default_profile_base_url() -> String {
    DEFAULT_PROFILE_BASE_URL.to_string()
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            token_env: default_profile_token_env(),
            base_url: default_profile_base_url(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentBackend,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub cloud: CloudProvider,
    #[serde(default)]
    pub application_type: ApplicationType,
    #[serde(default)]
    pub refinement: RefinementConfig,
    #[serde(default)]
    pub diagram: DiagramConfig,
    #[serde(default = "default_artifacts")]
    pub artifacts: Vec<GenerationKind>,
    #[serde(default)]
    pub guardrails: GuardrailConfig,
    #[serde(default)]
    pub jira: JiraConfig,
    #[serde(default)]
    pub profiles: ProfilesConfig,
}

fn default_model() -> String {
    "o3-mini".to_string()
}

fn default_language() -> String {
    "English".to_string()
}

fn default_artifacts() -> Vec<GenerationKind> {
    vec![
        GenerationKind::Tests,
        GenerationKind::Code,
        GenerationKind::Diagram,
        GenerationKind::Tickets,
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent: AgentBackend::default(),
            model: default_model(),
            language: default_language(),
            cloud: CloudProvider::default(),
            application_type: ApplicationType::default(),
            refinement: RefinementConfig::default(),
            diagram: DiagramConfig::default(),
            artifacts: default_artifacts(),
            guardrails: GuardrailConfig::default(),
            jira: JiraConfig::default(),
            profiles: ProfilesConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(GenieError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Invoker over the configured runtime, with the configured output
    /// guardrails attached to the elaborator.
    pub fn build_invoker(&self) -> Result<Invoker> {
        let mut invoker = Invoker::new(self.agent.runtime()?);
        if self.guardrails.required_sections {
            invoker = invoker.guard_output(
                crate::agents::ELABORATOR,
                Arc::new(RequiredSections::default()),
            );
        }
        Ok(invoker)
    }

    /// Checks applied to the raw requirement before the pipeline starts.
    pub fn input_guardrails(&self) -> Vec<Arc<dyn Guardrail>> {
        let mut guards: Vec<Arc<dyn Guardrail>> = Vec::new();
        if self.guardrails.min_words > 0 {
            guards.push(Arc::new(MinWords {
                min: self.guardrails.min_words,
            }));
        }
        guards
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message })
        };

        if self.refinement.max_iterations == 0 {
            push(
                WarnLevel::Error,
                "refinement.max_iterations is 0; at least one iteration is required".into(),
            );
        } else if self.refinement.max_iterations > 10 {
            push(
                WarnLevel::Warning,
                format!(
                    "refinement.max_iterations={} (>10 is unusual and costly)",
                    self.refinement.max_iterations
                ),
            );
        }

        if self.diagram.repair_attempts == 0 {
            push(
                WarnLevel::Warning,
                "diagram.repair_attempts is 0; invalid diagram source will never be repaired".into(),
            );
        }
        if self.diagram.render_timeout_seconds == 0 {
            push(
                WarnLevel::Error,
                "diagram.render_timeout_seconds is 0; every render would time out".into(),
            );
        }

        if let AgentBackend::Command { program, .. } = &self.agent {
            if program.trim().is_empty() {
                push(WarnLevel::Error, "agent.program is empty".into());
            }
        }

        if self.model.trim().is_empty() {
            push(WarnLevel::Error, "model is empty".into());
        }

        if !KNOWN_LANGUAGES.contains(&self.language.as_str()) {
            push(
                WarnLevel::Warning,
                format!(
                    "language '{}' has no tailored instruction; a generic one will be used",
                    self.language
                ),
            );
        }

        if self.artifacts.is_empty() {
            push(
                WarnLevel::Warning,
                "artifacts is empty; runs will only produce the requirements document".into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
