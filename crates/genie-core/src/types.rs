use crate::error::{GenieError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// ApplicationType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ApplicationType {
    #[default]
    #[serde(rename = "Web Application")]
    WebApplication,
    #[serde(rename = "Mobile App")]
    MobileApp,
    #[serde(rename = "Desktop Application")]
    DesktopApplication,
    #[serde(rename = "API/Service")]
    ApiService,
}

impl ApplicationType {
    pub const ALL: [ApplicationType; 4] = [
        ApplicationType::WebApplication,
        ApplicationType::MobileApp,
        ApplicationType::DesktopApplication,
        ApplicationType::ApiService,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ApplicationType::WebApplication => "Web Application",
            ApplicationType::MobileApp => "Mobile App",
            ApplicationType::DesktopApplication => "Desktop Application",
            ApplicationType::ApiService => "API/Service",
        }
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApplicationType {
    type Err = GenieError;

    fn from_str(s: &str) -> Result<Self> {
        let norm = s.trim().to_lowercase();
        match norm.as_str() {
            "web" | "web application" | "web_application" | "web-application" => {
                Ok(ApplicationType::WebApplication)
            }
            "mobile" | "mobile app" | "mobile_app" | "mobile-app" => Ok(ApplicationType::MobileApp),
            "desktop" | "desktop application" | "desktop_application" | "desktop-application" => {
                Ok(ApplicationType::DesktopApplication)
            }
            "api" | "service" | "api/service" | "api_service" | "api-service" => {
                Ok(ApplicationType::ApiService)
            }
            _ => Err(GenieError::Configuration(format!(
                "unknown application type '{s}' (expected web, mobile, desktop, or api)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// CloudProvider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CloudProvider {
    #[serde(rename = "AWS")]
    Aws,
    #[default]
    #[serde(rename = "GCP")]
    Gcp,
    #[serde(rename = "Azure")]
    Azure,
}

impl CloudProvider {
    pub fn label(self) -> &'static str {
        match self {
            CloudProvider::Aws => "AWS",
            CloudProvider::Gcp => "GCP",
            CloudProvider::Azure => "Azure",
        }
    }

    /// Package under `diagrams.` that holds this provider's node classes.
    pub fn diagrams_package(self) -> &'static str {
        match self {
            CloudProvider::Aws => "diagrams.aws",
            CloudProvider::Gcp => "diagrams.gcp",
            CloudProvider::Azure => "diagrams.azure",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CloudProvider {
    type Err = GenieError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "aws" => Ok(CloudProvider::Aws),
            "gcp" | "google" => Ok(CloudProvider::Gcp),
            "azure" => Ok(CloudProvider::Azure),
            _ => Err(GenieError::Configuration(format!(
                "unknown cloud provider '{s}' (expected AWS, GCP, or Azure)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationKind
// ---------------------------------------------------------------------------

/// One independently generated artifact derived from the final document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    Tests,
    Code,
    Diagram,
    Tickets,
    UseCases,
}

impl GenerationKind {
    pub const ALL: [GenerationKind; 5] = [
        GenerationKind::Tests,
        GenerationKind::Code,
        GenerationKind::Diagram,
        GenerationKind::Tickets,
        GenerationKind::UseCases,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GenerationKind::Tests => "tests",
            GenerationKind::Code => "code",
            GenerationKind::Diagram => "diagram",
            GenerationKind::Tickets => "tickets",
            GenerationKind::UseCases => "use_cases",
        }
    }

    /// File name the artifact is persisted under in a run directory.
    pub fn file_name(self) -> &'static str {
        match self {
            GenerationKind::Tests => "tests.md",
            GenerationKind::Code => "code.md",
            GenerationKind::Diagram => "diagram.json",
            GenerationKind::Tickets => "tickets.json",
            GenerationKind::UseCases => "use_cases.json",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationKind {
    type Err = GenieError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "tests" | "test" | "test_cases" => Ok(GenerationKind::Tests),
            "code" => Ok(GenerationKind::Code),
            "diagram" | "diagrams" => Ok(GenerationKind::Diagram),
            "tickets" | "jira" => Ok(GenerationKind::Tickets),
            "use_cases" | "usecases" => Ok(GenerationKind::UseCases),
            _ => Err(GenieError::Configuration(format!(
                "unknown artifact kind '{s}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// RequirementRequest
// ---------------------------------------------------------------------------

/// One user submission. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementRequest {
    original_text: String,
    application_type: ApplicationType,
    target_language: String,
    max_iterations: u32,
}

impl RequirementRequest {
    pub fn new(
        original_text: impl Into<String>,
        application_type: ApplicationType,
        target_language: impl Into<String>,
        max_iterations: u32,
    ) -> Result<Self> {
        let original_text = original_text.into().trim().to_string();
        if original_text.is_empty() {
            return Err(GenieError::Configuration(
                "requirement text is required".into(),
            ));
        }
        if max_iterations == 0 {
            return Err(GenieError::Configuration(
                "max_iterations must be at least 1".into(),
            ));
        }
        let target_language = target_language.into().trim().to_string();
        let target_language = if target_language.is_empty() {
            "English".to_string()
        } else {
            target_language
        };
        Ok(Self {
            original_text,
            application_type,
            target_language,
            max_iterations,
        })
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn application_type(&self) -> ApplicationType {
        self.application_type
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_type_serializes_as_label() {
        let yaml = serde_yaml::to_string(&ApplicationType::ApiService).unwrap();
        assert_eq!(yaml.trim(), "API/Service");
        let parsed: ApplicationType = serde_yaml::from_str("Mobile App").unwrap();
        assert_eq!(parsed, ApplicationType::MobileApp);
    }

    #[test]
    fn application_type_parses_short_names() {
        assert_eq!("web".parse::<ApplicationType>().unwrap(), ApplicationType::WebApplication);
        assert_eq!("API".parse::<ApplicationType>().unwrap(), ApplicationType::ApiService);
        assert!("fridge".parse::<ApplicationType>().is_err());
    }

    #[test]
    fn cloud_defaults_to_gcp() {
        assert_eq!(CloudProvider::default(), CloudProvider::Gcp);
        assert_eq!("aws".parse::<CloudProvider>().unwrap(), CloudProvider::Aws);
    }

    #[test]
    fn generation_kind_parses_aliases() {
        assert_eq!("use-cases".parse::<GenerationKind>().unwrap(), GenerationKind::UseCases);
        assert_eq!("jira".parse::<GenerationKind>().unwrap(), GenerationKind::Tickets);
        let json = serde_json::to_string(&GenerationKind::UseCases).unwrap();
        assert_eq!(json, "\"use_cases\"");
    }

    #[test]
    fn request_rejects_blank_text() {
        let err = RequirementRequest::new("   ", ApplicationType::default(), "English", 2).unwrap_err();
        assert!(matches!(err, GenieError::Configuration(_)));
    }

    #[test]
    fn request_rejects_zero_iterations() {
        assert!(RequirementRequest::new("x", ApplicationType::default(), "English", 0).is_err());
    }

    #[test]
    fn request_defaults_blank_language_to_english() {
        let req = RequirementRequest::new(" Add login ", ApplicationType::MobileApp, "", 1).unwrap();
        assert_eq!(req.original_text(), "Add login");
        assert_eq!(req.target_language(), "English");
    }
}
