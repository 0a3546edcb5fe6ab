use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const GENIE_DIR: &str = ".reqgenie";
pub const RUNS_DIR: &str = ".reqgenie/runs";
pub const PROFILES_DIR: &str = ".reqgenie/profiles";
pub const DIAGRAMS_DIR: &str = ".reqgenie/diagrams";

pub const CONFIG_FILE: &str = ".reqgenie/config.yaml";
pub const REPORT_FILE: &str = "report.json";
pub const REQUIREMENTS_FILE: &str = "requirements.md";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn genie_dir(root: &Path) -> PathBuf {
    root.join(GENIE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn run_dir(root: &Path, run_id: &str) -> PathBuf {
    root.join(RUNS_DIR).join(run_id)
}

pub fn profiles_dir(root: &Path) -> PathBuf {
    root.join(PROFILES_DIR)
}

pub fn profile_path(root: &Path, stem: &str) -> PathBuf {
    profiles_dir(root).join(format!("{stem}.json"))
}

pub fn diagrams_dir(root: &Path) -> PathBuf {
    root.join(DIAGRAMS_DIR)
}

// ---------------------------------------------------------------------------
// File-name sanitizing
// ---------------------------------------------------------------------------

static UNSAFE_RE: OnceLock<Regex> = OnceLock::new();

fn unsafe_re() -> &'static Regex {
    UNSAFE_RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_\-]+").unwrap())
}

/// Reduce a display name to a safe file stem: spaces become `_`, anything
/// else outside `[A-Za-z0-9_-]` is dropped. Never returns an empty string.
pub fn sanitize_stem(name: &str) -> String {
    let underscored = name.trim().replace(' ', "_");
    let cleaned = unsafe_re().replace_all(&underscored, "");
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.reqgenie/config.yaml")
        );
        assert_eq!(
            profile_path(root, "Ada_Lovelace"),
            PathBuf::from("/tmp/proj/.reqgenie/profiles/Ada_Lovelace.json")
        );
        assert_eq!(
            run_dir(root, "abc"),
            PathBuf::from("/tmp/proj/.reqgenie/runs/abc")
        );
    }

    #[test]
    fn sanitize_strips_path_characters() {
        assert_eq!(sanitize_stem("Ada Lovelace"), "Ada_Lovelace");
        assert_eq!(sanitize_stem("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_stem("  "), "unnamed");
        assert_eq!(sanitize_stem("O'Brien_Seán"), "OBrien_Sen");
    }
}
