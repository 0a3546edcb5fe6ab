#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn reqgenie(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("reqgenie").unwrap();
    cmd.current_dir(dir.path())
        .env("REQGENIE_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn init_project(dir: &TempDir) {
    reqgenie(dir).arg("init").assert().success();
}

/// A stand-in model: answers by persona, based on the agent name in the
/// JSON call it receives on stdin.
const FAKE_AGENT: &str = r#"#!/bin/sh
input=$(cat)
case "$input" in
  *'"agent":"Requirements Evaluator"'*)
    echo '{"score": "pass", "feedback": "complete", "improvement_areas": []}' ;;
  *'"agent":"Test Case Generator"'*)
    echo 'TC-001 Login requires a valid one-time code' ;;
  *'"agent":"Code Generator"'*)
    echo 'def verify_otp(code): return len(code) == 6' ;;
  *'"agent":"Diagram Designer"'*)
    echo '{"diagram_type": "2FA", "imports": ["from diagrams.gcp.compute import Run"], "nodes": [{"name": "api", "type": "Run", "label": "API"}], "clusters": [], "connections": []}' ;;
  *'"agent":"Sales Communication Advisor"'*)
    echo 'Lead with data.' ;;
  *)
    echo '# Requirements'
    echo 'FR-001 Users enter a one-time code after their password.' ;;
esac
"#;

#[cfg(unix)]
fn install_fake_agent(dir: &TempDir, artifacts: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.path().join("fake-agent.sh");
    std::fs::write(&script, FAKE_AGENT).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config = format!(
        "agent:\n  type: command\n  program: {}\n  timeout_seconds: 30\nmodel: test-model\nartifacts: {artifacts}\ndiagram:\n  introspect: false\n  python: /nonexistent/python3\n",
        script.display()
    );
    std::fs::write(dir.path().join(".reqgenie/config.yaml"), config).unwrap();
    script
}

fn only_run_dir(root: &Path) -> PathBuf {
    let runs: Vec<PathBuf> = std::fs::read_dir(root.join(".reqgenie/runs"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(runs.len(), 1, "expected exactly one run, got {runs:?}");
    runs.into_iter().next().unwrap()
}

// ---------------------------------------------------------------------------
// reqgenie init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_directory_tree() {
    let dir = TempDir::new().unwrap();
    reqgenie(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .reqgenie/config.yaml"));

    assert!(dir.path().join(".reqgenie/config.yaml").exists());
    assert!(dir.path().join(".reqgenie/runs").is_dir());
    assert!(dir.path().join(".reqgenie/profiles").is_dir());
}

#[test]
fn init_is_idempotent_and_keeps_edits() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let path = dir.path().join(".reqgenie/config.yaml");
    std::fs::write(&path, "model: gpt-4o\n").unwrap();

    reqgenie(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "model: gpt-4o\n");
}

// ---------------------------------------------------------------------------
// reqgenie config
// ---------------------------------------------------------------------------

#[test]
fn config_show_without_init_fails() {
    let dir = TempDir::new().unwrap();
    reqgenie(&dir)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn config_show_fills_defaults_for_empty_file() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(dir.path().join(".reqgenie/config.yaml"), "").unwrap();

    let out = reqgenie(&dir)
        .args(["--json", "config", "show"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["model"], "o3-mini");
    assert_eq!(value["refinement"]["max_iterations"], 2);
    assert_eq!(value["agent"]["type"], "open_ai");
}

#[test]
fn config_validate_reports_errors() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(
        dir.path().join(".reqgenie/config.yaml"),
        "refinement:\n  max_iterations: 0\n",
    )
    .unwrap();

    reqgenie(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] refinement.max_iterations is 0"));
}

#[test]
fn config_validate_clean_default() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    reqgenie(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

// ---------------------------------------------------------------------------
// reqgenie diagram validate
// ---------------------------------------------------------------------------

#[test]
fn diagram_validate_accepts_good_source() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("ok.py");
    std::fs::write(
        &file,
        "from diagrams import Diagram\nfrom diagrams.gcp.compute import Run\n\nwith Diagram(\"x\"):\n    Run(\"api\")\n",
    )
    .unwrap();

    reqgenie(&dir)
        .args(["diagram", "validate", "--no-introspect"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("imports look valid"));
}

#[test]
fn diagram_validate_rejects_merged_imports() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("bad.py");
    std::fs::write(
        &file,
        "from diagrams import Diagram from diagrams.gcp.compute import Run\n",
    )
    .unwrap();

    let out = reqgenie(&dir)
        .args(["--json", "diagram", "validate", "--no-introspect"])
        .arg(&file)
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["valid"], false);
    assert!(value["error"]["message"].as_str().unwrap().contains("from"));
}

#[test]
fn diagram_validate_rejects_unknown_gcp_class() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("bad.py");
    std::fs::write(&file, "from diagrams.gcp.compute import Lambda\n").unwrap();

    reqgenie(&dir)
        .args(["diagram", "validate", "--no-introspect"])
        .arg(&file)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Lambda"));
}

// ---------------------------------------------------------------------------
// reqgenie profile
// ---------------------------------------------------------------------------

#[test]
fn profile_list_show_delete() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(
        dir.path().join(".reqgenie/profiles/Ada_Lovelace.json"),
        r#"{"data": {"first_name": "Ada", "last_name": "Lovelace", "personalities": {"disc_type": "Dc"}}}"#,
    )
    .unwrap();

    reqgenie(&dir)
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ada_Lovelace"));

    reqgenie(&dir)
        .args(["profile", "show", "Ada Lovelace"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ada Lovelace"));

    reqgenie(&dir)
        .args(["profile", "delete", "Ada_Lovelace"])
        .assert()
        .success();

    reqgenie(&dir)
        .args(["profile", "show", "Ada_Lovelace"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn profile_fetch_requires_token() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    reqgenie(&dir)
        .env_remove("CRYSTAL_KNOWS_TOKEN")
        .args(["profile", "fetch", "--email", "ada@example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CRYSTAL_KNOWS_TOKEN"));
}

// ---------------------------------------------------------------------------
// reqgenie tickets
// ---------------------------------------------------------------------------

#[test]
fn tickets_publish_requires_project() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let plan = dir.path().join("tickets.json");
    std::fs::write(
        &plan,
        r#"{"epic": {"summary": "2FA"}, "stories": [{"summary": "Enroll", "story_points": 3}]}"#,
    )
    .unwrap();

    reqgenie(&dir)
        .args(["tickets", "publish"])
        .arg(&plan)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--project"));
}

// ---------------------------------------------------------------------------
// reqgenie run
// ---------------------------------------------------------------------------

#[test]
fn run_without_init_fails() {
    let dir = TempDir::new().unwrap();
    reqgenie(&dir)
        .args(["run", "Add two-factor authentication to login"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reqgenie init"));
}

#[cfg(unix)]
#[test]
fn run_persists_report_and_artifacts() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    install_fake_agent(&dir, "[tests, code]");

    reqgenie(&dir)
        .args(["run", "Add two-factor authentication to login"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FR-001"))
        .stdout(predicate::str::contains("Saved to"));

    let run = only_run_dir(dir.path());
    assert!(run.join("requirements.md").exists());
    assert!(std::fs::read_to_string(run.join("tests.md")).unwrap().contains("TC-001"));
    assert!(std::fs::read_to_string(run.join("code.md")).unwrap().contains("verify_otp"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(run.join("report.json")).unwrap()).unwrap();
    // First-round pass is overridden, so two iterations run.
    assert_eq!(report["iterations"].as_array().unwrap().len(), 2);
    assert_eq!(report["termination"], "passed");
    assert_eq!(report["artifacts"]["tests"]["status"], "ok");
}

#[cfg(unix)]
#[test]
fn run_json_with_single_iteration_and_kinds_override() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    install_fake_agent(&dir, "[tests, code]");

    let out = reqgenie(&dir)
        .args([
            "--json",
            "run",
            "Add two-factor authentication to login",
            "--iterations",
            "1",
            "--kinds",
            "tests",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(report["iterations"].as_array().unwrap().len(), 1);
    let artifacts = report["artifacts"].as_object().unwrap();
    assert_eq!(artifacts.len(), 1);
    assert!(artifacts.contains_key("tests"));
}

#[cfg(unix)]
#[test]
fn run_records_render_failure_but_keeps_diagram() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    install_fake_agent(&dir, "[diagram]");

    let out = reqgenie(&dir)
        .args(["--json", "run", "Add two-factor authentication to login"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(report["artifacts"]["diagram"]["status"], "ok");
    assert!(report["diagram"]["source"]
        .as_str()
        .unwrap()
        .contains("from diagrams.gcp.compute import Run"));
    assert!(report["diagram"]["error"].is_string());

    let run = only_run_dir(dir.path());
    assert!(run.join("diagram.py").exists());
    assert!(!run.join("architecture.png").exists());

    let leftovers = std::fs::read_dir(dir.path().join(".reqgenie/diagrams"))
        .map(|d| d.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0, "failed render left its directory behind");
}

#[test]
fn run_rejects_unknown_kind() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(
        dir.path().join(".reqgenie/config.yaml"),
        "agent:\n  type: command\n  program: /bin/true\n",
    )
    .unwrap();
    reqgenie(&dir)
        .args(["run", "Add 2FA", "--kinds", "slides"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown artifact kind 'slides'"));
}

// ---------------------------------------------------------------------------
// reqgenie advise
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn advise_streams_advisor_reply() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    install_fake_agent(&dir, "[tests]");
    std::fs::write(
        dir.path().join(".reqgenie/profiles/Ada_Lovelace.json"),
        r#"{"data": {"first_name": "Ada", "last_name": "Lovelace"}}"#,
    )
    .unwrap();

    reqgenie(&dir)
        .args(["advise", "Ada_Lovelace", "How do I pitch the new pricing?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Lead with data."));
}
