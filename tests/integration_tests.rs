//! Integration tests for the brownfield binary.
//!
//! Metrics come from `.brownfield/metrics.json` so no analysis tool is needed.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HEALTHY: &str = r#"{
    "coverage_percent": 72,
    "avg_complexity": 3.5,
    "max_complexity": 8,
    "functions_over_threshold": 0,
    "critical_vulnerabilities": 0,
    "high_vulnerabilities": 1,
    "structure_conforms": true,
    "build_passes": true,
    "docs_present": true
}"#;

const LEGACY: &str = r#"{
    "coverage_percent": 12,
    "avg_complexity": 9,
    "max_complexity": 31,
    "functions_over_threshold": 14,
    "critical_vulnerabilities": 2,
    "high_vulnerabilities": 5,
    "structure_conforms": false,
    "build_passes": false,
    "docs_present": false
}"#;

/// Helper to create a brownfield Command isolated from the caller's environment
fn brownfield(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("brownfield");
    cmd.current_dir(dir)
        .env_remove("BROWNFIELD_METRICS_CMD")
        .env_remove("BROWNFIELD_TOOL_TIMEOUT")
        .env_remove("BROWNFIELD_LOG")
        .env("XDG_CONFIG_HOME", dir.join(".user-config"));
    cmd
}

/// Project with a Cargo.toml marker and a metrics snapshot
fn project_with_metrics(snapshot: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"legacy\"\n").unwrap();
    write_snapshot(dir.path(), snapshot);
    dir
}

fn write_snapshot(dir: &Path, snapshot: &str) {
    fs::create_dir_all(dir.join(".brownfield")).unwrap();
    fs::write(dir.join(".brownfield/metrics.json"), snapshot).unwrap();
}

fn assess(dir: &Path) {
    brownfield(dir).arg("assess").assert().success();
}

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        let dir = TempDir::new().unwrap();
        brownfield(dir.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("assess"))
            .stdout(predicate::str::contains("graduate"));
    }

    #[test]
    fn test_version() {
        let dir = TempDir::new().unwrap();
        brownfield(dir.path()).arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_phase_is_a_usage_error() {
        let dir = TempDir::new().unwrap();
        brownfield(dir.path())
            .args(["advance", "phase9"])
            .assert()
            .failure();
    }
}

mod state_errors {
    use super::*;

    #[test]
    fn test_status_without_state_is_fatal() {
        let dir = TempDir::new().unwrap();
        brownfield(dir.path())
            .arg("status")
            .assert()
            .code(2)
            .stderr(predicate::str::contains("brownfield assess"));
    }

    #[test]
    fn test_corrupted_state_is_fatal() {
        let dir = project_with_metrics(HEALTHY);
        fs::write(dir.path().join(".brownfield/state.json"), "{ not json").unwrap();
        brownfield(dir.path())
            .arg("validate")
            .assert()
            .code(2)
            .stderr(predicate::str::contains("corrupted"));
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let dir = project_with_metrics(HEALTHY);
        assess(dir.path());
        let path = dir.path().join(".brownfield/state.json");
        let mut state: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        state["schema_version"] = serde_json::json!("9.0");
        fs::write(&path, state.to_string()).unwrap();

        brownfield(dir.path()).arg("status").assert().code(2);
    }
}

mod workflow {
    use super::*;

    #[test]
    fn test_assess_captures_baseline() {
        let dir = project_with_metrics(LEGACY);
        brownfield(dir.path())
            .arg("assess")
            .assert()
            .success()
            .stdout(predicate::str::contains("Baseline captured"))
            .stdout(predicate::str::contains("Language: rust"));

        let state: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join(".brownfield/state.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(state["current_phase"], "assessment");
        assert_eq!(state["schema_version"], "1.1");
        assert_eq!(state["baseline_metrics"]["coverage_percent"], 12.0);
    }

    #[test]
    fn test_first_assess_reaches_log_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"legacy\"\n").unwrap();
        fs::write(dir.path().join("snapshot.json"), LEGACY).unwrap();
        brownfield(dir.path())
            .arg("assess")
            .env("BROWNFIELD_METRICS_CMD", "cat snapshot.json")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized"));

        let log = fs::read_to_string(dir.path().join(".brownfield/logs/brownfield.log")).unwrap();
        assert!(log.contains("baseline captured"));
    }

    #[test]
    fn test_assess_with_metrics_command() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("snapshot.json"), HEALTHY).unwrap();
        brownfield(dir.path())
            .args(["assess", "--language", "python"])
            .env("BROWNFIELD_METRICS_CMD", "cat snapshot.json")
            .assert()
            .success()
            .stdout(predicate::str::contains("Language: python"));
    }

    #[test]
    fn test_assess_unknown_language_fails() {
        let dir = project_with_metrics(HEALTHY);
        brownfield(dir.path())
            .args(["assess", "--language", "cobol"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("cobol"));
    }

    #[test]
    fn test_validate_exit_codes() {
        let dir = project_with_metrics(LEGACY);
        assess(dir.path());
        brownfield(dir.path())
            .arg("validate")
            .assert()
            .code(1)
            .stdout(predicate::str::contains("[coverage]"));

        write_snapshot(dir.path(), HEALTHY);
        assess(dir.path());
        brownfield(dir.path()).arg("validate").assert().success();
    }

    #[test]
    fn test_validate_json() {
        let dir = project_with_metrics(LEGACY);
        assess(dir.path());
        let output = brownfield(dir.path())
            .args(["validate", "--json"])
            .output()
            .unwrap();
        let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(report["all_required_passed"], false);
        assert_eq!(report["results"].as_array().unwrap().len(), 7);
    }

    #[test]
    fn test_advance_blocked_by_gates() {
        let dir = project_with_metrics(LEGACY);
        assess(dir.path());
        brownfield(dir.path())
            .args(["advance", "structure"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Advanced"));

        brownfield(dir.path())
            .args(["advance", "testing"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("structure"))
            .stderr(predicate::str::contains("build"));

        brownfield(dir.path())
            .args(["status", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"current_phase\": \"structure\""));
    }

    #[test]
    fn test_advance_cannot_skip() {
        let dir = project_with_metrics(HEALTHY);
        assess(dir.path());
        brownfield(dir.path())
            .args(["advance", "quality"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("not the next phase"));
    }

    #[test]
    fn test_status_shows_phase_and_gates() {
        let dir = project_with_metrics(HEALTHY);
        assess(dir.path());
        brownfield(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Phase:     assessment"))
            .stdout(predicate::str::contains("coverage_percent"));
    }

    #[test]
    fn test_restart_without_checkpoint() {
        let dir = project_with_metrics(HEALTHY);
        assess(dir.path());
        brownfield(dir.path())
            .args(["restart", "testing"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No checkpoint"));
    }

    #[test]
    fn test_resume_without_checkpoint_is_fatal() {
        let dir = project_with_metrics(HEALTHY);
        assess(dir.path());
        brownfield(dir.path()).arg("resume").assert().code(2);
    }

    #[test]
    fn test_graduate_requires_graduation_phase() {
        let dir = project_with_metrics(HEALTHY);
        assess(dir.path());
        brownfield(dir.path())
            .args(["graduate", "--yes"])
            .assert()
            .code(1);
    }
}

mod config {
    use super::*;

    #[test]
    fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        brownfield(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created"));
        assert!(dir.path().join(".brownfield/brownfield.toml").is_file());
        assert!(dir.path().join(".brownfield/.gitignore").is_file());

        brownfield(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        brownfield(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("coverage_min = 60"))
            .stdout(predicate::str::contains("tool timeout = 300s"));
    }

    #[test]
    fn test_config_show_cli_timeout_override() {
        let dir = TempDir::new().unwrap();
        brownfield(dir.path())
            .args(["config", "show", "--timeout", "5"])
            .env("BROWNFIELD_TOOL_TIMEOUT", "42")
            .assert()
            .success()
            .stdout(predicate::str::contains("tool timeout = 5s"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".brownfield")).unwrap();
        fs::write(
            dir.path().join(".brownfield/brownfield.toml"),
            "[tools]\ntimeout_secs = 0\n\n[project]\nlanguage = \"cobol\"\n",
        )
        .unwrap();
        brownfield(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("timeout_secs is 0"))
            .stdout(predicate::str::contains("cobol"));
    }

    #[test]
    fn test_env_override_in_config_show() {
        let dir = TempDir::new().unwrap();
        brownfield(dir.path())
            .args(["config", "show"])
            .env("BROWNFIELD_TOOL_TIMEOUT", "42")
            .assert()
            .success()
            .stdout(predicate::str::contains("tool timeout = 42s"));
    }
}
