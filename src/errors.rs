//! Typed error hierarchy for the brownfield orchestrator.
//!
//! A single `BrownfieldError` enum covers every subsystem. Each variant
//! belongs to one `ErrorClass`, which decides the process exit code:
//! - `UserRecoverable`: gate, phase and handler problems the operator can fix (exit 1)
//! - `ToolEnvironment`: external tools missing or failing (exit 1)
//! - `Fatal`: state corruption, schema mismatch, failed writes (exit 2)
//! - `Interrupted`: operator cancelled a running phase (exit 130)

use std::path::PathBuf;
use thiserror::Error;

use crate::gates::GateResult;
use crate::phase::Phase;

/// Exit code for success / all gates passed.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for recoverable failures, including failing gates.
pub const EXIT_GATE_FAILURE: i32 = 1;
/// Exit code for state or schema errors.
pub const EXIT_FATAL: i32 = 2;
/// Exit code after an operator interrupt (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

/// Broad category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    UserRecoverable,
    ToolEnvironment,
    Fatal,
    Interrupted,
}

impl ErrorClass {
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorClass::UserRecoverable | ErrorClass::ToolEnvironment => EXIT_GATE_FAILURE,
            ErrorClass::Fatal => EXIT_FATAL,
            ErrorClass::Interrupted => EXIT_INTERRUPTED,
        }
    }
}

#[derive(Debug, Error)]
pub enum BrownfieldError {
    #[error("Cannot advance from {from} to {target}: {reason}{}", render_failures(.failures))]
    PhasePrecondition {
        from: Phase,
        target: Phase,
        reason: String,
        failures: Vec<GateResult>,
    },

    #[error("Gate validation failed in phase {phase}{}", render_failures(.failures))]
    GateValidation {
        phase: Phase,
        failures: Vec<GateResult>,
    },

    #[error("Unsupported language '{key}' (registered: {})", .known.join(", "))]
    UnsupportedLanguage { key: String, known: Vec<String> },

    #[error("A language handler is already registered for '{key}'")]
    DuplicateHandler { key: String },

    #[error("Every task in phase {phase} is already complete")]
    PhaseAlreadyComplete { phase: Phase },

    #[error("Checkpoint for phase {phase} failed at task '{task_id}' and cannot be resumed")]
    CheckpointFailed { phase: Phase, task_id: String },

    #[error("{action} requires explicit confirmation")]
    ConfirmationRequired { action: String },

    #[error("Tool '{tool}' timed out after {timeout_secs}s (retried {attempts} time(s))")]
    ToolTimeout {
        tool: String,
        timeout_secs: u64,
        attempts: u32,
    },

    #[error("Tool '{tool}' is not available")]
    ToolNotFound { tool: String },

    #[error("Tool '{tool}' exited with code {exit_code}: {stderr}")]
    ToolFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Interrupted during phase {phase}; checkpoint saved as interrupted")]
    Interrupted { phase: Phase },

    #[error("Gate '{gate}' references unknown metric path '{path}'")]
    MetricNotFound { gate: String, path: String },

    #[error("Gate '{gate}' compares metric '{path}' of type {found} against a {expected} threshold")]
    MetricTypeMismatch {
        gate: String,
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("No persisted state at {}", .path.display())]
    StateNotFound { path: PathBuf },

    #[error("State file {} is corrupted: {source}", .path.display())]
    StateCorrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("State schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: String, supported: String },

    #[error("Atomic write to {} failed: {source}", .path.display())]
    AtomicWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BrownfieldError {
    pub fn class(&self) -> ErrorClass {
        match self {
            BrownfieldError::PhasePrecondition { .. }
            | BrownfieldError::GateValidation { .. }
            | BrownfieldError::UnsupportedLanguage { .. }
            | BrownfieldError::DuplicateHandler { .. }
            | BrownfieldError::PhaseAlreadyComplete { .. }
            | BrownfieldError::CheckpointFailed { .. }
            | BrownfieldError::ConfirmationRequired { .. } => ErrorClass::UserRecoverable,
            BrownfieldError::ToolTimeout { .. }
            | BrownfieldError::ToolNotFound { .. }
            | BrownfieldError::ToolFailed { .. } => ErrorClass::ToolEnvironment,
            BrownfieldError::Interrupted { .. } => ErrorClass::Interrupted,
            BrownfieldError::MetricNotFound { .. }
            | BrownfieldError::MetricTypeMismatch { .. }
            | BrownfieldError::StateNotFound { .. }
            | BrownfieldError::StateCorrupted { .. }
            | BrownfieldError::UnsupportedSchema { .. }
            | BrownfieldError::AtomicWrite { .. }
            | BrownfieldError::Io { .. }
            | BrownfieldError::InvalidConfig(_) => ErrorClass::Fatal,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.class().exit_code()
    }

    /// The command an operator should run next.
    pub fn remediation(&self) -> Option<String> {
        let hint = match self {
            BrownfieldError::PhasePrecondition { from, .. } => {
                format!("run 'brownfield run' to finish {from}, then 'brownfield assess'")
            }
            BrownfieldError::GateValidation { .. } => {
                "fix the failing gates, then run 'brownfield assess'".to_string()
            }
            BrownfieldError::UnsupportedLanguage { .. } => {
                "pass 'brownfield assess --language <key>' or add a [[languages]] profile"
                    .to_string()
            }
            BrownfieldError::PhaseAlreadyComplete { phase } => format!(
                "run 'brownfield assess' and 'brownfield advance <next-phase>', or 'brownfield restart {phase}' to run it again"
            ),
            BrownfieldError::CheckpointFailed { phase, .. } => {
                format!("run 'brownfield restart {phase}'")
            }
            BrownfieldError::ConfirmationRequired { .. } => "re-run with --yes".to_string(),
            BrownfieldError::ToolTimeout { .. } => {
                "raise [tools] timeout_secs or pass --timeout, then 'brownfield resume'"
                    .to_string()
            }
            BrownfieldError::ToolNotFound { tool } => {
                format!("install '{tool}' or adjust brownfield.toml")
            }
            BrownfieldError::ToolFailed { .. } => {
                "inspect the tool output, then 'brownfield restart <phase>' and 'brownfield run'"
                    .to_string()
            }
            BrownfieldError::Interrupted { .. } => "run 'brownfield resume'".to_string(),
            BrownfieldError::StateNotFound { .. } => "run 'brownfield assess'".to_string(),
            BrownfieldError::UnsupportedSchema { .. } => {
                "upgrade brownfield to read this state".to_string()
            }
            BrownfieldError::InvalidConfig(_) => "run 'brownfield config validate'".to_string(),
            _ => return None,
        };
        Some(hint)
    }
}

fn render_failures(failures: &[GateResult]) -> String {
    failures
        .iter()
        .map(|f| format!("\n  - {}", f.describe()))
        .collect()
}

pub type Result<T, E = BrownfieldError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::{GateStatus, MetricValue};

    fn failing_result() -> GateResult {
        GateResult {
            gate_id: "coverage".to_string(),
            gate_name: "Test coverage".to_string(),
            metric_path: "coverage_percent".to_string(),
            requirement: ">= 60".to_string(),
            required: true,
            status: GateStatus::Failed,
            passed: false,
            current_value: Some(MetricValue::Number(48.0)),
            message: "coverage_percent is 48, required >= 60".to_string(),
        }
    }

    #[test]
    fn precondition_error_lists_failing_gates() {
        let err = BrownfieldError::PhasePrecondition {
            from: Phase::Testing,
            target: Phase::Quality,
            reason: "1 required gate failing".to_string(),
            failures: vec![failing_result()],
        };
        let msg = err.to_string();
        assert!(msg.contains("testing"));
        assert!(msg.contains("quality"));
        assert!(msg.contains("coverage"));
        assert!(msg.contains("48"));
        assert_eq!(err.exit_code(), EXIT_GATE_FAILURE);
    }

    #[test]
    fn fatal_errors_exit_with_two() {
        let err = BrownfieldError::UnsupportedSchema {
            found: "9.0".to_string(),
            supported: "1.1".to_string(),
        };
        assert_eq!(err.class(), ErrorClass::Fatal);
        assert_eq!(err.exit_code(), EXIT_FATAL);

        let err = BrownfieldError::StateNotFound {
            path: PathBuf::from("/p/.brownfield/state.json"),
        };
        assert_eq!(err.exit_code(), EXIT_FATAL);
        assert!(err.to_string().contains("state.json"));
    }

    #[test]
    fn tool_errors_are_tool_environment() {
        let err = BrownfieldError::ToolTimeout {
            tool: "pytest".to_string(),
            timeout_secs: 300,
            attempts: 1,
        };
        assert_eq!(err.class(), ErrorClass::ToolEnvironment);
        assert_eq!(err.exit_code(), EXIT_GATE_FAILURE);
        assert!(err.to_string().contains("300"));
    }

    #[test]
    fn interrupted_uses_sigint_exit_code() {
        let err = BrownfieldError::Interrupted {
            phase: Phase::Testing,
        };
        assert_eq!(err.exit_code(), EXIT_INTERRUPTED);
        assert_eq!(err.remediation().as_deref(), Some("run 'brownfield resume'"));
    }

    #[test]
    fn checkpoint_failed_suggests_restart() {
        let err = BrownfieldError::CheckpointFailed {
            phase: Phase::Quality,
            task_id: "install-linters".to_string(),
        };
        assert_eq!(
            err.remediation().as_deref(),
            Some("run 'brownfield restart quality'")
        );
    }

    #[test]
    fn all_variants_implement_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&BrownfieldError::DuplicateHandler {
            key: "rust".into(),
        });
        assert_std_error(&BrownfieldError::InvalidConfig("x".into()));
    }
}
