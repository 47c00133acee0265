//! Remediation phase definitions.
//!
//! This module provides:
//! - `Phase`, the fixed, ordered set of remediation stages
//! - `PhaseTimestamps`, entry/completion stamps recorded per phase
//! - Ordering helpers used by the orchestrator (`next`, `previous`, `all`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ordered stage of the remediation workflow.
///
/// Variant order is significant: `Ord` follows declaration order, so
/// `Phase::Assessment < Phase::Graduation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Capture the baseline and detect the ecosystem
    Assessment,
    /// Bring the tree into conventional layout; formatters and a green build
    Structure,
    /// Bootstrap a test suite up to the coverage target
    Testing,
    /// Linters, complexity reduction, documentation
    Quality,
    /// Full gate sweep including security and repository hygiene
    Validation,
    /// Terminal phase; graduation is confirmed separately
    Graduation,
}

impl Phase {
    /// Returns all phases in workflow order.
    pub fn all() -> &'static [Phase] {
        &[
            Phase::Assessment,
            Phase::Structure,
            Phase::Testing,
            Phase::Quality,
            Phase::Validation,
            Phase::Graduation,
        ]
    }

    /// Zero-based position in the workflow.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The immediate successor, or `None` for the terminal phase.
    pub fn next(&self) -> Option<Phase> {
        Phase::all().get(self.index() + 1).copied()
    }

    /// The immediate predecessor, or `None` for the first phase.
    pub fn previous(&self) -> Option<Phase> {
        self.index().checked_sub(1).map(|i| Phase::all()[i])
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Graduation)
    }

    /// Returns the phase name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Assessment => "assessment",
            Phase::Structure => "structure",
            Phase::Testing => "testing",
            Phase::Quality => "quality",
            Phase::Validation => "validation",
            Phase::Graduation => "graduation",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "assessment" | "assess" | "0" => Ok(Phase::Assessment),
            "structure" | "1" => Ok(Phase::Structure),
            "testing" | "test" | "2" => Ok(Phase::Testing),
            "quality" | "3" => Ok(Phase::Quality),
            "validation" | "validate" | "4" => Ok(Phase::Validation),
            "graduation" | "graduate" | "5" => Ok(Phase::Graduation),
            _ => anyhow::bail!(
                "Invalid phase '{}'. Valid values: assessment, structure, testing, quality, validation, graduation",
                s
            ),
        }
    }
}

/// Entry and completion stamps for a single phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimestamps {
    pub entered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PhaseTimestamps {
    pub fn entered_now() -> Self {
        Self {
            entered_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_ordering_follows_workflow() {
        let phases = Phase::all();
        for pair in phases.windows(2) {
            assert!(pair[0] < pair[1], "{} should precede {}", pair[0], pair[1]);
        }
        assert_eq!(phases.len(), 6);
    }

    #[test]
    fn test_next_and_previous() {
        assert_eq!(Phase::Assessment.next(), Some(Phase::Structure));
        assert_eq!(Phase::Validation.next(), Some(Phase::Graduation));
        assert_eq!(Phase::Graduation.next(), None);
        assert_eq!(Phase::Assessment.previous(), None);
        assert_eq!(Phase::Testing.previous(), Some(Phase::Structure));
    }

    #[test]
    fn test_only_graduation_is_terminal() {
        for phase in Phase::all() {
            assert_eq!(phase.is_terminal(), *phase == Phase::Graduation);
        }
    }

    #[test]
    fn test_phase_from_str_accepts_aliases() {
        assert_eq!("TESTING".parse::<Phase>().unwrap(), Phase::Testing);
        assert_eq!("assess".parse::<Phase>().unwrap(), Phase::Assessment);
        assert_eq!("4".parse::<Phase>().unwrap(), Phase::Validation);
        assert!("deploy".parse::<Phase>().is_err());
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&Phase::Quality).unwrap();
        assert_eq!(json, "\"quality\"");
        let parsed: Phase = serde_json::from_str("\"graduation\"").unwrap();
        assert_eq!(parsed, Phase::Graduation);
    }

    #[test]
    fn test_phase_timestamps_completion() {
        let mut stamps = PhaseTimestamps::entered_now();
        assert!(!stamps.is_completed());
        stamps.completed_at = Some(Utc::now());
        assert!(stamps.is_completed());
    }
}
