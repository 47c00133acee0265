//! Declarative quality gates.
//!
//! A `Gate` compares one metric path against a threshold. Evaluation lives in
//! `validator`, the built-in gate set and phase relevance in `builtin`.

pub mod builtin;
pub mod validator;

use serde::{Deserialize, Serialize};

use crate::phase::Phase;

pub use crate::metrics::MetricValue;
pub use builtin::{GateSet, GateThresholds, canonical_gates};
pub use validator::{GateReport, evaluate, evaluate_gate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateOperator {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
}

impl GateOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            GateOperator::Lt => "<",
            GateOperator::Lte => "<=",
            GateOperator::Gt => ">",
            GateOperator::Gte => ">=",
            GateOperator::Eq => "==",
            GateOperator::Neq => "!=",
        }
    }

    /// Only equality operators are defined for booleans.
    pub fn supports_bool(&self) -> bool {
        matches!(self, GateOperator::Eq | GateOperator::Neq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Bool(bool),
    Number(f64),
}

impl Threshold {
    pub fn type_name(&self) -> &'static str {
        match self {
            Threshold::Bool(_) => "bool",
            Threshold::Number(_) => "number",
        }
    }
}

impl std::fmt::Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Threshold::Bool(b) => write!(f, "{}", b),
            Threshold::Number(n) => write!(f, "{}", crate::metrics::format_number(*n)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Required,
    Recommended,
}

fn default_gate_phase() -> Phase {
    Phase::Validation
}

/// A named, thresholded pass/fail check over one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub id: String,
    pub name: String,
    /// Dot-notation path into `Metrics`
    pub metric_path: String,
    pub operator: GateOperator,
    pub threshold: Threshold,
    #[serde(default)]
    pub severity: Severity,
    /// Phase whose exit this gate guards; binding from then on
    #[serde(default = "default_gate_phase")]
    pub phase: Phase,
}

impl Gate {
    pub fn required(
        id: &str,
        name: &str,
        metric_path: &str,
        operator: GateOperator,
        threshold: Threshold,
        phase: Phase,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            metric_path: metric_path.to_string(),
            operator,
            threshold,
            severity: Severity::Required,
            phase,
        }
    }

    pub fn recommended(
        id: &str,
        name: &str,
        metric_path: &str,
        operator: GateOperator,
        threshold: Threshold,
        phase: Phase,
    ) -> Self {
        Self {
            severity: Severity::Recommended,
            ..Self::required(id, name, metric_path, operator, threshold, phase)
        }
    }

    pub fn is_required(&self) -> bool {
        self.severity == Severity::Required
    }

    /// Human-readable requirement, e.g. `>= 60`.
    pub fn requirement(&self) -> String {
        format!("{} {}", self.operator.symbol(), self.threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Passed,
    Failed,
    /// The producing tool was unavailable; never counts as passed
    Unknown,
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GateStatus::Passed => "passed",
            GateStatus::Failed => "failed",
            GateStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_id: String,
    pub gate_name: String,
    pub metric_path: String,
    pub requirement: String,
    pub required: bool,
    pub status: GateStatus,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<MetricValue>,
    pub message: String,
}

impl GateResult {
    /// One-line summary naming the gate, current and required values.
    pub fn describe(&self) -> String {
        let severity = if self.required { "" } else { " (recommended)" };
        format!("[{}] {}{}: {}", self.gate_id, self.gate_name, severity, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_deserializes_with_defaults() {
        let gate: Gate = toml::from_str(
            r#"
            id = "unsafe"
            name = "No unsafe blocks"
            metric_path = "extra.rust.unsafe_blocks"
            operator = "eq"
            threshold = 0
            "#,
        )
        .unwrap();
        assert_eq!(gate.severity, Severity::Required);
        assert_eq!(gate.phase, Phase::Validation);
        assert_eq!(gate.threshold, Threshold::Number(0.0));
    }

    #[test]
    fn test_threshold_untagged_bool() {
        let t: Threshold = serde_json::from_str("true").unwrap();
        assert_eq!(t, Threshold::Bool(true));
        let t: Threshold = serde_json::from_str("60.5").unwrap();
        assert_eq!(t, Threshold::Number(60.5));
    }

    #[test]
    fn test_requirement_formatting() {
        let gate = Gate::required(
            "coverage",
            "Test coverage",
            "coverage_percent",
            GateOperator::Gte,
            Threshold::Number(60.0),
            Phase::Testing,
        );
        assert_eq!(gate.requirement(), ">= 60");
        assert!(gate.is_required());
    }

    #[test]
    fn test_describe_marks_recommended() {
        let result = GateResult {
            gate_id: "docs".to_string(),
            gate_name: "Documentation".to_string(),
            metric_path: "docs_present".to_string(),
            requirement: "== true".to_string(),
            required: false,
            status: GateStatus::Failed,
            passed: false,
            current_value: Some(MetricValue::Bool(false)),
            message: "docs_present is false, required == true".to_string(),
        };
        let line = result.describe();
        assert!(line.starts_with("[docs]"));
        assert!(line.contains("(recommended)"));
    }
}
