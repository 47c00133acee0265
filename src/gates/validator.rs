//! Pure evaluation of gates against a metrics snapshot.
//!
//! A path that does not resolve, or a threshold of the wrong type, is a
//! definition error and is returned immediately. A metric whose tool did not
//! run produces `GateStatus::Unknown`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Gate, GateOperator, GateResult, GateStatus, MetricValue, Threshold};
use crate::errors::{BrownfieldError, Result};
use crate::metrics::{Lookup, Metrics};

/// Evaluate a single gate.
pub fn evaluate_gate(gate: &Gate, metrics: &Metrics) -> Result<GateResult> {
    let value = match metrics.lookup(&gate.metric_path) {
        Lookup::Value(v) => v,
        Lookup::Missing => {
            return Err(BrownfieldError::MetricNotFound {
                gate: gate.id.clone(),
                path: gate.metric_path.clone(),
            });
        }
        Lookup::Unsupported(found) => {
            return Err(mismatch(gate, gate.threshold.type_name(), found));
        }
    };

    let requirement = gate.requirement();
    let base = GateResult {
        gate_id: gate.id.clone(),
        gate_name: gate.name.clone(),
        metric_path: gate.metric_path.clone(),
        requirement: requirement.clone(),
        required: gate.is_required(),
        status: GateStatus::Unknown,
        passed: false,
        current_value: None,
        message: String::new(),
    };

    if metrics.is_unavailable(&gate.metric_path) {
        return Ok(GateResult {
            message: format!(
                "{} is unknown (tool unavailable), required {}",
                gate.metric_path, requirement
            ),
            ..base
        });
    }

    let passed = compare(gate, value)?;
    let message = if passed {
        format!("{} is {} ({})", gate.metric_path, value, requirement)
    } else {
        format!("{} is {}, required {}", gate.metric_path, value, requirement)
    };
    debug!(gate = %gate.id, %value, passed, "gate evaluated");

    Ok(GateResult {
        status: if passed {
            GateStatus::Passed
        } else {
            GateStatus::Failed
        },
        passed,
        current_value: Some(value),
        message,
        ..base
    })
}

fn compare(gate: &Gate, value: MetricValue) -> Result<bool> {
    match (value, gate.threshold) {
        (MetricValue::Bool(actual), Threshold::Bool(expected)) => match gate.operator {
            GateOperator::Eq => Ok(actual == expected),
            GateOperator::Neq => Ok(actual != expected),
            _ => Err(mismatch(gate, "number", "bool")),
        },
        (MetricValue::Number(actual), Threshold::Number(expected)) => Ok(match gate.operator {
            GateOperator::Lt => actual < expected,
            GateOperator::Lte => actual <= expected,
            GateOperator::Gt => actual > expected,
            GateOperator::Gte => actual >= expected,
            GateOperator::Eq => actual == expected,
            GateOperator::Neq => actual != expected,
        }),
        (value, threshold) => Err(mismatch(gate, threshold.type_name(), value.type_name())),
    }
}

fn mismatch(gate: &Gate, expected: &'static str, found: &'static str) -> BrownfieldError {
    BrownfieldError::MetricTypeMismatch {
        gate: gate.id.clone(),
        path: gate.metric_path.clone(),
        expected,
        found,
    }
}

/// Evaluate gates in order. The first definition error aborts evaluation.
pub fn evaluate(gates: &[Gate], metrics: &Metrics) -> Result<Vec<GateResult>> {
    gates.iter().map(|gate| evaluate_gate(gate, metrics)).collect()
}

/// Aggregate view over a list of gate results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    pub results: Vec<GateResult>,
    pub all_required_passed: bool,
    pub all_passed: bool,
}

impl GateReport {
    pub fn new(results: Vec<GateResult>) -> Self {
        let all_required_passed = results.iter().filter(|r| r.required).all(|r| r.passed);
        let all_passed = results.iter().all(|r| r.passed);
        Self {
            results,
            all_required_passed,
            all_passed,
        }
    }

    pub fn evaluate(gates: &[Gate], metrics: &Metrics) -> Result<Self> {
        Ok(Self::new(evaluate(gates, metrics)?))
    }

    /// Required gates that did not pass, unknown ones included.
    pub fn required_failures(&self) -> Vec<GateResult> {
        self.results
            .iter()
            .filter(|r| r.required && !r.passed)
            .cloned()
            .collect()
    }

    /// Every gate that did not pass.
    pub fn failures(&self) -> Vec<GateResult> {
        self.results.iter().filter(|r| !r.passed).cloned().collect()
    }

    pub fn unknown(&self) -> impl Iterator<Item = &GateResult> {
        self.results
            .iter()
            .filter(|r| r.status == GateStatus::Unknown)
    }

    pub fn result(&self, gate_id: &str) -> Option<&GateResult> {
        self.results.iter().find(|r| r.gate_id == gate_id)
    }
}
