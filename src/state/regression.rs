//! Regression detection.
//!
//! A rule watches one metric with a looser threshold than its gate (a floor
//! for coverage, a ceiling for complexity). Once the project has relied on
//! the gate, a rule failure records a `ReEntryEvent` that sends the project
//! back to the phase able to fix it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{BrownfieldState, ReEntryEvent};
use crate::errors::Result;
use crate::gates::{Gate, GateOperator, GateReport, GateSet, GateStatus, Threshold, evaluate_gate};
use crate::metrics::Lookup;
use crate::phase::Phase;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RegressionKind {
    CoverageDrop,
    ComplexityIncrease,
    StructureViolation,
    BuildBreak,
    SecurityRegression,
    Other(String),
}

impl RegressionKind {
    pub fn as_str(&self) -> &str {
        match self {
            RegressionKind::CoverageDrop => "coverage_drop",
            RegressionKind::ComplexityIncrease => "complexity_increase",
            RegressionKind::StructureViolation => "structure_violation",
            RegressionKind::BuildBreak => "build_break",
            RegressionKind::SecurityRegression => "security_regression",
            RegressionKind::Other(s) => s,
        }
    }

    /// Phase able to remediate this kind of regression.
    pub fn re_entry_phase(&self) -> Phase {
        match self {
            RegressionKind::CoverageDrop => Phase::Testing,
            RegressionKind::ComplexityIncrease => Phase::Quality,
            RegressionKind::StructureViolation | RegressionKind::BuildBreak => Phase::Structure,
            RegressionKind::SecurityRegression => Phase::Quality,
            RegressionKind::Other(name) => family_phase(name),
        }
    }
}

/// Earliest phase that remediates a metric family, matched by name.
pub fn family_phase(name: &str) -> Phase {
    let name = name.to_lowercase();
    if name.contains("coverage") || name.contains("test") {
        Phase::Testing
    } else if name.contains("complexity") || name.contains("function") {
        Phase::Quality
    } else if name.contains("structure") || name.contains("build") {
        Phase::Structure
    } else if name.contains("vulnerab") || name.contains("security") {
        Phase::Quality
    } else {
        Phase::Assessment
    }
}

impl From<String> for RegressionKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "coverage_drop" => RegressionKind::CoverageDrop,
            "complexity_increase" => RegressionKind::ComplexityIncrease,
            "structure_violation" => RegressionKind::StructureViolation,
            "build_break" => RegressionKind::BuildBreak,
            "security_regression" => RegressionKind::SecurityRegression,
            _ => RegressionKind::Other(s),
        }
    }
}

impl From<RegressionKind> for String {
    fn from(kind: RegressionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for RegressionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_coverage_floor() -> f64 {
    50.0
}

fn default_complexity_ceiling() -> f64 {
    15.0
}

/// `[regression]` in brownfield.toml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionThresholds {
    #[serde(default = "default_coverage_floor")]
    pub coverage_floor: f64,
    #[serde(default = "default_complexity_ceiling")]
    pub complexity_ceiling: f64,
}

impl Default for RegressionThresholds {
    fn default() -> Self {
        Self {
            coverage_floor: default_coverage_floor(),
            complexity_ceiling: default_complexity_ceiling(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionRule {
    pub kind: RegressionKind,
    /// Gate whose pass arms the rule and resolves its events
    pub gate_id: String,
    pub check: Gate,
}

impl RegressionRule {
    fn new(kind: RegressionKind, gate_id: &str, path: &str, op: GateOperator, threshold: Threshold) -> Self {
        let phase = kind.re_entry_phase();
        let check = Gate::required(kind.as_str(), kind.as_str(), path, op, threshold, phase);
        Self {
            kind,
            gate_id: gate_id.to_string(),
            check,
        }
    }
}

pub fn default_rules(thresholds: &RegressionThresholds) -> Vec<RegressionRule> {
    vec![
        RegressionRule::new(
            RegressionKind::CoverageDrop,
            "coverage",
            "coverage_percent",
            GateOperator::Gte,
            Threshold::Number(thresholds.coverage_floor),
        ),
        RegressionRule::new(
            RegressionKind::ComplexityIncrease,
            "complexity",
            "max_complexity",
            GateOperator::Lte,
            Threshold::Number(thresholds.complexity_ceiling),
        ),
        RegressionRule::new(
            RegressionKind::StructureViolation,
            "structure",
            "structure_conforms",
            GateOperator::Eq,
            Threshold::Bool(true),
        ),
        RegressionRule::new(
            RegressionKind::BuildBreak,
            "build",
            "build_passes",
            GateOperator::Eq,
            Threshold::Bool(true),
        ),
        RegressionRule::new(
            RegressionKind::SecurityRegression,
            "security",
            "critical_vulnerabilities",
            GateOperator::Eq,
            Threshold::Number(0.0),
        ),
    ]
}

fn is_armed(state: &BrownfieldState, rule: &RegressionRule, gates: &GateSet) -> bool {
    let gate_passed = state.passed_gates.contains(&rule.gate_id);
    let guarded_phase = gates
        .get(&rule.gate_id)
        .map(|g| g.phase)
        .unwrap_or_else(|| rule.kind.re_entry_phase());
    let past_gate = state.current_phase > guarded_phase;
    let open_event = state
        .re_entry_events
        .iter()
        .any(|e| e.kind == rule.kind && !e.is_resolved());
    gate_passed || past_gate || open_event
}

/// Check `current_metrics` against every armed rule.
///
/// New regressions are appended to `state.re_entry_events`; a regression that
/// is already open has its `current_value` updated in place. Returns every
/// event that is failing in this snapshot, so repeated calls with unchanged
/// metrics return the same set and never duplicate events.
pub fn detect_regression(
    state: &mut BrownfieldState,
    rules: &[RegressionRule],
    gates: &GateSet,
) -> Result<Vec<ReEntryEvent>> {
    let mut triggered = Vec::new();

    for rule in rules {
        if !is_armed(state, rule, gates) {
            continue;
        }
        let result = evaluate_gate(&rule.check, &state.current_metrics)?;
        if result.status != GateStatus::Failed {
            continue;
        }

        let re_entry_phase = rule.kind.re_entry_phase();
        let open = state
            .re_entry_events
            .iter_mut()
            .find(|e| e.kind == rule.kind && e.re_entry_phase == re_entry_phase && !e.is_resolved());

        let event = match open {
            Some(existing) => {
                existing.current_value = result.current_value;
                existing.clone()
            }
            None => {
                let baseline_value = match state.baseline_metrics.lookup(&rule.check.metric_path) {
                    Lookup::Value(v) => Some(v),
                    _ => None,
                };
                let event = ReEntryEvent {
                    kind: rule.kind.clone(),
                    gate_id: Some(rule.gate_id.clone()),
                    metric_path: rule.check.metric_path.clone(),
                    detected_at: Utc::now(),
                    baseline_value,
                    current_value: result.current_value,
                    threshold_crossed: rule.check.threshold,
                    re_entry_phase,
                    resolved_at: None,
                };
                warn!(
                    kind = %event.kind,
                    phase = %re_entry_phase,
                    message = %result.message,
                    "regression detected"
                );
                state.re_entry_events.push(event.clone());
                event
            }
        };
        triggered.push(event);
    }

    Ok(triggered)
}

/// Resolve open events whose gate passes in `report`. Returns how many were resolved.
pub fn resolve_recovered(state: &mut BrownfieldState, report: &GateReport) -> usize {
    let now = Utc::now();
    let mut resolved = 0;
    for event in state.re_entry_events.iter_mut().filter(|e| !e.is_resolved()) {
        let recovered = event
            .gate_id
            .as_deref()
            .and_then(|id| report.result(id))
            .is_some_and(|r| r.passed);
        if recovered {
            event.resolved_at = Some(now);
            resolved += 1;
            info!(kind = %event.kind, "regression resolved");
        }
    }
    resolved
}
