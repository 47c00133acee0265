//! Canonical gate set and per-phase relevance.

use serde::{Deserialize, Serialize};

use super::{Gate, GateOperator, Threshold};
use crate::phase::Phase;

fn default_coverage_min() -> f64 {
    60.0
}

fn default_complexity_max() -> f64 {
    10.0
}

/// Tunable thresholds for the canonical gates (`[thresholds]` in brownfield.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateThresholds {
    #[serde(default = "default_coverage_min")]
    pub coverage_min: f64,
    #[serde(default = "default_complexity_max")]
    pub complexity_max: f64,
    #[serde(default)]
    pub max_critical_vulnerabilities: u64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            coverage_min: default_coverage_min(),
            complexity_max: default_complexity_max(),
            max_critical_vulnerabilities: 0,
        }
    }
}

/// The seven built-in gates, in evaluation order.
pub fn canonical_gates(thresholds: &GateThresholds) -> Vec<Gate> {
    let security_op = if thresholds.max_critical_vulnerabilities == 0 {
        GateOperator::Eq
    } else {
        GateOperator::Lte
    };
    vec![
        Gate::required(
            "structure",
            "Conventional project structure",
            "structure_conforms",
            GateOperator::Eq,
            Threshold::Bool(true),
            Phase::Structure,
        ),
        Gate::required(
            "build",
            "Build passes",
            "build_passes",
            GateOperator::Eq,
            Threshold::Bool(true),
            Phase::Structure,
        ),
        Gate::required(
            "coverage",
            "Test coverage",
            "coverage_percent",
            GateOperator::Gte,
            Threshold::Number(thresholds.coverage_min),
            Phase::Testing,
        ),
        Gate::required(
            "complexity",
            "Maximum cyclomatic complexity",
            "max_complexity",
            GateOperator::Lte,
            Threshold::Number(thresholds.complexity_max),
            Phase::Quality,
        ),
        Gate::recommended(
            "docs",
            "Documentation present",
            "docs_present",
            GateOperator::Eq,
            Threshold::Bool(true),
            Phase::Quality,
        ),
        Gate::required(
            "security",
            "No critical vulnerabilities",
            "critical_vulnerabilities",
            security_op,
            Threshold::Number(thresholds.max_critical_vulnerabilities as f64),
            Phase::Validation,
        ),
        Gate::recommended(
            "git-hygiene",
            "Clean working tree",
            "git_clean",
            GateOperator::Eq,
            Threshold::Bool(true),
            Phase::Validation,
        ),
    ]
}

/// An ordered gate list with id lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct GateSet {
    gates: Vec<Gate>,
}

impl GateSet {
    pub fn new(gates: Vec<Gate>) -> Self {
        Self { gates }
    }

    pub fn canonical(thresholds: &GateThresholds) -> Self {
        Self::new(canonical_gates(thresholds))
    }

    /// Add custom gates. A custom gate with a built-in id replaces it in place.
    pub fn with_custom(mut self, custom: impl IntoIterator<Item = Gate>) -> Self {
        for gate in custom {
            match self.gates.iter_mut().find(|g| g.id == gate.id) {
                Some(existing) => *existing = gate,
                None => self.gates.push(gate),
            }
        }
        self
    }

    pub fn all(&self) -> &[Gate] {
        &self.gates
    }

    pub fn get(&self, id: &str) -> Option<&Gate> {
        self.gates.iter().find(|g| g.id == id)
    }

    /// Gates binding at `phase`: every gate guarding that phase or an earlier one.
    pub fn relevant_for(&self, phase: Phase) -> Vec<Gate> {
        self.gates
            .iter()
            .filter(|g| g.phase <= phase)
            .cloned()
            .collect()
    }
}
