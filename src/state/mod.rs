//! Persistent project state.
//!
//! `BrownfieldState` is the single record describing a remediation project.
//! It is threaded explicitly through every orchestrator call and persisted by
//! `StateStore`. `regression` compares fresh metrics against it.

pub mod regression;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::gates::{GateResult, MetricValue, Threshold};
use crate::metrics::Metrics;
use crate::phase::{Phase, PhaseTimestamps};

pub use regression::{RegressionKind, RegressionRule, RegressionThresholds, default_rules, detect_regression, resolve_recovered};
pub use store::{SCHEMA_VERSION, StateStore, migrate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrownfieldState {
    pub schema_version: String,
    pub project_root: PathBuf,
    pub current_phase: Phase,
    /// Set only by an explicit, confirmed graduation
    #[serde(default)]
    pub graduated: bool,
    /// Language key chosen at first assessment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Captured once at first assessment; never rewritten
    pub baseline_metrics: Metrics,
    pub current_metrics: Metrics,
    #[serde(default)]
    pub phase_timestamps: BTreeMap<Phase, PhaseTimestamps>,
    /// Append-only regression log
    #[serde(default)]
    pub re_entry_events: Vec<ReEntryEvent>,
    #[serde(default)]
    pub last_gate_results: Vec<GateResult>,
    /// Gates that have passed in any sweep; arms their regression rules
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub passed_gates: BTreeSet<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl BrownfieldState {
    /// Fresh state at ASSESSMENT with `baseline` as both baseline and current.
    pub fn new(project_root: PathBuf, baseline: Metrics, language: Option<String>) -> Self {
        let now = Utc::now();
        let mut phase_timestamps = BTreeMap::new();
        phase_timestamps.insert(
            Phase::Assessment,
            PhaseTimestamps {
                entered_at: now,
                completed_at: None,
            },
        );
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            project_root,
            current_phase: Phase::Assessment,
            graduated: false,
            language,
            current_metrics: baseline.clone(),
            baseline_metrics: baseline,
            phase_timestamps,
            re_entry_events: Vec::new(),
            last_gate_results: Vec::new(),
            passed_gates: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn current_phase(&self) -> Phase {
        self.current_phase
    }

    pub fn last_gate_results(&self) -> &[GateResult] {
        &self.last_gate_results
    }

    /// Store a gate sweep, remembering every gate that passed in it.
    pub fn record_gate_results(&mut self, results: Vec<GateResult>) {
        self.passed_gates
            .extend(results.iter().filter(|r| r.passed).map(|r| r.gate_id.clone()));
        self.last_gate_results = results;
    }

    /// Regression events not yet resolved by a passing gate.
    pub fn pending_regressions(&self) -> Vec<&ReEntryEvent> {
        self.re_entry_events
            .iter()
            .filter(|e| !e.is_resolved())
            .collect()
    }

    /// Stamp `entered_at` for `phase`, clearing any previous completion.
    pub fn enter_phase(&mut self, phase: Phase) {
        self.phase_timestamps
            .insert(phase, PhaseTimestamps::entered_now());
    }

    pub fn complete_phase(&mut self, phase: Phase) {
        let stamps = self
            .phase_timestamps
            .entry(phase)
            .or_insert_with(PhaseTimestamps::entered_now);
        stamps.completed_at = Some(Utc::now());
    }
}

/// Record of a detected regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReEntryEvent {
    pub kind: RegressionKind,
    /// Gate whose re-pass resolves the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_id: Option<String>,
    pub metric_path: String,
    pub detected_at: DateTime<Utc>,
    #[serde(default)]
    pub baseline_value: Option<MetricValue>,
    #[serde(default)]
    pub current_value: Option<MetricValue>,
    pub threshold_crossed: Threshold,
    pub re_entry_phase: Phase,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ReEntryEvent {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}
