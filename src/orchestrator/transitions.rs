//! Forward advancement, regression re-entry and graduation.

use serde::Serialize;
use tracing::{info, warn};

use super::Orchestrator;
use crate::errors::{BrownfieldError, Result};
use crate::gates::{GateReport, GateResult, evaluate_gate};
use crate::phase::Phase;
use crate::state::{BrownfieldState, ReEntryEvent};

/// Answer to "may the project move to this phase?"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvanceCheck {
    pub allowed: bool,
    pub reason: String,
    /// Gates that block the transition
    pub failures: Vec<GateResult>,
}

impl AdvanceCheck {
    fn granted(reason: String) -> Self {
        Self {
            allowed: true,
            reason,
            failures: Vec::new(),
        }
    }

    fn denied(reason: String, failures: Vec<GateResult>) -> Self {
        Self {
            allowed: false,
            reason,
            failures,
        }
    }
}

impl Orchestrator {
    /// Whether `target` is the immediate successor and every required gate
    /// binding at the current phase passes. A "no" is a value, not an error.
    pub fn can_advance_to(&self, state: &BrownfieldState, target: Phase) -> Result<AdvanceCheck> {
        let current = state.current_phase;
        let Some(next) = current.next() else {
            return Ok(AdvanceCheck::denied(
                format!("{current} is the terminal phase"),
                Vec::new(),
            ));
        };
        if target != next {
            return Ok(AdvanceCheck::denied(
                format!("{target} is not the next phase after {current} (expected {next})"),
                Vec::new(),
            ));
        }

        let report = GateReport::evaluate(&self.gates.relevant_for(current), &state.current_metrics)?;
        let failures = report.required_failures();
        if !failures.is_empty() {
            return Ok(AdvanceCheck::denied(
                format!("{} required gate(s) not passing for {current}", failures.len()),
                failures,
            ));
        }

        let mut open = Vec::new();
        for event in state.pending_regressions() {
            let Some(gate) = event.gate_id.as_deref().and_then(|id| self.gates.get(id)) else {
                continue;
            };
            let result = evaluate_gate(gate, &state.current_metrics)?;
            if !result.passed && !open.iter().any(|r: &GateResult| r.gate_id == result.gate_id) {
                open.push(result);
            }
        }
        if !open.is_empty() {
            return Ok(AdvanceCheck::denied(
                format!("{} unresolved regression(s) must re-pass first", open.len()),
                open,
            ));
        }

        Ok(AdvanceCheck::granted(format!(
            "all required gates for {current} pass"
        )))
    }

    /// Move to `target` and persist, or fail with `PhasePrecondition`.
    ///
    /// The state is only replaced after the write succeeds.
    pub fn advance_with_validation(&self, state: &mut BrownfieldState, target: Phase) -> Result<()> {
        let check = self.can_advance_to(state, target)?;
        let from = state.current_phase;
        if !check.allowed {
            return Err(BrownfieldError::PhasePrecondition {
                from,
                target,
                reason: check.reason,
                failures: check.failures,
            });
        }

        let mut next = state.clone();
        next.complete_phase(from);
        next.current_phase = target;
        next.enter_phase(target);
        self.store.save(&mut next)?;
        *state = next;
        info!(%from, to = %target, "phase advanced");
        Ok(())
    }

    /// Move the project back to the earliest phase named by unresolved
    /// `events`. Never moves forward. Returns the new phase when it changed.
    ///
    /// The re-entered phase's checkpoint is discarded so the next run starts
    /// its plan over.
    pub fn apply_re_entry(&self, state: &mut BrownfieldState, events: &[ReEntryEvent]) -> Result<Option<Phase>> {
        let Some(target) = events
            .iter()
            .filter(|e| !e.is_resolved())
            .map(|e| e.re_entry_phase)
            .min()
        else {
            return Ok(None);
        };

        if state.graduated {
            warn!("graduation revoked by regression");
            state.graduated = false;
        }
        if target >= state.current_phase {
            return Ok(None);
        }

        self.checkpoints.restart(target)?;
        let from = state.current_phase;
        state.current_phase = target;
        state.enter_phase(target);
        warn!(%from, to = %target, "re-entering earlier phase after regression");
        Ok(Some(target))
    }

    /// Set `graduated` once every gate passes and the operator confirmed.
    pub fn graduate(&self, state: &mut BrownfieldState, confirmed: bool) -> Result<()> {
        let current = state.current_phase;
        if current != Phase::Graduation {
            return Err(BrownfieldError::PhasePrecondition {
                from: current,
                target: Phase::Graduation,
                reason: "graduation is only possible from the graduation phase".to_string(),
                failures: Vec::new(),
            });
        }

        let report = self.validate(state)?;
        if !report.all_passed {
            return Err(BrownfieldError::GateValidation {
                phase: Phase::Graduation,
                failures: report.failures(),
            });
        }
        if !confirmed {
            return Err(BrownfieldError::ConfirmationRequired {
                action: "Graduation".to_string(),
            });
        }

        let mut next = state.clone();
        next.graduated = true;
        next.complete_phase(Phase::Graduation);
        self.store.save(&mut next)?;
        *state = next;
        info!("project graduated");
        Ok(())
    }
}
