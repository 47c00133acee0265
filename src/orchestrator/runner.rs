//! Execution of a phase's checkpoint tasks.
//!
//! Tasks run strictly in order. The checkpoint is flushed after every task,
//! and an operator interrupt (the `shutdown` future) is raced against the
//! running task so the checkpoint is always left `interrupted` rather than
//! half-written.

use std::future::Future;
use tracing::{error, info, warn};

use super::Orchestrator;
use crate::checkpoint::{Checkpoint, Task, TaskAction, default_plan};
use crate::errors::{BrownfieldError, Result};
use crate::gates::{GateReport, Threshold};
use crate::language::LanguageHandler;
use crate::phase::Phase;
use crate::state::{BrownfieldState, ReEntryEvent};

/// Coverage target handed to test bootstrapping when no coverage gate exists.
const DEFAULT_COVERAGE_TARGET: f64 = 60.0;

/// Result of running (or resuming) a phase to completion.
#[derive(Debug)]
pub struct RunOutcome {
    pub phase: Phase,
    pub checkpoint: Checkpoint,
    /// Task ids executed by this invocation, in order
    pub tasks_run: Vec<String>,
    /// Gate report from the last metrics collection, if one ran
    pub report: Option<GateReport>,
    pub regressions: Vec<ReEntryEvent>,
    pub re_entered: Option<Phase>,
}

impl Orchestrator {
    /// Run the current phase's tasks, continuing a resumable checkpoint or
    /// starting the default plan.
    pub async fn run_phase<F>(&self, state: &mut BrownfieldState, shutdown: F) -> Result<RunOutcome>
    where
        F: Future<Output = ()>,
    {
        let phase = state.current_phase;
        let checkpoint = if self.checkpoints.path_for(phase).exists() {
            let (checkpoint, next) = self.checkpoints.resume(phase)?;
            info!(%phase, task = %next.task_id, "continuing existing checkpoint");
            checkpoint
        } else {
            self.checkpoints.begin(phase, default_plan(phase))?
        };
        self.execute(state, checkpoint, shutdown).await
    }

    /// Continue the current phase from its first incomplete task.
    pub async fn resume<F>(&self, state: &mut BrownfieldState, shutdown: F) -> Result<RunOutcome>
    where
        F: Future<Output = ()>,
    {
        let phase = state.current_phase;
        let (checkpoint, next) = self.checkpoints.resume(phase)?;
        let (done, total) = checkpoint.progress();
        info!(%phase, task = %next.task_id, done, total, "resuming checkpoint");
        self.execute(state, checkpoint, shutdown).await
    }

    /// Discard the checkpoint of `phase`. Returns whether one existed.
    pub fn restart(&self, phase: Phase) -> Result<bool> {
        self.checkpoints.restart(phase)
    }

    async fn execute<F>(
        &self,
        state: &mut BrownfieldState,
        mut checkpoint: Checkpoint,
        shutdown: F,
    ) -> Result<RunOutcome>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let phase = checkpoint.phase;
        let mut outcome = RunOutcome {
            phase,
            checkpoint: checkpoint.clone(),
            tasks_run: Vec::new(),
            report: None,
            regressions: Vec::new(),
            re_entered: None,
        };

        while let Some(task) = checkpoint.next_task().cloned() {
            self.checkpoints.start_task(&mut checkpoint, &task.task_id)?;
            info!(%phase, task = %task.task_id, "{}", task.description);

            let result = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                result = self.execute_task(state, &task) => Some(result),
            };

            match result {
                None => {
                    self.checkpoints.mark_interrupted(&mut checkpoint)?;
                    warn!(%phase, task = %task.task_id, "interrupted; checkpoint saved");
                    return Err(BrownfieldError::Interrupted { phase });
                }
                Some(Ok(refresh)) => {
                    self.checkpoints.complete_task(&mut checkpoint, &task.task_id)?;
                    self.store.save(state)?;
                    outcome.tasks_run.push(task.task_id.clone());
                    if let Some(refresh) = refresh {
                        outcome.report = Some(refresh.report);
                        outcome.regressions = refresh.regressions;
                        outcome.re_entered = refresh.re_entered.or(outcome.re_entered);
                    }
                }
                Some(Err(e @ (BrownfieldError::ToolTimeout { .. } | BrownfieldError::ToolNotFound { .. }))) => {
                    // Environment problem: the task can be retried as is.
                    warn!(%phase, task = %task.task_id, error = %e, "task did not finish; checkpoint left resumable");
                    return Err(e);
                }
                Some(Err(e)) => {
                    self.checkpoints.mark_failed(&mut checkpoint, &task.task_id)?;
                    error!(%phase, task = %task.task_id, error = %e, "task failed");
                    return Err(e);
                }
            }
        }

        info!(%phase, "all tasks complete");
        outcome.checkpoint = checkpoint;
        Ok(outcome)
    }

    async fn execute_task(&self, state: &mut BrownfieldState, task: &Task) -> Result<Option<super::Refresh>> {
        let action = TaskAction::from_id(&task.task_id)
            .ok_or_else(|| BrownfieldError::InvalidConfig(format!("unknown task '{}'", task.task_id)))?;
        let root = self.project_root.as_path();

        match action {
            TaskAction::DetectLanguage => {
                if state.language.is_none() {
                    state.language = self.detect_language().await?;
                }
                if state.language.is_none() {
                    return Err(BrownfieldError::UnsupportedLanguage {
                        key: "undetected".to_string(),
                        known: self.registry.keys(),
                    });
                }
            }
            TaskAction::InstallFormatters => {
                let result = self.handler_for(state)?.install_formatters(root).await?;
                info!(installed = ?result.installed, "formatters configured");
            }
            TaskAction::InstallLinters => {
                let result = self.handler_for(state)?.install_linters(root).await?;
                info!(installed = ?result.installed, "linters configured");
            }
            TaskAction::BootstrapTests => {
                let target = self.coverage_target();
                let result = self
                    .handler_for(state)?
                    .bootstrap_tests(root, &self.core_modules, target)
                    .await?;
                info!(
                    framework = %result.framework,
                    tests_generated = result.tests_generated,
                    coverage = ?result.coverage,
                    "test suite bootstrapped"
                );
            }
            TaskAction::CollectMetrics => return self.refresh(state).await.map(Some),
        }
        Ok(None)
    }

    fn handler_for(&self, state: &BrownfieldState) -> Result<&dyn LanguageHandler> {
        match &state.language {
            Some(key) => self.registry.resolve(key),
            None => Err(BrownfieldError::UnsupportedLanguage {
                key: "unset".to_string(),
                known: self.registry.keys(),
            }),
        }
    }

    fn coverage_target(&self) -> f64 {
        match self.gates.get("coverage").map(|g| g.threshold) {
            Some(Threshold::Number(n)) => n,
            _ => DEFAULT_COVERAGE_TARGET,
        }
    }
}
