//! Default task plans. Task ids double as dispatch keys for the orchestrator.

use super::Task;
use crate::phase::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    DetectLanguage,
    InstallFormatters,
    BootstrapTests,
    InstallLinters,
    CollectMetrics,
}

impl TaskAction {
    pub fn id(&self) -> &'static str {
        match self {
            TaskAction::DetectLanguage => "detect-language",
            TaskAction::InstallFormatters => "install-formatters",
            TaskAction::BootstrapTests => "bootstrap-tests",
            TaskAction::InstallLinters => "install-linters",
            TaskAction::CollectMetrics => "collect-metrics",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "detect-language" => Some(TaskAction::DetectLanguage),
            "install-formatters" => Some(TaskAction::InstallFormatters),
            "bootstrap-tests" => Some(TaskAction::BootstrapTests),
            "install-linters" => Some(TaskAction::InstallLinters),
            "collect-metrics" => Some(TaskAction::CollectMetrics),
            _ => None,
        }
    }

    fn task(&self, phase: Phase) -> Task {
        let (description, minutes) = match self {
            TaskAction::DetectLanguage => ("Detect the project language and test framework", 1),
            TaskAction::InstallFormatters => ("Install and configure code formatters", 5),
            TaskAction::BootstrapTests => ("Bootstrap a test suite for the core modules", 30),
            TaskAction::InstallLinters => ("Install and configure linters", 5),
            TaskAction::CollectMetrics => ("Collect a fresh metrics snapshot", 2),
        };
        Task::new(self.id(), description, phase, minutes)
    }
}

/// Ordered tasks executed by `run` for `phase`.
pub fn default_plan(phase: Phase) -> Vec<Task> {
    let actions: &[TaskAction] = match phase {
        Phase::Assessment => &[TaskAction::DetectLanguage, TaskAction::CollectMetrics],
        Phase::Structure => &[TaskAction::InstallFormatters, TaskAction::CollectMetrics],
        Phase::Testing => &[TaskAction::BootstrapTests, TaskAction::CollectMetrics],
        Phase::Quality => &[TaskAction::InstallLinters, TaskAction::CollectMetrics],
        Phase::Validation | Phase::Graduation => &[TaskAction::CollectMetrics],
    };
    actions.iter().map(|a| a.task(phase)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_phase_ends_with_metrics_collection() {
        for phase in Phase::all() {
            let plan = default_plan(*phase);
            assert_eq!(plan.last().unwrap().task_id, "collect-metrics");
            assert!(plan.iter().all(|t| t.phase == *phase && !t.completed));
        }
    }

    #[test]
    fn test_task_ids_are_unique_and_dispatchable() {
        for phase in Phase::all() {
            let plan = default_plan(*phase);
            let ids: HashSet<&str> = plan.iter().map(|t| t.task_id.as_str()).collect();
            assert_eq!(ids.len(), plan.len());
            for task in &plan {
                assert_eq!(TaskAction::from_id(&task.task_id).unwrap().id(), task.task_id);
            }
        }
    }

    #[test]
    fn test_testing_plan_bootstraps_first() {
        let plan = default_plan(Phase::Testing);
        assert_eq!(plan[0].task_id, "bootstrap-tests");
        assert_eq!(TaskAction::from_id("unknown"), None);
    }
}
