//! The phase state machine.
//!
//! `Orchestrator` owns the collaborators (state store, checkpoint manager,
//! handler registry, metrics collector, gate set) but never the state itself:
//! every operation takes the `BrownfieldState` it acts on.
//!
//! | Module        | Operations                                               |
//! |---------------|----------------------------------------------------------|
//! | `mod`         | `assess`, `validate`, shared metrics/gate refresh        |
//! | `transitions` | `can_advance_to`, `advance_with_validation`, re-entry, graduation |
//! | `runner`      | `run_phase`, `resume`, `restart`                         |

pub mod runner;
pub mod transitions;

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::brownfield_config::BrownfieldConfig;
use crate::checkpoint::CheckpointManager;
use crate::errors::Result;
use crate::gates::{GateReport, GateSet};
use crate::language::HandlerRegistry;
use crate::metrics::{CommandCollector, MetricsCollector};
use crate::phase::Phase;
use crate::state::{BrownfieldState, ReEntryEvent, RegressionRule, StateStore, detect_regression, resolve_recovered};

pub use runner::RunOutcome;
pub use transitions::AdvanceCheck;

pub struct Orchestrator {
    project_root: PathBuf,
    store: StateStore,
    checkpoints: CheckpointManager,
    registry: HandlerRegistry,
    collector: Box<dyn MetricsCollector>,
    gates: GateSet,
    rules: Vec<RegressionRule>,
    core_modules: Vec<String>,
    forced_language: Option<String>,
}

/// Result of `assess`.
#[derive(Debug)]
pub struct Assessment {
    pub state: BrownfieldState,
    pub report: GateReport,
    /// True when this call created the state
    pub initialized: bool,
    /// Regressions failing in this snapshot
    pub regressions: Vec<ReEntryEvent>,
    /// Phase the project was sent back to, if any
    pub re_entered: Option<Phase>,
}

/// Outcome of collecting metrics into a state.
#[derive(Debug)]
pub(crate) struct Refresh {
    pub report: GateReport,
    pub regressions: Vec<ReEntryEvent>,
    pub re_entered: Option<Phase>,
}

impl Orchestrator {
    pub fn new(
        project_root: PathBuf,
        store: StateStore,
        checkpoints: CheckpointManager,
        registry: HandlerRegistry,
        collector: Box<dyn MetricsCollector>,
        gates: GateSet,
        rules: Vec<RegressionRule>,
    ) -> Self {
        Self {
            project_root,
            store,
            checkpoints,
            registry,
            collector,
            gates,
            rules,
            core_modules: Vec::new(),
            forced_language: None,
        }
    }

    /// Wire the orchestrator from the effective configuration.
    pub fn from_config(config: &BrownfieldConfig) -> Result<Self> {
        let runner = config.tool_runner();
        let registry = HandlerRegistry::with_profiles(&config.toml.languages, &runner)?;
        let collector = CommandCollector::new(config.metrics_command(), config.metrics_file(), runner);
        Ok(Self::new(
            config.project_dir.clone(),
            StateStore::new(config.state_file()),
            CheckpointManager::new(config.checkpoint_dir(), config.project_dir.clone()),
            registry,
            Box::new(collector),
            config.gate_set(),
            config.regression_rules(),
        )
        .with_core_modules(config.toml.project.core_modules.clone())
        .with_forced_language(config.toml.project.language.clone()))
    }

    pub fn with_core_modules(mut self, core_modules: Vec<String>) -> Self {
        self.core_modules = core_modules;
        self
    }

    pub fn with_forced_language(mut self, language: Option<String>) -> Self {
        self.forced_language = language;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn gates(&self) -> &GateSet {
        &self.gates
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn load_state(&self) -> Result<BrownfieldState> {
        self.store.load()
    }

    /// Load the state if one exists.
    pub fn load_state_optional(&self) -> Result<Option<BrownfieldState>> {
        if self.store.exists() {
            self.store.load().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Initialize the project or refresh its metrics.
    ///
    /// First run: choose the language, capture the baseline. Later runs:
    /// collect, detect regressions, apply re-entry. Both evaluate every gate
    /// into `last_gate_results` and persist.
    pub async fn assess(&self, existing: Option<BrownfieldState>, language: Option<&str>) -> Result<Assessment> {
        let language = language.map(str::to_string).or_else(|| self.forced_language.clone());
        if let Some(key) = &language {
            self.registry.resolve(key)?;
        }

        let (mut state, initialized, refresh) = match existing {
            None => {
                let language = match language {
                    Some(key) => Some(key),
                    None => self.detect_language().await?,
                };
                let baseline = self.collector.collect(&self.project_root).await?;
                let mut state = BrownfieldState::new(self.project_root.clone(), baseline, language);
                let report = self.sweep_gates(&mut state)?;
                info!(language = ?state.language, "baseline captured");
                let refresh = Refresh {
                    report,
                    regressions: Vec::new(),
                    re_entered: None,
                };
                (state, true, refresh)
            }
            Some(mut state) => {
                if language.is_some() {
                    state.language = language;
                }
                let refresh = self.refresh(&mut state).await?;
                (state, false, refresh)
            }
        };

        self.store.save(&mut state)?;
        Ok(Assessment {
            state,
            report: refresh.report,
            initialized,
            regressions: refresh.regressions,
            re_entered: refresh.re_entered,
        })
    }

    /// Evaluate every gate against the stored metrics. Never mutates.
    pub fn validate(&self, state: &BrownfieldState) -> Result<GateReport> {
        GateReport::evaluate(self.gates.all(), &state.current_metrics)
    }

    async fn detect_language(&self) -> Result<Option<String>> {
        match self.registry.detect(&self.project_root).await? {
            Some(found) => {
                info!(language = %found.language, confidence = ?found.confidence, "language detected");
                Ok(Some(found.language))
            }
            None => {
                warn!("no registered language matched; pass --language to choose one");
                Ok(None)
            }
        }
    }

    /// Collect metrics, detect regressions, re-enter, re-evaluate gates.
    pub(crate) async fn refresh(&self, state: &mut BrownfieldState) -> Result<Refresh> {
        state.current_metrics = self.collector.collect(&self.project_root).await?;
        let regressions = detect_regression(state, &self.rules, &self.gates)?;
        let re_entered = self.apply_re_entry(state, &regressions)?;
        let report = self.sweep_gates(state)?;
        Ok(Refresh {
            report,
            regressions,
            re_entered,
        })
    }

    fn sweep_gates(&self, state: &mut BrownfieldState) -> Result<GateReport> {
        let report = GateReport::evaluate(self.gates.all(), &state.current_metrics)?;
        for unknown in report.unknown() {
            warn!(gate = %unknown.gate_id, path = %unknown.metric_path, "gate status unknown; tool unavailable");
        }
        resolve_recovered(state, &report);
        state.record_gate_results(report.results.clone());
        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gates::GateThresholds;
    use crate::language::Confidence;
    use crate::language::tests::FakeHandler;
    use crate::metrics::{Metrics, StaticCollector};
    use crate::state::{RegressionThresholds, default_rules};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Collector handle shared between a test and its orchestrator.
    pub struct SharedCollector(pub Arc<StaticCollector>);

    #[async_trait::async_trait]
    impl MetricsCollector for SharedCollector {
        async fn collect(&self, root: &Path) -> Result<Metrics> {
            self.0.collect(root).await
        }
    }

    pub struct Fixture {
        pub dir: TempDir,
        pub orchestrator: Orchestrator,
        pub metrics: Arc<StaticCollector>,
    }

    pub fn fixture(initial: Metrics) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let metrics = Arc::new(StaticCollector::new(initial));
        let mut registry = HandlerRegistry::new();
        registry
            .register("fake", Box::new(FakeHandler::new("fake", Some(Confidence::High))))
            .unwrap();
        let orchestrator = Orchestrator::new(
            root.clone(),
            StateStore::new(root.join(".brownfield/state.json")),
            CheckpointManager::new(root.join(".brownfield/checkpoints"), root.clone()),
            registry,
            Box::new(SharedCollector(metrics.clone())),
            GateSet::canonical(&GateThresholds::default()),
            default_rules(&RegressionThresholds::default()),
        );
        Fixture {
            dir,
            orchestrator,
            metrics,
        }
    }

    pub fn healthy() -> Metrics {
        Metrics {
            coverage_percent: 68.0,
            max_complexity: 8.0,
            structure_conforms: true,
            build_passes: true,
            docs_present: true,
            git_clean: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_assess_initializes_baseline() {
        let f = fixture(Metrics::default());
        let assessment = f.orchestrator.assess(None, None).await.unwrap();
        assert!(assessment.initialized);
        assert_eq!(assessment.state.current_phase, Phase::Assessment);
        assert_eq!(assessment.state.language.as_deref(), Some("fake"));
        assert_eq!(assessment.state.last_gate_results.len(), 7);
        assert!(f.orchestrator.store().exists());

        let coverage = assessment.report.result("coverage").unwrap();
        assert!(!coverage.passed);
    }

    #[tokio::test]
    async fn test_reassess_keeps_baseline() {
        let f = fixture(Metrics::default());
        let first = f.orchestrator.assess(None, None).await.unwrap();
        f.metrics.set(healthy());
        let second = f
            .orchestrator
            .assess(Some(first.state.clone()), None)
            .await
            .unwrap();
        assert!(!second.initialized);
        assert_eq!(second.state.baseline_metrics, first.state.baseline_metrics);
        assert_eq!(second.state.current_metrics, healthy());
        assert!(second.report.all_passed);
    }

    #[tokio::test]
    async fn test_assess_rejects_unknown_language() {
        let f = fixture(Metrics::default());
        let err = f.orchestrator.assess(None, Some("cobol")).await.unwrap_err();
        assert!(matches!(err, crate::errors::BrownfieldError::UnsupportedLanguage { .. }));
        assert!(!f.orchestrator.store().exists());
    }

    #[tokio::test]
    async fn test_validate_does_not_mutate() {
        let f = fixture(healthy());
        let state = f.orchestrator.assess(None, None).await.unwrap().state;
        let before = f.orchestrator.load_state().unwrap();
        let report = f.orchestrator.validate(&state).unwrap();
        assert!(report.all_passed);
        assert_eq!(f.orchestrator.load_state().unwrap(), before);
    }
}
