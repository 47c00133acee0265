//! Metrics collection.
//!
//! The analysis tools themselves are external. `CommandCollector` runs one
//! configured command that prints a `Metrics` JSON object (or reads a snapshot
//! file dropped by an external pipeline) and overlays repository hygiene from
//! git. Missing tools degrade to `unavailable` paths instead of failing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

use super::{GIT_METRIC_PATH, Metrics, TOOL_METRIC_PATHS};
use crate::errors::{BrownfieldError, Result};
use crate::tools::{ToolCommand, ToolRunner};
use crate::tracker::GitTracker;
use crate::util::extract_json_object;

/// Produces a `Metrics` snapshot for a project root.
#[async_trait]
pub trait MetricsCollector: Send + Sync {
    async fn collect(&self, root: &Path) -> Result<Metrics>;
}

pub struct CommandCollector {
    command: Option<String>,
    snapshot_file: PathBuf,
    runner: ToolRunner,
    probe_git: bool,
}

impl CommandCollector {
    pub fn new(command: Option<String>, snapshot_file: PathBuf, runner: ToolRunner) -> Self {
        Self {
            command,
            snapshot_file,
            runner,
            probe_git: true,
        }
    }

    /// Disable the git overlay; `git_clean` is then taken from the tool output.
    pub fn without_git(mut self) -> Self {
        self.probe_git = false;
        self
    }

    async fn raw_snapshot(&self, root: &Path) -> Result<Option<serde_json::Value>> {
        let text = match &self.command {
            Some(command) => {
                let tool = ToolCommand::new("metrics", command.as_str());
                match self.runner.run(&tool, root).await {
                    Ok(output) => output.stdout,
                    Err(BrownfieldError::ToolNotFound { tool }) => {
                        warn!(%tool, "metrics tool not found; tool-backed gates will be unknown");
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                }
            }
            None => {
                if !self.snapshot_file.exists() {
                    warn!(
                        path = %self.snapshot_file.display(),
                        "no metrics command configured and no snapshot file; tool-backed gates will be unknown"
                    );
                    return Ok(None);
                }
                std::fs::read_to_string(&self.snapshot_file).map_err(|source| {
                    BrownfieldError::Io {
                        path: self.snapshot_file.clone(),
                        source,
                    }
                })?
            }
        };

        let json = extract_json_object(&text).ok_or_else(|| invalid_output("no JSON object in output"))?;
        let value: serde_json::Value =
            serde_json::from_str(&json).map_err(|e| invalid_output(&e.to_string()))?;
        Ok(Some(value))
    }
}

fn invalid_output(detail: &str) -> BrownfieldError {
    BrownfieldError::ToolFailed {
        tool: "metrics".to_string(),
        exit_code: 0,
        stderr: format!("invalid metrics output: {detail}"),
    }
}

/// Build a snapshot from raw tool JSON, marking absent tool fields unavailable.
pub fn metrics_from_json(value: serde_json::Value) -> Result<Metrics> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid_output("expected a JSON object"))?;
    let absent: Vec<&str> = TOOL_METRIC_PATHS
        .iter()
        .chain(std::iter::once(&GIT_METRIC_PATH))
        .copied()
        .filter(|path| !object.contains_key(*path))
        .collect();

    let mut metrics: Metrics =
        serde_json::from_value(value).map_err(|e| invalid_output(&e.to_string()))?;
    metrics.validate().map_err(|e| invalid_output(&e))?;
    metrics
        .unavailable
        .extend(absent.into_iter().map(str::to_string));
    Ok(metrics)
}

fn all_unavailable() -> Metrics {
    let mut metrics = Metrics::default();
    metrics.unavailable.extend(
        TOOL_METRIC_PATHS
            .iter()
            .chain(std::iter::once(&GIT_METRIC_PATH))
            .map(|p| p.to_string()),
    );
    metrics
}

#[async_trait]
impl MetricsCollector for CommandCollector {
    async fn collect(&self, root: &Path) -> Result<Metrics> {
        let mut metrics = match self.raw_snapshot(root).await? {
            Some(value) => metrics_from_json(value)?,
            None => all_unavailable(),
        };

        if self.probe_git {
            match GitTracker::discover(root).map(|t| t.is_clean()) {
                Some(Ok(clean)) => {
                    metrics.git_clean = clean;
                    metrics.unavailable.remove(GIT_METRIC_PATH);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "could not read repository status");
                    metrics.unavailable.insert(GIT_METRIC_PATH.to_string());
                }
                None => {
                    metrics.unavailable.insert(GIT_METRIC_PATH.to_string());
                }
            }
        }

        info!(
            coverage = metrics.coverage_percent,
            max_complexity = metrics.max_complexity,
            unavailable = metrics.unavailable.len(),
            "metrics collected"
        );
        Ok(metrics)
    }
}

/// Returns a fixed snapshot; the snapshot can be swapped between calls.
pub struct StaticCollector {
    metrics: Mutex<Metrics>,
}

impl StaticCollector {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            metrics: Mutex::new(metrics),
        }
    }

    /// Replace the snapshot. A poisoned lock is recovered, since the whole
    /// value is overwritten.
    pub fn set(&self, metrics: Metrics) {
        *self.metrics.lock().unwrap_or_else(PoisonError::into_inner) = metrics;
        self.metrics.clear_poison();
    }
}

#[async_trait]
impl MetricsCollector for StaticCollector {
    async fn collect(&self, _root: &Path) -> Result<Metrics> {
        self.metrics
            .lock()
            .map(|m| m.clone())
            .map_err(|_| BrownfieldError::ToolFailed {
                tool: "metrics".to_string(),
                exit_code: 0,
                stderr: "snapshot lock poisoned".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;

    fn runner() -> ToolRunner {
        ToolRunner::new(Duration::from_secs(5), 0)
    }

    #[test]
    fn test_metrics_from_json_marks_absent_fields() {
        let metrics = metrics_from_json(json!({
            "coverage_percent": 68.0,
            "structure_conforms": true
        }))
        .unwrap();
        assert_eq!(metrics.coverage_percent, 68.0);
        assert!(!metrics.is_unavailable("coverage_percent"));
        assert!(metrics.is_unavailable("max_complexity"));
        assert!(metrics.is_unavailable("git_clean"));
    }

    #[test]
    fn test_metrics_from_json_rejects_bad_ranges() {
        let err = metrics_from_json(json!({"coverage_percent": 140})).unwrap_err();
        assert!(err.to_string().contains("coverage_percent"));
    }

    #[tokio::test]
    async fn test_command_collector_parses_tool_output() {
        let dir = tempdir().unwrap();
        let command = r#"echo 'analysis done'; echo '{"coverage_percent": 72.5, "max_complexity": 8, "build_passes": true}'"#;
        let collector = CommandCollector::new(
            Some(command.to_string()),
            dir.path().join("metrics.json"),
            runner(),
        )
        .without_git();
        let metrics = collector.collect(dir.path()).await.unwrap();
        assert_eq!(metrics.coverage_percent, 72.5);
        assert_eq!(metrics.max_complexity, 8.0);
        assert!(metrics.build_passes);
    }

    #[tokio::test]
    async fn test_command_collector_degrades_when_tool_missing() {
        let dir = tempdir().unwrap();
        let collector = CommandCollector::new(
            Some("no-such-analyzer-xyz --json".to_string()),
            dir.path().join("metrics.json"),
            runner(),
        )
        .without_git();
        let metrics = collector.collect(dir.path()).await.unwrap();
        for path in TOOL_METRIC_PATHS {
            assert!(metrics.is_unavailable(path), "{path} should be unavailable");
        }
    }

    #[tokio::test]
    async fn test_command_collector_reads_snapshot_file() {
        let dir = tempdir().unwrap();
        let snapshot = dir.path().join("metrics.json");
        std::fs::write(&snapshot, r#"{"coverage_percent": 40, "git_clean": true}"#).unwrap();
        let collector = CommandCollector::new(None, snapshot, runner()).without_git();
        let metrics = collector.collect(dir.path()).await.unwrap();
        assert_eq!(metrics.coverage_percent, 40.0);
        assert!(metrics.git_clean);
        assert!(!metrics.is_unavailable("git_clean"));
    }

    #[tokio::test]
    async fn test_command_collector_rejects_garbage_output() {
        let dir = tempdir().unwrap();
        let collector = CommandCollector::new(
            Some("echo not json".to_string()),
            dir.path().join("metrics.json"),
            runner(),
        )
        .without_git();
        let err = collector.collect(dir.path()).await.unwrap_err();
        assert!(matches!(err, BrownfieldError::ToolFailed { .. }));
    }

    #[tokio::test]
    async fn test_static_collector_swaps_snapshot() {
        let collector = StaticCollector::new(Metrics::default());
        let dir = tempdir().unwrap();
        assert_eq!(collector.collect(dir.path()).await.unwrap().coverage_percent, 0.0);
        collector.set(Metrics {
            coverage_percent: 68.0,
            ..Default::default()
        });
        assert_eq!(collector.collect(dir.path()).await.unwrap().coverage_percent, 68.0);
    }

    #[tokio::test]
    async fn test_static_collector_set_recovers_poisoned_lock() {
        let collector = std::sync::Arc::new(StaticCollector::new(Metrics::default()));
        let poisoner = collector.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.metrics.lock().unwrap();
            panic!("poison the snapshot lock");
        })
        .join();

        let dir = tempdir().unwrap();
        assert!(collector.collect(dir.path()).await.is_err());

        collector.set(Metrics {
            coverage_percent: 55.0,
            ..Default::default()
        });
        assert_eq!(collector.collect(dir.path()).await.unwrap().coverage_percent, 55.0);
    }
}
