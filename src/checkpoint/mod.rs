//! Per-phase resumable task records.
//!
//! `CheckpointManager` exclusively owns checkpoint files
//! (`.brownfield/checkpoints/<phase>.json`). Task completion is only ever
//! changed through `complete_task`; progress is always derived from the task
//! list.

pub mod tasks;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::errors::{BrownfieldError, Result};
use crate::phase::Phase;
use crate::tracker::GitTracker;
use crate::util::write_json_atomic;

pub use tasks::{TaskAction, default_plan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    InProgress,
    /// Operator interrupt; resumable
    Interrupted,
    Completed,
    /// A task failed; only `restart` clears it
    Failed,
}

impl CheckpointStatus {
    pub fn is_resumable(&self) -> bool {
        matches!(self, CheckpointStatus::InProgress | CheckpointStatus::Interrupted)
    }
}

impl std::fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckpointStatus::InProgress => "in_progress",
            CheckpointStatus::Interrupted => "interrupted",
            CheckpointStatus::Completed => "completed",
            CheckpointStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub description: String,
    pub phase: Phase,
    pub estimated_minutes: u32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(task_id: &str, description: &str, phase: Phase, estimated_minutes: u32) -> Self {
        Self {
            task_id: task_id.to_string(),
            description: description.to_string(),
            phase,
            estimated_minutes,
            completed: false,
            started_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub phase: Phase,
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit_sha: Option<String>,
    pub status: CheckpointStatus,
    /// Task that failed, when `status` is `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_task: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(phase: Phase, tasks: Vec<Task>) -> Self {
        let now = Utc::now();
        Self {
            phase,
            tasks,
            git_commit_sha: None,
            status: CheckpointStatus::InProgress,
            failed_task: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `(completed, total)`
    pub fn progress(&self) -> (usize, usize) {
        let done = self.tasks.iter().filter(|t| t.completed).count();
        (done, self.tasks.len())
    }

    /// Completed fraction in `0.0..=1.0`; an empty task list counts as done.
    pub fn progress_ratio(&self) -> f64 {
        match self.progress() {
            (_, 0) => 1.0,
            (done, total) => done as f64 / total as f64,
        }
    }

    pub fn next_task(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| !t.completed)
    }

    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|t| t.completed)
    }
}

pub struct CheckpointManager {
    dir: PathBuf,
    project_root: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: PathBuf, project_root: PathBuf) -> Self {
        Self { dir, project_root }
    }

    pub fn path_for(&self, phase: Phase) -> PathBuf {
        self.dir.join(format!("{}.json", phase))
    }

    /// Persist atomically, stamping `updated_at` and the current HEAD.
    pub fn save(&self, checkpoint: &mut Checkpoint) -> Result<()> {
        checkpoint.updated_at = Utc::now();
        if let Some(sha) = GitTracker::discover(&self.project_root).and_then(|t| t.head_sha()) {
            checkpoint.git_commit_sha = Some(sha);
        }
        write_json_atomic(&self.path_for(checkpoint.phase), checkpoint)?;
        let (done, total) = checkpoint.progress();
        debug!(phase = %checkpoint.phase, status = %checkpoint.status, done, total, "checkpoint saved");
        Ok(())
    }

    pub fn load(&self, phase: Phase) -> Result<Checkpoint> {
        let path = self.path_for(phase);
        if !path.exists() {
            return Err(BrownfieldError::StateNotFound { path });
        }
        let content = std::fs::read_to_string(&path).map_err(|source| BrownfieldError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| BrownfieldError::StateCorrupted { path, source })
    }

    pub fn load_optional(&self, phase: Phase) -> Result<Option<Checkpoint>> {
        match self.load(phase) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(BrownfieldError::StateNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create and persist a fresh checkpoint for `phase`.
    pub fn begin(&self, phase: Phase, tasks: Vec<Task>) -> Result<Checkpoint> {
        let mut checkpoint = Checkpoint::new(phase, tasks);
        self.save(&mut checkpoint)?;
        info!(%phase, tasks = checkpoint.tasks.len(), "checkpoint created");
        Ok(checkpoint)
    }

    /// Load the checkpoint and return it with its first incomplete task.
    pub fn resume(&self, phase: Phase) -> Result<(Checkpoint, Task)> {
        let checkpoint = self.load(phase)?;
        if checkpoint.status == CheckpointStatus::Failed {
            let task_id = checkpoint
                .failed_task
                .clone()
                .or_else(|| checkpoint.next_task().map(|t| t.task_id.clone()))
                .unwrap_or_default();
            return Err(BrownfieldError::CheckpointFailed { phase, task_id });
        }
        match checkpoint.next_task().cloned() {
            Some(task) => Ok((checkpoint, task)),
            None => Err(BrownfieldError::PhaseAlreadyComplete { phase }),
        }
    }

    /// Discard the checkpoint. Returns whether one existed.
    pub fn restart(&self, phase: Phase) -> Result<bool> {
        let path = self.path_for(phase);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|source| BrownfieldError::Io { path, source })?;
        info!(%phase, "checkpoint discarded");
        Ok(true)
    }

    pub fn start_task(&self, checkpoint: &mut Checkpoint, task_id: &str) -> Result<()> {
        if let Some(task) = checkpoint.tasks.iter_mut().find(|t| t.task_id == task_id) {
            task.started_at = Some(Utc::now());
        }
        checkpoint.status = CheckpointStatus::InProgress;
        self.save(checkpoint)
    }

    /// Mark a task done and persist. The checkpoint becomes `completed` with its last task.
    pub fn complete_task(&self, checkpoint: &mut Checkpoint, task_id: &str) -> Result<()> {
        if let Some(task) = checkpoint.tasks.iter_mut().find(|t| t.task_id == task_id) {
            task.completed = true;
            task.completed_at = Some(Utc::now());
        }
        if checkpoint.is_complete() {
            checkpoint.status = CheckpointStatus::Completed;
        }
        self.save(checkpoint)
    }

    pub fn mark_interrupted(&self, checkpoint: &mut Checkpoint) -> Result<()> {
        checkpoint.status = CheckpointStatus::Interrupted;
        self.save(checkpoint)
    }

    pub fn mark_failed(&self, checkpoint: &mut Checkpoint, task_id: &str) -> Result<()> {
        checkpoint.status = CheckpointStatus::Failed;
        checkpoint.failed_task = Some(task_id.to_string());
        self.save(checkpoint)
    }
}
