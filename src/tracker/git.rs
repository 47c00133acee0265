//! Read-only repository probe.
//!
//! The orchestrator only needs two facts from version control: whether the
//! working tree is clean, and which commit a checkpoint was taken at.

use anyhow::{Context, Result};
use git2::{Repository, Status, StatusOptions};
use std::path::Path;

use crate::init::BROWNFIELD_DIR;

pub struct GitTracker {
    repo: Repository,
}

impl GitTracker {
    pub fn new(project_dir: &Path) -> Result<Self> {
        let repo = Repository::open(project_dir).context("Failed to open git repository")?;
        Ok(Self { repo })
    }

    /// Open the repository if `project_dir` is inside one.
    pub fn discover(project_dir: &Path) -> Option<Self> {
        Repository::discover(project_dir)
            .ok()
            .map(|repo| Self { repo })
    }

    /// Get the HEAD commit if it exists (returns None for unborn branches)
    fn get_head_commit(&self) -> Option<git2::Commit<'_>> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
    }

    /// Get current HEAD SHA (returns None for unborn branches)
    pub fn head_sha(&self) -> Option<String> {
        self.get_head_commit().map(|c| c.id().to_string())
    }

    /// True when there are no modified, staged or untracked files.
    /// Ignored files do not count, nor do untracked files under
    /// `.brownfield/` (the config written by `init` until it is committed).
    pub fn is_clean(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .context("Failed to read repository status")?;
        Ok(statuses.iter().all(|entry| is_own_untracked(&entry)))
    }
}

fn is_own_untracked(entry: &git2::StatusEntry<'_>) -> bool {
    entry.status() == Status::WT_NEW
        && entry
            .path()
            .is_some_and(|path| Path::new(path).components().any(|c| c.as_os_str() == BROWNFIELD_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Repository;
    use std::fs;
    use tempfile::tempdir;

    fn setup_repo() -> (GitTracker, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "test").unwrap();
        config.set_str("user.email", "test@test.com").unwrap();
        drop(config);
        let tracker = GitTracker::new(dir.path()).unwrap();
        (tracker, dir)
    }

    fn commit_file(dir: &std::path::Path, name: &str, content: &str, msg: &str) {
        let repo = Repository::open(dir).unwrap();
        let file_path = dir.join(name);
        fs::write(&file_path, content).unwrap();
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("test", "test@test.com").unwrap();
        if let Ok(head) = repo.head() {
            let parent = head.peel_to_commit().unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &[&parent])
                .unwrap();
        } else {
            repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &[])
                .unwrap();
        }
    }

    #[test]
    fn test_head_sha_unborn_then_populated() {
        let (tracker, dir) = setup_repo();
        assert!(tracker.head_sha().is_none());
        commit_file(dir.path(), "a.txt", "hello", "init");
        let sha = tracker.head_sha();
        assert!(sha.is_some());
        assert_eq!(sha.unwrap().len(), 40);
    }

    #[test]
    fn test_clean_after_commit_dirty_after_edit() {
        let (tracker, dir) = setup_repo();
        commit_file(dir.path(), "lib.rs", "fn a() {}\n", "init");
        assert!(tracker.is_clean().unwrap());

        fs::write(dir.path().join("lib.rs"), "fn b() {}\n").unwrap();
        assert!(!tracker.is_clean().unwrap());
    }

    #[test]
    fn test_untracked_file_makes_tree_dirty() {
        let (tracker, dir) = setup_repo();
        commit_file(dir.path(), "README.md", "# hi\n", "init");
        fs::write(dir.path().join("scratch.txt"), "tmp").unwrap();
        assert!(!tracker.is_clean().unwrap());
    }

    #[test]
    fn test_uncommitted_brownfield_config_keeps_tree_clean() {
        let (tracker, dir) = setup_repo();
        commit_file(dir.path(), "README.md", "# hi\n", "init");
        crate::init::init_project(dir.path()).unwrap();
        assert!(tracker.is_clean().unwrap());

        commit_file(dir.path(), "README.md", "# hi\n", "track config");
        fs::write(dir.path().join(".brownfield/brownfield.toml"), "[tools]\n").unwrap();
        assert!(!tracker.is_clean().unwrap());
    }

    #[test]
    fn test_discover_outside_repository() {
        let dir = tempdir().unwrap();
        // A fresh temp dir is not inside a repository on CI runners.
        if Repository::discover(dir.path()).is_err() {
            assert!(GitTracker::discover(dir.path()).is_none());
        }
    }
}
