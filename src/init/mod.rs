//! Initialization of the `.brownfield/` project directory.
//!
//! ```text
//! .brownfield/
//! ├── .gitignore        # keeps runtime files out of the working-tree check
//! ├── brownfield.toml   # project configuration
//! ├── state.json        # BrownfieldState (written by assess)
//! ├── metrics.json      # optional snapshot from an external pipeline
//! ├── checkpoints/      # one <phase>.json per phase
//! └── logs/
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::brownfield_config::{BrownfieldToml, CONFIG_FILE};

/// The name of the brownfield project directory.
pub const BROWNFIELD_DIR: &str = ".brownfield";

/// Runtime files are ignored so they never make the tree look dirty.
const GITIGNORE: &str = "# brownfield runtime files\n*\n!brownfield.toml\n";

#[derive(Debug)]
pub struct InitResult {
    pub brownfield_dir: PathBuf,
    /// Whether the directory was newly created (false if it already existed)
    pub created: bool,
}

/// Create (or complete) the `.brownfield/` structure.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let brownfield_dir = get_brownfield_dir(project_dir);
    let created = !brownfield_dir.exists();
    ensure_directory_structure(&brownfield_dir)?;
    Ok(InitResult {
        brownfield_dir,
        created,
    })
}

fn ensure_directory_structure(brownfield_dir: &Path) -> Result<()> {
    for dir in [
        brownfield_dir.to_path_buf(),
        brownfield_dir.join("checkpoints"),
        brownfield_dir.join("logs"),
    ] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let gitignore = brownfield_dir.join(".gitignore");
    if !gitignore.exists() {
        std::fs::write(&gitignore, GITIGNORE)
            .with_context(|| format!("Failed to create {}", gitignore.display()))?;
    }

    let config_file = brownfield_dir.join(CONFIG_FILE);
    if !config_file.exists() {
        BrownfieldToml::default().save(&config_file)?;
    }

    Ok(())
}

/// Check if a project has been initialized.
pub fn is_initialized(project_dir: &Path) -> bool {
    project_dir.join(BROWNFIELD_DIR).exists()
}

pub fn get_brownfield_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(BROWNFIELD_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_project_creates_structure() {
        let dir = tempdir().unwrap();
        let result = init_project(dir.path()).unwrap();

        assert!(result.created);
        assert_eq!(result.brownfield_dir, dir.path().join(".brownfield"));
        assert!(result.brownfield_dir.join("checkpoints").is_dir());
        assert!(result.brownfield_dir.join("logs").is_dir());
        assert!(result.brownfield_dir.join(".gitignore").is_file());
        assert!(result.brownfield_dir.join(CONFIG_FILE).is_file());
    }

    #[test]
    fn test_init_project_is_idempotent_and_keeps_config() {
        let dir = tempdir().unwrap();
        init_project(dir.path()).unwrap();
        let config = dir.path().join(".brownfield").join(CONFIG_FILE);
        std::fs::write(&config, "[tools]\ntimeout_secs = 9\n").unwrap();

        let result = init_project(dir.path()).unwrap();
        assert!(!result.created);
        assert_eq!(
            std::fs::read_to_string(&config).unwrap(),
            "[tools]\ntimeout_secs = 9\n"
        );
    }

    #[test]
    fn test_default_config_parses() {
        let dir = tempdir().unwrap();
        let result = init_project(dir.path()).unwrap();
        let toml = BrownfieldToml::load(&result.brownfield_dir.join(CONFIG_FILE)).unwrap();
        assert_eq!(toml, BrownfieldToml::default());
    }

    #[test]
    fn test_is_initialized() {
        let dir = tempdir().unwrap();
        assert!(!is_initialized(dir.path()));
        init_project(dir.path()).unwrap();
        assert!(is_initialized(dir.path()));
    }
}
