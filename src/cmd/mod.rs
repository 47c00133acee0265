//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled                        |
//! |------------|-----------------------------------------|
//! | `assess`   | `Assess`                                |
//! | `phase`    | `Advance`, `Run`, `Resume`, `Restart`   |
//! | `status`   | `Status`, `Validate`                    |
//! | `graduate` | `Graduate`                              |
//! | `config`   | `Config`                                |

pub mod assess;
pub mod config;
pub mod graduate;
pub mod phase;
pub mod status;

use anyhow::Result;
use std::path::Path;

use brownfield::brownfield_config::BrownfieldConfig;
use brownfield::orchestrator::Orchestrator;

use super::Cli;

pub use assess::cmd_assess;
pub use config::cmd_config;
pub use graduate::cmd_graduate;
pub use phase::{cmd_advance, cmd_restart, cmd_resume, cmd_run};
pub use status::{cmd_status, cmd_validate};

/// Effective configuration and an orchestrator wired from it.
pub fn load_orchestrator(cli: &Cli, project_dir: &Path) -> Result<(BrownfieldConfig, Orchestrator)> {
    let config = BrownfieldConfig::with_cli_args(project_dir.to_path_buf(), cli.verbose, cli.timeout)?;
    let orchestrator = Orchestrator::from_config(&config)?;
    Ok((config, orchestrator))
}
