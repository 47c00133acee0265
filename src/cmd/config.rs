//! Configuration view and validation commands: `brownfield config`.

use anyhow::Result;

use super::super::{Cli, ConfigCommands};

pub fn cmd_config(cli: &Cli, project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use brownfield::brownfield_config::{BrownfieldConfig, CONFIG_FILE, user_config_path};
    use brownfield::init::{get_brownfield_dir, init_project};

    let brownfield_dir = get_brownfield_dir(project_dir);
    let config_path = brownfield_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Brownfield Configuration");
            println!("========================");
            println!();

            let config =
                BrownfieldConfig::with_cli_args(project_dir.to_path_buf(), cli.verbose, cli.timeout)?;
            if config.config_file().exists() {
                println!("Config file: {}", config.config_file().display());
            } else {
                println!("No brownfield.toml found at {}", config_path.display());
                println!("Run 'brownfield config init' to create one.");
            }
            if let Some(user) = user_config_path().filter(|p| p.exists()) {
                println!("User file:   {}", user.display());
            }
            println!();

            print!("{}", toml::to_string_pretty(&config.toml)?);
            println!();

            println!("Effective values (with env/CLI overrides):");
            println!("  tool timeout = {}s", config.tool_timeout_secs());
            println!(
                "  metrics command = {}",
                config
                    .metrics_command()
                    .unwrap_or_else(|| format!("(read {})", config.metrics_file().display()))
            );
            let gates = config.gate_set();
            println!("  gates = {}", gates.all().len());
            println!("  state file = {}", config.state_file().display());
            println!("  logs = {}", config.log_dir().display());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No brownfield.toml found. Using defaults (valid).");
                return Ok(());
            }

            let config = BrownfieldConfig::new(project_dir.to_path_buf())?;
            let warnings = config.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            let existed = config_path.exists();
            let result = init_project(project_dir)?;

            if existed {
                println!("brownfield.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            println!("Created {}", result.brownfield_dir.join(CONFIG_FILE).display());
            println!();
            println!("You can now customize:");
            println!("  - [thresholds] coverage_min, complexity_max");
            println!("  - [metrics] command producing the metrics JSON");
            println!("  - [[gates]] and [[languages]] for project-specific checks");
            println!();
        }
    }

    Ok(())
}
