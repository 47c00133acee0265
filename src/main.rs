use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use brownfield::errors::{BrownfieldError, EXIT_FATAL, EXIT_SUCCESS};
use brownfield::phase::Phase;

mod cmd;

#[derive(Parser)]
#[command(name = "brownfield")]
#[command(version, about = "Phased remediation of legacy codebases behind quality gates")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Timeout in seconds for each external tool call. Overrides brownfield.toml.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the project or refresh its metrics
    Assess {
        /// Language key to use instead of detection
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Move to the next phase once its gates pass
    Advance { phase: Phase },
    /// Run the current phase's tasks
    Run,
    /// Continue the current phase from its checkpoint
    Resume,
    /// Discard a phase checkpoint so it can be run again
    Restart { phase: Phase },
    /// Show the persisted workflow state
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Evaluate every gate against the current metrics
    Validate {
        #[arg(long)]
        json: bool,
    },
    /// Mark the project graduated
    Graduate {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize .brownfield/ with a default brownfield.toml
    Init,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("{} {:#}", console::style("Error:").red().bold(), e);
            let brownfield_error = e.downcast_ref::<BrownfieldError>();
            if let Some(hint) = brownfield_error.and_then(BrownfieldError::remediation) {
                eprintln!("  {} {}", console::style("Next:").dim(), hint);
            }
            let code = brownfield_error.map_or(EXIT_FATAL, BrownfieldError::exit_code);
            ExitCode::from(code as u8)
        }
    }
}

async fn run(cli: &Cli) -> Result<i32> {
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // assess lays out .brownfield/ before logging starts so the baseline run reaches the log file
    let initialized = match cli.command {
        Commands::Assess { .. } => brownfield::init::init_project(&project_dir)?.created,
        _ => false,
    };

    let log_dir = brownfield::init::get_brownfield_dir(&project_dir).join("logs");
    if let Err(e) = brownfield::logging::init_tracing(cli.verbose, Some(&log_dir)) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match &cli.command {
        Commands::Assess { language } => {
            cmd::cmd_assess(cli, &project_dir, language.as_deref(), initialized).await?
        }
        Commands::Advance { phase } => cmd::cmd_advance(cli, &project_dir, *phase)?,
        Commands::Run => cmd::cmd_run(cli, &project_dir).await?,
        Commands::Resume => cmd::cmd_resume(cli, &project_dir).await?,
        Commands::Restart { phase } => cmd::cmd_restart(cli, &project_dir, *phase)?,
        Commands::Status { json } => cmd::cmd_status(cli, &project_dir, *json)?,
        Commands::Validate { json } => return cmd::cmd_validate(cli, &project_dir, *json),
        Commands::Graduate { yes } => cmd::cmd_graduate(cli, &project_dir, *yes)?,
        Commands::Config { command } => cmd::cmd_config(cli, &project_dir, command.clone())?,
    }

    Ok(EXIT_SUCCESS)
}
