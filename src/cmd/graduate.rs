//! Final sign-off: `brownfield graduate`.

use anyhow::Result;
use std::path::Path;

use brownfield::errors::BrownfieldError;
use brownfield::phase::Phase;

use super::super::Cli;
use super::load_orchestrator;
use super::status::print_gate_results;

pub fn cmd_graduate(cli: &Cli, project_dir: &Path, yes: bool) -> Result<()> {
    use dialoguer::Confirm;

    let (_config, orchestrator) = load_orchestrator(cli, project_dir)?;
    let mut state = orchestrator.load_state()?;

    if state.graduated {
        println!("Project already graduated");
        return Ok(());
    }

    // Surface gate failures before asking for confirmation.
    let report = orchestrator.validate(&state)?;
    if state.current_phase == Phase::Graduation && !report.all_passed {
        println!();
        print_gate_results(&report.results);
        println!();
        return Err(BrownfieldError::GateValidation {
            phase: Phase::Graduation,
            failures: report.failures(),
        }
        .into());
    }

    let confirmed = yes
        || (state.current_phase == Phase::Graduation
            && Confirm::new()
                .with_prompt("All gates pass. Mark this project as graduated?")
                .default(false)
                .interact()
                .unwrap_or(false));

    orchestrator.graduate(&mut state, confirmed)?;

    println!();
    println!("{}", console::style("Project graduated").bold().green());
    println!();
    Ok(())
}
