//! Phase movement and task execution: `advance`, `run`, `resume`, `restart`.

use anyhow::Result;
use std::path::Path;

use brownfield::orchestrator::RunOutcome;
use brownfield::phase::Phase;

use super::super::Cli;
use super::load_orchestrator;
use super::status::print_gate_results;

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupt_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await
    }
}

pub fn cmd_advance(cli: &Cli, project_dir: &Path, target: Phase) -> Result<()> {
    let (_config, orchestrator) = load_orchestrator(cli, project_dir)?;
    let mut state = orchestrator.load_state()?;
    let from = state.current_phase;

    orchestrator.advance_with_validation(&mut state, target)?;

    println!();
    println!(
        "{} {} → {}",
        console::style("Advanced").bold().green(),
        from,
        target
    );
    println!("Run 'brownfield run' to start the {} tasks.", target);
    println!();
    Ok(())
}

pub async fn cmd_run(cli: &Cli, project_dir: &Path) -> Result<()> {
    let (_config, orchestrator) = load_orchestrator(cli, project_dir)?;
    let mut state = orchestrator.load_state()?;
    let outcome = orchestrator
        .run_phase(&mut state, interrupt_signal())
        .await?;
    print_outcome(&outcome);
    Ok(())
}

pub async fn cmd_resume(cli: &Cli, project_dir: &Path) -> Result<()> {
    let (_config, orchestrator) = load_orchestrator(cli, project_dir)?;
    let mut state = orchestrator.load_state()?;
    let outcome = orchestrator.resume(&mut state, interrupt_signal()).await?;
    print_outcome(&outcome);
    Ok(())
}

pub fn cmd_restart(cli: &Cli, project_dir: &Path, phase: Phase) -> Result<()> {
    let (_config, orchestrator) = load_orchestrator(cli, project_dir)?;
    if orchestrator.restart(phase)? {
        println!("Checkpoint for {} discarded", phase);
    } else {
        println!("No checkpoint for {}", phase);
    }
    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    let (done, total) = outcome.checkpoint.progress();
    println!();
    println!(
        "{} {} ({}/{} tasks)",
        console::style("Phase").bold(),
        outcome.phase,
        done,
        total
    );
    for task in &outcome.checkpoint.tasks {
        let mark = if task.completed {
            console::style("✓").green()
        } else {
            console::style("·").dim()
        };
        println!("  {} {:<20} {}", mark, task.task_id, task.description);
    }

    if let Some(phase) = outcome.re_entered {
        println!();
        println!(
            "{} regression detected; returned to phase {}",
            console::style("⚠").yellow(),
            phase
        );
    }
    if let Some(report) = &outcome.report {
        println!();
        print_gate_results(&report.results);
    }
    match outcome.phase.next() {
        Some(next) if outcome.re_entered.is_none() => {
            println!();
            println!("When the gates pass: 'brownfield advance {}'", next);
        }
        None => {
            println!();
            println!("All phases done: 'brownfield graduate'");
        }
        _ => {}
    }
    println!();
}
