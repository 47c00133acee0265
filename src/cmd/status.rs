//! Read-only views: `brownfield status` and `brownfield validate`.

use anyhow::{Context, Result};
use std::path::Path;

use brownfield::errors::{EXIT_GATE_FAILURE, EXIT_SUCCESS};
use brownfield::gates::{GateResult, GateStatus};
use brownfield::metrics::{Lookup, TOOL_METRIC_PATHS};
use brownfield::phase::Phase;

use super::super::Cli;
use super::load_orchestrator;

/// Print one line per gate, marked passed, failed or unknown.
pub fn print_gate_results(results: &[GateResult]) {
    let passed = results.iter().filter(|r| r.passed).count();
    println!(
        "{} {}/{} passed",
        console::style("Gates:").bold(),
        passed,
        results.len()
    );
    for result in results {
        let mark = match result.status {
            GateStatus::Passed => console::style("✓").green(),
            GateStatus::Failed if result.required => console::style("✗").red(),
            GateStatus::Failed => console::style("✗").yellow(),
            GateStatus::Unknown => console::style("?").yellow(),
        };
        println!("  {} {}", mark, result.describe());
    }
}

pub fn cmd_status(cli: &Cli, project_dir: &Path, json: bool) -> Result<()> {
    let (_config, orchestrator) = load_orchestrator(cli, project_dir)?;
    let state = orchestrator.load_state()?;
    let checkpoint = orchestrator.checkpoints().load_optional(state.current_phase)?;

    if json {
        let out = serde_json::json!({
            "state": state,
            "checkpoint": checkpoint,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("Failed to serialize status")?
        );
        return Ok(());
    }

    println!();
    println!("{}", console::style("Brownfield Status").bold().cyan());
    println!("=================");
    println!();
    println!("Project:   {}", state.project_root.display());
    println!(
        "Language:  {}",
        state.language.as_deref().unwrap_or("undetected")
    );
    println!("Phase:     {}", state.current_phase);
    if state.graduated {
        println!("Graduated: {}", console::style("yes").green().bold());
    }
    println!("Updated:   {}", state.updated_at.format("%Y-%m-%d %H:%M:%S"));

    println!();
    println!("Phases:");
    for phase in Phase::all() {
        let line = match state.phase_timestamps.get(phase) {
            Some(stamps) => match stamps.completed_at {
                Some(done) => format!("completed {}", done.format("%Y-%m-%d %H:%M")),
                None => format!("entered {}", stamps.entered_at.format("%Y-%m-%d %H:%M")),
            },
            None => "-".to_string(),
        };
        let marker = if *phase == state.current_phase { "▶" } else { " " };
        println!("  {} {:<12} {}", marker, phase.as_str(), line);
    }

    if let Some(cp) = &checkpoint {
        let (done, total) = cp.progress();
        println!();
        println!(
            "Checkpoint: {} ({}/{} tasks, {:.0}%)",
            cp.status,
            done,
            total,
            cp.progress_ratio() * 100.0
        );
        if let Some(task) = cp.next_task() {
            println!("  Next task: {}", task.task_id);
        }
    }

    println!();
    println!("Metrics (baseline → current):");
    for path in TOOL_METRIC_PATHS {
        let show = |m: &brownfield::metrics::Metrics| match m.lookup(path) {
            Lookup::Value(_) if m.is_unavailable(path) => "unknown".to_string(),
            Lookup::Value(v) => v.to_string(),
            _ => "-".to_string(),
        };
        println!(
            "  {:<26} {} → {}",
            path,
            show(&state.baseline_metrics),
            show(&state.current_metrics)
        );
    }

    let pending = state.pending_regressions();
    if !pending.is_empty() {
        println!();
        println!("{}", console::style("Unresolved regressions:").red().bold());
        for event in pending {
            println!(
                "  - {} on {} since {} (re-entered {})",
                event.kind,
                event.metric_path,
                event.detected_at.format("%Y-%m-%d %H:%M"),
                event.re_entry_phase
            );
        }
    }

    if !state.last_gate_results.is_empty() {
        println!();
        print_gate_results(state.last_gate_results());
    }
    println!();
    Ok(())
}

/// Exit code is 0 when every required gate passes, 1 otherwise.
pub fn cmd_validate(cli: &Cli, project_dir: &Path, json: bool) -> Result<i32> {
    let (_config, orchestrator) = load_orchestrator(cli, project_dir)?;
    let state = orchestrator.load_state()?;
    let report = orchestrator.validate(&state)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize gate report")?
        );
    } else {
        println!();
        print_gate_results(&report.results);
        println!();
    }

    Ok(if report.all_required_passed {
        EXIT_SUCCESS
    } else {
        EXIT_GATE_FAILURE
    })
}
