//! Baseline capture and metric refresh: `brownfield assess`.

use anyhow::Result;
use std::path::Path;

use super::super::Cli;
use super::load_orchestrator;
use super::status::print_gate_results;

/// `initialized` is true when this invocation created `.brownfield/`.
pub async fn cmd_assess(cli: &Cli, project_dir: &Path, language: Option<&str>, initialized: bool) -> Result<()> {
    if initialized {
        println!(
            "Initialized {}",
            brownfield::init::get_brownfield_dir(project_dir).display()
        );
    }

    let (_config, orchestrator) = load_orchestrator(cli, project_dir)?;
    let existing = orchestrator.load_state_optional()?;
    let assessment = orchestrator.assess(existing, language).await?;
    let state = &assessment.state;

    println!();
    if assessment.initialized {
        println!("{}", console::style("Baseline captured").bold().green());
    } else {
        println!("{}", console::style("Metrics refreshed").bold());
    }
    println!(
        "  Language: {}",
        state.language.as_deref().unwrap_or("undetected")
    );
    println!("  Phase:    {}", state.current_phase);

    if !assessment.regressions.is_empty() {
        println!();
        println!("{}", console::style("Regressions detected:").red().bold());
        for event in &assessment.regressions {
            println!(
                "  - {} on {} (re-enter {})",
                event.kind, event.metric_path, event.re_entry_phase
            );
        }
    }
    if let Some(phase) = assessment.re_entered {
        println!(
            "  {} returned to phase {}",
            console::style("⚠").yellow(),
            phase
        );
    }

    println!();
    print_gate_results(&assessment.report.results);
    println!();
    Ok(())
}
