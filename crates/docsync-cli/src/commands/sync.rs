//! Sync command implementation

use colored::Colorize;
use docsync_core::{CycleSummary, PairOutcome};

use crate::context::Context;
use crate::error::{CliError, Result};

/// Run one cycle and report every pair that did something.
pub async fn run_sync(context: &Context, json: bool) -> Result<()> {
    let engine = context.engine()?;
    if !json {
        println!(
            "{} Syncing {} with {}...",
            "=>".blue().bold(),
            context.vault_dir()?.display().to_string().cyan(),
            context.remote_dir()?.display().to_string().cyan()
        );
    }

    let summary = engine.run_cycle().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if summary.failed > 0 {
        return Err(CliError::user(format!("{} pair(s) failed to sync", summary.failed)));
    }
    Ok(())
}

pub fn print_summary(summary: &CycleSummary) {
    for report in &summary.outcomes {
        let id = report.stable_id.to_string();
        let id = id[..8].dimmed();
        let line = match &report.outcome {
            PairOutcome::Unchanged => continue,
            PairOutcome::Propagated { from } => format!("{} from {from}", "propagated".green()),
            PairOutcome::Converged => "converged".green().to_string(),
            PairOutcome::Deleted { side } => format!("{} ({side} deleted)", "deleted".yellow()),
            PairOutcome::Forgotten => "forgotten".dimmed().to_string(),
            PairOutcome::Resolved { artifact_id } => format!("{} conflict {artifact_id}", "applied".green()),
            PairOutcome::Skipped { reason } => format!("{}: {reason}", "skipped".yellow()),
            PairOutcome::Failed { error } => format!("{}: {error}", "failed".red().bold()),
            PairOutcome::Conflicted { artifact_id } => format!("{} {artifact_id}", "conflict".red().bold()),
        };
        let degraded = if report.degraded { " [degraded]".yellow().to_string() } else { String::new() };
        println!("   {id} {line}{degraded}");
    }

    let status = if summary.failed > 0 {
        "FAILED".red().bold()
    } else if summary.conflicted > 0 {
        "CONFLICTS".yellow().bold()
    } else {
        "OK".green().bold()
    };
    println!("{status} {summary}");
    if summary.conflicted > 0 {
        println!();
        println!("Run {} to review them.", "docsync conflicts".cyan());
    }
}
