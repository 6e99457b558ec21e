//! Conflict listing and resolution

use colored::Colorize;
use docsync_core::{ConflictArtifact, ResolutionChoice, StateStore, resolve_artifact};

use crate::cli::Take;
use crate::context::Context;
use crate::error::Result;

pub fn run_conflicts(context: &Context, all: bool) -> Result<()> {
    let state = context.state()?;
    let mut artifacts: Vec<ConflictArtifact> = state
        .list_artifacts()?
        .into_iter()
        .filter(|a| all || a.is_unresolved())
        .collect();
    artifacts.sort_by_key(|a| a.created_at);

    if artifacts.is_empty() {
        println!("{} No conflicts.", "OK".green().bold());
        return Ok(());
    }

    for artifact in &artifacts {
        let status = if artifact.is_applied() {
            "applied".dimmed()
        } else if artifact.is_unresolved() {
            artifact.status.to_string().red().bold()
        } else {
            artifact.status.to_string().yellow()
        };
        println!(
            "{} {} pair {} ({})",
            "conflict".bold(),
            artifact.id.to_string().cyan(),
            artifact.stable_id,
            status
        );
        println!("   {} {}", "created".dimmed(), artifact.created_at.format("%Y-%m-%d %H:%M:%S"));
        if artifact.is_unresolved() {
            for line in artifact.diff.lines() {
                print_diff_line(line);
            }
        }
        println!();
    }

    let unresolved = artifacts.iter().filter(|a| a.is_unresolved()).count();
    if unresolved > 0 {
        println!("Run {} to pick a side.", "docsync resolve <id> --take remote|local".cyan());
    }
    Ok(())
}

fn print_diff_line(line: &str) {
    if line.starts_with("+++") || line.starts_with("---") {
        println!("   {}", line.bold());
    } else if line.starts_with('+') {
        println!("   {}", line.green());
    } else if line.starts_with('-') {
        println!("   {}", line.red());
    } else if line.starts_with("@@") {
        println!("   {}", line.cyan());
    } else {
        println!("   {line}");
    }
}

pub fn run_resolve(context: &Context, artifact_id: &str, take: Take) -> Result<()> {
    let state = context.state()?;
    let choice = match take {
        Take::Remote => ResolutionChoice::Remote,
        Take::Local => ResolutionChoice::Local,
    };
    let artifact = resolve_artifact(&state, artifact_id, choice)?;
    println!(
        "{} Conflict {} marked {}; the next sync writes it to both sides.",
        "OK".green().bold(),
        artifact.id.to_string().cyan(),
        artifact.status
    );
    Ok(())
}
