//! Status command implementation

use std::collections::BTreeMap;

use colored::Colorize;
use docsync_core::{StateStore, SyncLink, SyncRecord};
use serde::Serialize;

use crate::context::Context;
use crate::error::Result;

#[derive(Debug, Serialize)]
struct PairStatus {
    #[serde(flatten)]
    link: SyncLink,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<SyncRecord>,
}

/// Run the status command
pub fn run_status(context: &Context, json: bool) -> Result<()> {
    let state = context.state()?;
    let mut records: BTreeMap<_, _> = state.list_all()?.into_iter().map(|r| (r.stable_id, r)).collect();
    let pairs: Vec<PairStatus> = state
        .list_links()?
        .into_iter()
        .map(|link| PairStatus {
            record: records.remove(&link.stable_id),
            link,
        })
        .collect();
    let open_conflicts = state.list_artifacts()?.iter().filter(|a| a.is_unresolved()).count();
    let pending = state.load_references()?.pending.len();

    if json {
        println!("{}", serde_json::to_string_pretty(&pairs)?);
        return Ok(());
    }

    println!("{}", "Sync Status".bold());
    println!();
    println!("{}:  {}", "State".dimmed(), context.state_dir.display());
    println!("{}:  {}", "Policy".dimmed(), context.config.sync.policy.to_string().cyan());
    println!();

    println!("{}:", "Pairs".bold());
    if pairs.is_empty() {
        println!("  {} (run {} to start)", "None".dimmed(), "docsync sync".cyan());
    }
    for pair in &pairs {
        let id = pair.link.stable_id.to_string();
        match &pair.record {
            Some(record) => println!(
                "  {} {} <-> {} v{} {} {}",
                id[..8].dimmed(),
                pair.link.local_path.to_string().cyan(),
                pair.link.remote_id,
                record.sync_version,
                record.last_local_fingerprint.short().dimmed(),
                record.last_remote_fingerprint.short().dimmed(),
            ),
            None => println!(
                "  {} {} <-> {} {}",
                id[..8].dimmed(),
                pair.link.local_path.to_string().cyan(),
                pair.link.remote_id,
                "(not committed)".yellow()
            ),
        }
    }
    println!();

    if open_conflicts > 0 {
        println!(
            "{} {} unresolved conflict(s), see {}",
            "!".red().bold(),
            open_conflicts,
            "docsync conflicts".cyan()
        );
    }
    if pending > 0 {
        println!("{} {} link(s) waiting for their target", "-".yellow(), pending);
    }
    Ok(())
}
