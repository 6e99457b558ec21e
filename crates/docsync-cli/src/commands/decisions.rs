//! Decision log command

use colored::Colorize;
use docsync_core::StateStore;

use crate::context::Context;
use crate::error::Result;

pub fn run_decisions(context: &Context, limit: Option<usize>) -> Result<()> {
    let decisions = context.state()?.decisions()?;
    if decisions.is_empty() {
        println!("{}", "No decisions recorded.".dimmed());
        return Ok(());
    }

    let skip = limit.map_or(0, |n| decisions.len().saturating_sub(n));
    for decision in &decisions[skip..] {
        println!(
            "{} {} {}",
            decision.at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            decision.stable_id.to_string()[..8].cyan(),
            decision.reason
        );
    }
    Ok(())
}
