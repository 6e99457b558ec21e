//! docsync CLI
//!
//! Runs sync cycles between a remote page directory and a markdown vault,
//! and inspects the sync state they leave behind.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Commands};
use context::Context;
use error::Result;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let context = Context::load(cli.state_dir)?;
    match cli.command {
        Commands::Sync { stores, json } => commands::run_sync(&context.with_stores(&stores), json).await,
        Commands::Watch { stores, interval } => commands::run_watch(&context.with_stores(&stores), interval).await,
        Commands::Status { json } => commands::run_status(&context, json),
        Commands::Conflicts { all } => commands::run_conflicts(&context, all),
        Commands::Resolve { artifact_id, take } => commands::run_resolve(&context, &artifact_id, take),
        Commands::Decisions { limit } => commands::run_decisions(&context, limit),
    }
}

/// Logs go to stderr so command output stays machine readable.
fn init_tracing(verbose: bool) {
    let builder = FmtSubscriber::builder().with_writer(std::io::stderr).with_target(verbose);
    let result = if verbose {
        tracing::subscriber::set_global_default(builder.with_max_level(Level::DEBUG).finish())
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish())
    };
    if let Err(e) = result {
        eprintln!("{}: failed to set up logging: {}", "warning".yellow().bold(), e);
    }
    tracing::debug!("Verbose mode enabled");
}
