//! SGC CLI - Cemetery records from the command line
//!
//! Every change is applied to the local store first and published to the
//! remote when it is reachable; `sgc sync` replays whatever is still queued.

mod cli;
mod commands;
mod config_profiles;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::{open_engine, Context};
use crate::commands::config::run_config;
use crate::commands::messages::{run_logs, run_message};
use crate::commands::queue::run_queue;
use crate::commands::records::{run_cemetery, run_employee, run_grave};
use crate::commands::sync::{format_reconcile_lines, run_status, run_sync, run_watch};
use crate::commands::users::run_user;
use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "sgc=info,sgc_core=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = Context {
        db_path: cli.db_path,
        profile: cli.profile,
        offline: cli.offline,
        user: cli.user,
    };

    if let Commands::Config { command } = cli.command {
        return run_config(command, context.profile.as_deref());
    }

    let engine = open_engine(&context)?;
    if needs_startup_sync(&cli.command) && engine.has_remote() && !context.offline {
        let report = engine.reconcile().await;
        if report.ran() && !report.drain.is_clean() {
            for line in format_reconcile_lines(&report) {
                tracing::info!("{line}");
            }
        }
    }

    match cli.command {
        Commands::Status { json } => run_status(&engine, json).await,
        Commands::Sync { json } => run_sync(&engine, json).await,
        Commands::Watch => run_watch(&engine).await,
        Commands::Queue { command } => run_queue(&engine, command),
        Commands::Grave { command } => run_grave(&engine, &context, command).await,
        Commands::Cemetery { command } => run_cemetery(&engine, &context, command).await,
        Commands::Employee { command } => run_employee(&engine, command).await,
        Commands::User { command } => run_user(&engine, &context, command).await,
        Commands::Message { command } => run_message(&engine, &context, command).await,
        Commands::Logs { limit, json } => run_logs(&engine, limit, json).await,
        Commands::Config { .. } => Ok(()),
    }
}

/// Commands that bring local data up to date before running.
///
/// `sync` and `watch` reconcile on their own; queue inspection must show
/// the queue as it is.
pub const fn needs_startup_sync(command: &Commands) -> bool {
    !matches!(
        command,
        Commands::Sync { .. } | Commands::Watch | Commands::Queue { .. } | Commands::Config { .. }
    )
}
