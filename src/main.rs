// ABOUTME: Entry point for the chanlog binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and runs the console host or an inspection command.

mod config;
mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chanlog_core::{ChatLogger, LogCommand, SessionManager};
use chanlog_store::{StorageManager, spawn_journal_persister};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;

use crate::config::ChanlogConfig;
use crate::console::ConsoleHost;

#[derive(Debug, Parser)]
#[command(name = "chanlog", version, about = "Operator-controlled per-channel chat logs")]
struct Cli {
    /// Directory for log artifacts (overrides CHANLOG_LOGDIR)
    #[arg(long, global = true)]
    logdir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read `<channel> <user> <text>` lines from stdin; `!logStart` and friends control logging
    Run,
    /// Print the last issued log number for every channel
    Sequences,
    /// Replay the session event journal
    History,
    /// List log artifacts in the log directory
    Artifacts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("chanlog=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ChanlogConfig::from_env(cli.logdir).context("invalid configuration")?;
    let storage = StorageManager::new(config.logdir.clone())
        .context("failed to prepare log directory")?
        .with_db_path(config.db_path.clone())
        .with_journal_path(config.journal_path.clone());

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&storage).await,
        Command::Sequences => {
            let store = storage.open_sequence_store()?;
            for (channel, sequence) in store.list()? {
                println!("{}\t{}", channel, sequence);
            }
            Ok(())
        }
        Command::History => {
            for event in storage.replay_journal()? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    event.timestamp.to_rfc3339(),
                    event.kind.name(),
                    event.payload.source,
                    event.payload.requestor,
                    event.payload.id
                );
            }
            Ok(())
        }
        Command::Artifacts => {
            for artifact in storage.list_artifacts()? {
                println!("{}\t{}\t{}", artifact.log_id, artifact.len, artifact.path.display());
            }
            Ok(())
        }
    }
}

async fn run(storage: &StorageManager) -> anyhow::Result<()> {
    if let Some(report) = storage.repair_journal().context("failed to repair journal")? {
        tracing::debug!(events = report.kept, "journal checked");
    }

    let store = storage
        .open_sequence_store()
        .with_context(|| format!("failed to open {}", storage.db_path().display()))?;
    let manager = Arc::new(SessionManager::new(Arc::new(store), Arc::new(storage.artifacts())));
    let persister = spawn_journal_persister(manager.subscribe(), storage.journal_path().to_path_buf());

    let logger = Arc::new(ChatLogger::new(manager));
    let host = ConsoleHost::attach(Arc::clone(&logger)).await?;

    tracing::info!(
        logdir = %storage.logdir().display(),
        commands = ?LogCommand::ALL.map(|c| c.name()),
        "chanlog listening on stdin"
    );

    let result = host.run(BufReader::new(tokio::io::stdin())).await;
    host.detach().await;

    // Dropping the last manager handle closes the event stream.
    drop(logger);
    if let Err(e) = persister.await {
        tracing::error!(error = %e, "journal persister panicked");
    }

    result.context("failed to read stdin")?;
    tracing::info!("chanlog shutting down");
    Ok(())
}
