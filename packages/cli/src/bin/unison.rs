use clap::{Parser, Subcommand};
use colored::*;
use std::process;
use tracing_subscriber::EnvFilter;
use unison_config::constants::RUST_LOG;
use unison_orchestrator::{Orchestrator, OrchestratorConfig};

mod cli;

use cli::run::RunArgs;

#[derive(Parser)]
#[command(name = "unison")]
#[command(about = "Unison CLI - transparent multi-agent task orchestration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one task in a fresh session, streaming every agent action
    Run(RunArgs),
    /// Restore a checkpoint into a session
    Restore {
        /// Checkpoint ID to restore
        checkpoint_id: String,
        /// Target session (default: a new session)
        #[arg(long)]
        into: Option<String>,
        /// Owner of the new session when no target is given
        #[arg(long, default_value = "local")]
        user: String,
    },
    /// List checkpoints taken from a session
    Checkpoints {
        /// Session ID whose checkpoints to list
        session_id: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(RUST_LOG).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    if let Err(e) = handle_command(cli.command).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn handle_command(command: Commands) -> anyhow::Result<()> {
    let config = OrchestratorConfig::from_env()?;
    let orchestrator = Orchestrator::new(config).await?;

    match command {
        Commands::Run(args) => cli::run::run_task(&orchestrator, args).await,
        Commands::Restore {
            checkpoint_id,
            into,
            user,
        } => cli::checkpoints::restore(&orchestrator, &checkpoint_id, into, &user).await,
        Commands::Checkpoints { session_id } => {
            cli::checkpoints::list(&orchestrator, &session_id).await
        }
    }
}
