//! `ribit` -- CLI binary for the ribit Matrix agent.
//!
//! Provides the following subcommands:
//!
//! - `ribit gateway` -- Connect to the homeserver and run the agent.
//! - `ribit status` -- Show configuration status and diagnostics.

use clap::{Parser, Subcommand};

mod commands;
mod oracle;

/// ribit Matrix agent CLI.
#[derive(Parser)]
#[command(name = "ribit", about = "ribit Matrix agent CLI", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Start the agent (Matrix sync loop + dispatcher).
    Gateway(commands::gateway::GatewayArgs),

    /// Show configuration status.
    Status(commands::status::StatusArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Gateway(args) => commands::gateway::run(args).await?,
        Commands::Status(args) => commands::status::run(args)?,
    }

    Ok(())
}
