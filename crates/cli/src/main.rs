//! LogLens CLI: the main entry point.
//!
//! Commands:
//! - `init`: Write a default config and prompt templates
//! - `scan`: Run one scan cycle over container logs
//! - `knowledge`: Inspect, prune or summarize stored analyses
//! - `doctor`: Diagnose configuration and connectivity

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod source;
mod state;

#[derive(Parser)]
#[command(
    name = "loglens",
    about = "LogLens — LLM-assisted anomaly reports for container logs",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config.toml (default: ~/.loglens/config.toml)
    #[arg(short, long, global = true, env = "LOGLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file and prompt templates
    Init,

    /// Analyze new log lines for each container
    Scan {
        /// Only scan these containers (repeatable). Default: every known container.
        #[arg(short = 'n', long = "container")]
        containers: Vec<String>,

        /// Ignore stored positions and read lines newer than this RFC 3339 time
        #[arg(long)]
        since: Option<String>,
    },

    /// Manage stored analyses
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },

    /// Diagnose system health
    Doctor,
}

#[derive(Subcommand)]
enum KnowledgeAction {
    /// List stored analyses
    List {
        /// Only show this container
        #[arg(short = 'n', long)]
        container: Option<String>,
    },

    /// Drop entries older than the retention window
    Prune,

    /// Print the cross-container running summary
    Rollup,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Init => commands::init::run(config).await?,
        Commands::Scan { containers, since } => {
            commands::scan::run(config, containers, since).await?
        }
        Commands::Knowledge { action } => match action {
            KnowledgeAction::List { container } => {
                commands::knowledge::list(config, container).await?
            }
            KnowledgeAction::Prune => commands::knowledge::prune(config).await?,
            KnowledgeAction::Rollup => commands::knowledge::rollup(config).await?,
        },
        Commands::Doctor => commands::doctor::run(config).await?,
    }

    Ok(())
}
