//! Lumis CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "lumis")]
#[command(about = "Code-graph ingestion, differential sync and legacy risk analysis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Repository root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Project id (defaults to the root directory name)
    #[arg(short, long, global = true)]
    project: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize the repository into the graph store
    Sync {
        /// Only sync these files (relative to the root); skips the orphan sweep
        #[arg(long, num_args = 1..)]
        files: Vec<String>,

        /// Sync even if the current revision was already synced
        #[arg(long)]
        force: bool,
    },
    /// Recompute legacy conflicts and risk scores
    Risk,
    /// List stored risk alerts
    Alerts,
    /// List stored units, riskiest first
    Units {
        /// Maximum number of units to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show the status of the last sync run
    Status,
    /// Clear the cache
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("lumis={}", log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!("Lumis v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Repository root: {}", cli.root.display());

    let project = commands::project_id(&cli.root, cli.project.as_deref());
    match cli.command {
        Commands::Sync { files, force } => commands::sync(cli.root, project, files, force).await,
        Commands::Risk => commands::risk(cli.root, project).await,
        Commands::Alerts => commands::alerts(cli.root, project),
        Commands::Units { limit } => commands::units(cli.root, project, limit),
        Commands::Status => commands::status(cli.root, project),
        Commands::Clear => commands::clear(cli.root),
        Commands::Version => {
            println!("Lumis v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
