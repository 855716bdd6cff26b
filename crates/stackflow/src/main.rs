mod commands;

use clap::{Parser, Subcommand};
use stackflow_config::EngineConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stackflow")]
#[command(about = "Declarative infrastructure provisioning", long_about = None)]
#[command(version)]
struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a definition and print the provisioning order
    Validate {
        /// Definition document (JSON or YAML)
        file: PathBuf,
    },
    /// Dry-run a definition against an in-memory backend
    Plan {
        /// Definition document (JSON or YAML)
        file: PathBuf,
        /// Write a checkpoint to the state directory
        #[arg(long)]
        save: bool,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays readable; RUST_LOG overrides --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = EngineConfig::load_or_default()?;

    match cli.command {
        Commands::Validate { file } => commands::validate::handle(&file),
        Commands::Plan { file, save } => commands::plan::handle(&file, save, &config).await,
        Commands::Config => commands::config::handle(&config),
    }
}
