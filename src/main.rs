//! incprune - unused include finder for indexed C-family projects

mod import_cli;
mod scan_cli;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "incprune")]
#[command(about = "Find and remove unused includes using a compiler symbol index", version)]
struct Cli {
    /// Debug logging, ignoring RUST_LOG
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan files for unused includes
    Scan(scan_cli::ScanArgs),
    /// Import a JSON index snapshot into a SQLite index
    Import(import_cli::ImportArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scan(args) => scan_cli::run(args).await?,
        Commands::Import(args) => import_cli::run(args).await?,
    }

    Ok(())
}
