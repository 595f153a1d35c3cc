//! import subcommand - JSON snapshot to SQLite

use clap::Args;
use index::{MemoryIndex, SqliteIndex};
use std::path::PathBuf;

#[derive(Args)]
pub struct ImportArgs {
    /// JSON index snapshot
    snapshot: PathBuf,
    /// SQLite database to create or update
    #[arg(short, long)]
    output: PathBuf,
}

pub async fn run(args: ImportArgs) -> anyhow::Result<()> {
    let snapshot = MemoryIndex::load(&args.snapshot).await?.snapshot();
    let units = snapshot.units.len();
    let occurrences = snapshot.occurrences.len();

    let output = args.output.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let db = SqliteIndex::open(&output)?;
        db.import_snapshot(&snapshot)?;
        Ok(())
    })
    .await??;

    println!(
        "Imported {} units and {} occurrences into {}",
        units,
        occurrences,
        args.output.display()
    );
    Ok(())
}
