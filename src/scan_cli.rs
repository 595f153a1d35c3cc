//! scan subcommand - report (and optionally delete) unused includes

use analysis::{FileReport, MultiScanReport, ScanConfig, ScanLevel, Workspace};
use clap::Args;
use index::{MemoryIndex, SqliteIndex, SymbolIndex};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args)]
pub struct ScanArgs {
    /// Files to scan
    files: Vec<String>,
    /// Index to query: a `.json` snapshot or a SQLite database
    #[arg(short, long)]
    index: PathBuf,
    /// Scan every file under this folder
    #[arg(short, long)]
    folder: Option<PathBuf>,
    /// Only scan folder paths matching this regex
    #[arg(long = "match")]
    matching: Option<String>,
    /// Skip folder paths matching this regex
    #[arg(long = "exclude")]
    excluding: Option<String>,
    /// completely-unused, all-removable, without-extends, without-contains,
    /// current-file-only (default from INCPRUNE_SCAN_LEVEL)
    #[arg(short, long)]
    level: Option<String>,
    /// Delete the unused include lines
    #[arg(long)]
    delete: bool,
    /// JSON output
    #[arg(long)]
    json: bool,
    /// Only print findings
    #[arg(short, long)]
    silent: bool,
}

pub async fn run(args: ScanArgs) -> anyhow::Result<()> {
    let mut config = ScanConfig::from_env();
    if let Some(name) = &args.level {
        let level = ScanLevel::from_str(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown scan level: {}", name))?;
        config = config.with_scan_level(level);
    }
    let level = config.scan_level;

    let index = open_index(&args.index).await?;
    let workspace = Workspace::new(index, config);

    let report = match &args.folder {
        Some(folder) => {
            let folder = folder.canonicalize()?;
            if !args.silent {
                println!("Scanning folder: {} ({})", folder.display(), level.as_str());
            }
            workspace
                .scan_folder(
                    &folder,
                    args.matching.as_deref(),
                    args.excluding.as_deref(),
                    level,
                )
                .await?
        }
        None => {
            if args.files.is_empty() {
                anyhow::bail!("Nothing to scan: pass files or --folder");
            }
            let files = absolute_paths(&args.files)?;
            workspace.scan_files(&files, level).await
        }
    };

    if args.json {
        print_json(&report)?;
    } else {
        print_text(&report, args.silent);
    }

    if args.delete {
        let mut removed = 0;
        for file_report in report.reports.iter().filter(|r| !r.unused.is_empty()) {
            match workspace.remove_unused(file_report).await {
                Ok(n) => removed += n,
                Err(e) => tracing::error!("Failed to edit {}: {}", file_report.file_path, e),
            }
        }
        if !args.silent {
            println!("Removed {} include line(s)", removed);
        }
    }

    if !report.failures.is_empty() {
        anyhow::bail!("{} file(s) failed to scan", report.failures.len());
    }
    Ok(())
}

async fn open_index(path: &Path) -> anyhow::Result<Arc<dyn SymbolIndex>> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        Ok(Arc::new(MemoryIndex::load(path).await?))
    } else {
        Ok(Arc::new(SqliteIndex::open(path)?))
    }
}

fn absolute_paths(files: &[String]) -> anyhow::Result<Vec<String>> {
    files
        .iter()
        .map(|f| -> anyhow::Result<String> {
            let path = PathBuf::from(f);
            let path = if path.exists() { path.canonicalize()? } else { path };
            Ok(path.to_string_lossy().to_string())
        })
        .collect()
}

fn print_json(report: &MultiScanReport) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct Failure<'a> {
        file_path: &'a str,
        error: String,
    }

    #[derive(serde::Serialize)]
    struct Output<'a> {
        reports: &'a [FileReport],
        failures: Vec<Failure<'a>>,
    }

    let output = Output {
        reports: &report.reports,
        failures: report
            .failures
            .iter()
            .map(|f| Failure {
                file_path: &f.file_path,
                error: f.error.to_string(),
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_text(report: &MultiScanReport, silent: bool) {
    let mut reports: Vec<&FileReport> = report.reports.iter().collect();
    reports.sort_by(|a, b| a.file_path.cmp(&b.file_path));

    for file_report in &reports {
        if !file_report.is_indexed() {
            if !silent {
                println!("{}: no index data", file_report.file_path);
            }
            continue;
        }
        for entry in &file_report.unused {
            println!("{}", entry.warning_text());
        }
    }

    for failure in &report.failures {
        eprintln!("{}: scan failed: {}", failure.file_path, failure.error);
    }

    if !silent {
        let unused = report.unused_entries().len();
        let indexed = reports.iter().filter(|r| r.is_indexed()).count();
        println!(
            "\nFound {} unused include(s) in {} indexed file(s)",
            unused, indexed
        );
    }
}
