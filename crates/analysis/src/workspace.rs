//! Scan orchestration over a shared index

use crate::analyzer::IncludeAnalyzer;
use crate::config::ScanConfig;
use crate::level::ScanLevel;
use crate::pattern::TextPattern;
use crate::remover::IncludeRemover;
use crate::types::{AnalysisError, FileReport, MultiScanReport, Result, ScanFailure};
use index::SymbolIndex;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Entry point for scanning files against one index.
///
/// The index is only read; every file gets its own analyzer and tree.
pub struct Workspace {
    index: Arc<dyn SymbolIndex>,
    config: ScanConfig,
    patterns: Arc<Vec<TextPattern>>,
}

impl Workspace {
    pub fn new(index: Arc<dyn SymbolIndex>, mut config: ScanConfig) -> Self {
        // A zero-permit semaphore would park every worker
        config.max_concurrency = config.max_concurrency.max(1);
        let patterns = Arc::new(TextPattern::compile_all(&config.extra_patterns));
        Self {
            index,
            config,
            patterns,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Unused root includes of one file
    pub async fn scan_file(&self, file_path: &str, level: ScanLevel) -> Result<FileReport> {
        IncludeAnalyzer::new(self.index.as_ref(), file_path, level, &self.patterns)
            .find_unused_includes()
            .await
    }

    /// Scan files concurrently. A failing file lands in `failures` and
    /// does not stop the others.
    pub async fn scan_files(&self, paths: &[String], level: ScanLevel) -> MultiScanReport {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut tasks = JoinSet::new();

        for path in paths {
            let index = Arc::clone(&self.index);
            let patterns = Arc::clone(&self.patterns);
            let semaphore = Arc::clone(&semaphore);
            let path = path.clone();

            tasks.spawn(async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => {
                        IncludeAnalyzer::new(index.as_ref(), &path, level, &patterns)
                            .find_unused_includes()
                            .await
                    }
                    Err(e) => Err(AnalysisError::Join(e.to_string())),
                };
                (path, result)
            });
        }

        let mut report = MultiScanReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(file_report))) => report.reports.push(file_report),
                Ok((file_path, Err(error))) => {
                    tracing::error!("Failed to scan {}: {}", file_path, error);
                    report.failures.push(ScanFailure { file_path, error });
                }
                Err(e) => {
                    tracing::error!("Scan task failed: {}", e);
                    report.failures.push(ScanFailure {
                        file_path: String::new(),
                        error: AnalysisError::Join(e.to_string()),
                    });
                }
            }
        }

        tracing::debug!(
            "Scanned {} files: {} reports, {} failures",
            paths.len(),
            report.reports.len(),
            report.failures.len()
        );
        report
    }

    /// Scan every non-hidden regular file under `folder`. `excluding` wins
    /// over `matching` when both match a path.
    pub async fn scan_folder(
        &self,
        folder: &Path,
        matching: Option<&str>,
        excluding: Option<&str>,
        level: ScanLevel,
    ) -> Result<MultiScanReport> {
        let start = Instant::now();
        let matching = compile_filter(matching)?;
        let excluding = compile_filter(excluding)?;

        let files = list_files(folder).await?;
        let paths: Vec<String> = files
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .filter(|p| matching.as_ref().map_or(true, |re| re.is_match(p)))
            .filter(|p| !excluding.as_ref().is_some_and(|re| re.is_match(p)))
            .collect();

        tracing::info!(
            "Scanning {} of {} files under {}",
            paths.len(),
            files.len(),
            folder.display()
        );
        let report = self.scan_files(&paths, level).await;
        tracing::info!(
            "Scanned {} in {:.2}s",
            folder.display(),
            start.elapsed().as_secs_f64()
        );
        Ok(report)
    }

    /// Delete the report's unused include lines from its file
    pub async fn remove_unused(&self, report: &FileReport) -> Result<usize> {
        IncludeRemover::new(&report.file_path, report.unused.clone())
            .execute()
            .await
    }
}

fn compile_filter(pattern: Option<&str>) -> Result<Option<Regex>> {
    pattern
        .map(|p| Regex::new(p).map_err(|e| AnalysisError::Pattern(format!("{}: {}", p, e))))
        .transpose()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Regular files under `folder`. Only an unreadable `folder` is an error;
/// anything failing below it is logged and skipped.
async fn list_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = Vec::new();

    let mut root = tokio::fs::read_dir(folder).await?;
    collect_entries(&mut root, folder, &mut files, &mut pending).await;

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Skipping unreadable directory {}: {}", dir.display(), e);
                continue;
            }
        };
        collect_entries(&mut entries, &dir, &mut files, &mut pending).await;
    }

    files.sort();
    Ok(files)
}

async fn collect_entries(
    entries: &mut tokio::fs::ReadDir,
    dir: &Path,
    files: &mut Vec<PathBuf>,
    pending: &mut Vec<PathBuf>,
) {
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Stopped listing {}: {}", dir.display(), e);
                break;
            }
        };
        let path = entry.path();
        if is_hidden(&path) {
            continue;
        }
        let file_type = match entry.file_type().await {
            Ok(file_type) => file_type,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if file_type.is_dir() {
            pending.push(path);
        } else if file_type.is_file() {
            files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use async_trait::async_trait;
    use index::{IndexError, MemoryIndex, Symbol, SymbolKind, SymbolOccurrence, SymbolRoles};

    /// Fails every query about one file
    struct FailingIndex {
        inner: MemoryIndex,
        broken_path: String,
    }

    #[async_trait]
    impl SymbolIndex for FailingIndex {
        async fn units_containing(&self, path: &str) -> index::Result<Vec<String>> {
            if path == self.broken_path {
                return Err(IndexError::Query("store unavailable".to_string()));
            }
            self.inner.units_containing(path).await
        }

        async fn unit_modification_time(&self, unit: &str) -> index::Result<Option<i64>> {
            self.inner.unit_modification_time(unit).await
        }

        async fn includes_of_unit(&self, unit: &str) -> index::Result<Vec<index::UnitInclude>> {
            self.inner.includes_of_unit(unit).await
        }

        async fn symbols_in_file(&self, path: &str) -> index::Result<Vec<Symbol>> {
            self.inner.symbols_in_file(path).await
        }

        async fn occurrences(
            &self,
            usr: &str,
            roles: SymbolRoles,
        ) -> index::Result<Vec<SymbolOccurrence>> {
            self.inner.occurrences(usr, roles).await
        }

        async fn related_occurrences(
            &self,
            usr: &str,
            roles: SymbolRoles,
        ) -> index::Result<Vec<SymbolOccurrence>> {
            self.inner.related_occurrences(usr, roles).await
        }

        async fn canonical_occurrences(&self, name: &str) -> index::Result<Vec<SymbolOccurrence>> {
            self.inner.canonical_occurrences(name).await
        }
    }

    /// `n` files, each including A.h (used) and B.h (unused)
    fn many_files_index(n: usize) -> (MemoryIndex, Vec<String>) {
        let mut index = MemoryIndex::new();
        declare(&mut index, "c:Widget", "Widget", SymbolKind::Class, A_H);
        let mut paths = Vec::new();
        for i in 0..n {
            let path = format!("/proj/File{}.m", i);
            index.add_unit(unit(
                &format!("File{}.o", i),
                &path,
                Some(1),
                &[(path.as_str(), A_H, 1), (path.as_str(), B_H, 2)],
            ));
            reference(&mut index, "c:Widget", "Widget", SymbolKind::Class, &path);
            paths.push(path);
        }
        (index, paths)
    }

    fn workspace(index: impl SymbolIndex + 'static) -> Workspace {
        let config = ScanConfig::default().with_max_concurrency(3);
        Workspace::new(Arc::new(index), config)
    }

    #[tokio::test]
    async fn test_scan_file() {
        let (index, paths) = many_files_index(1);
        let ws = workspace(index);

        let report = ws.scan_file(&paths[0], ScanLevel::AllRemovable).await.unwrap();
        assert_eq!(report.unit.as_deref(), Some("File0.o"));
        assert_eq!(report.unused.len(), 1);
        assert_eq!(report.unused[0].target_path, B_H);
    }

    #[tokio::test]
    async fn test_scan_files_concurrently() {
        let (index, paths) = many_files_index(12);
        let ws = workspace(index);

        let report = ws.scan_files(&paths, ScanLevel::AllRemovable).await;
        assert!(report.failures.is_empty());
        assert_eq!(report.reports.len(), 12);

        let mut sources: Vec<String> = report
            .unused_entries()
            .into_iter()
            .map(|e| {
                assert_eq!(e.target_path, B_H);
                e.source_path
            })
            .collect();
        sources.sort();
        let mut expected = paths.clone();
        expected.sort();
        assert_eq!(sources, expected);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let (inner, mut paths) = many_files_index(4);
        let broken = paths[2].clone();
        paths.push("/proj/Unknown.m".to_string());
        let ws = workspace(FailingIndex {
            inner,
            broken_path: broken.clone(),
        });

        let report = ws.scan_files(&paths, ScanLevel::AllRemovable).await;
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file_path, broken);
        assert!(matches!(report.failures[0].error, AnalysisError::Index(_)));
        assert_eq!(report.reports.len(), 4);
        assert_eq!(report.not_indexed().collect::<Vec<_>>(), vec!["/proj/Unknown.m"]);

        let single = ws.scan_file(&broken, ScanLevel::AllRemovable).await;
        assert!(single.is_err());
    }

    #[tokio::test]
    async fn test_scan_folder_filters() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        for name in ["One.m", "sub/Two.m", "sub/Two.h", "Skip.m", ".hidden.m", ".git/HEAD.m"] {
            std::fs::write(root.join(name), "").unwrap();
        }

        let mut index = MemoryIndex::new();
        let mut expected = Vec::new();
        for name in ["One.m", "sub/Two.m", "Skip.m", ".hidden.m", ".git/HEAD.m"] {
            let path = root.join(name).to_string_lossy().to_string();
            index.add_unit(unit(name, &path, Some(1), &[(path.as_str(), B_H, 1)]));
            if name == "One.m" || name == "sub/Two.m" {
                expected.push(path);
            }
        }
        expected.sort();
        let ws = workspace(index);

        let report = ws
            .scan_folder(root, Some(r"\.m$"), Some("Skip"), ScanLevel::AllRemovable)
            .await
            .unwrap();
        let mut scanned: Vec<String> =
            report.reports.iter().map(|r| r.file_path.clone()).collect();
        scanned.sort();
        assert_eq!(scanned, expected);
        assert_eq!(report.unused_entries().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_scans() {
        let (index, paths) = many_files_index(3);
        let config = ScanConfig {
            max_concurrency: 0,
            ..ScanConfig::default()
        };
        let ws = Workspace::new(Arc::new(index), config);
        assert_eq!(ws.config().max_concurrency, 1);

        let report = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            ws.scan_files(&paths, ScanLevel::AllRemovable),
        )
        .await
        .expect("scan stalled");
        assert_eq!(report.reports.len(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scan_folder_skips_unreadable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let locked = root.join("locked");
        std::fs::create_dir_all(&locked).unwrap();
        std::fs::write(locked.join("Hidden.m"), "").unwrap();
        std::fs::write(root.join("Open.m"), "").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let ws = workspace(MemoryIndex::new());
        let result = ws
            .scan_folder(root, Some(r"\.m$"), None, ScanLevel::AllRemovable)
            .await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        let report = result.unwrap();
        let open = root.join("Open.m").to_string_lossy().to_string();
        assert!(report.reports.iter().any(|r| r.file_path == open));
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_scan_folder_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(MemoryIndex::new());
        let result = ws
            .scan_folder(&dir.path().join("absent"), None, None, ScanLevel::AllRemovable)
            .await;
        assert!(matches!(result, Err(AnalysisError::Io(_))));
    }

    #[tokio::test]
    async fn test_scan_folder_rejects_invalid_filter() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(MemoryIndex::new());
        let result = ws
            .scan_folder(dir.path(), Some("(unclosed"), None, ScanLevel::AllRemovable)
            .await;
        assert!(matches!(result, Err(AnalysisError::Pattern(_))));
    }

    #[tokio::test]
    async fn test_remove_unused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("View.m").to_string_lossy().to_string();
        std::fs::write(&path, "#import \"A.h\"\n#import \"B.h\"\n\n@implementation View\n@end\n")
            .unwrap();

        let mut index = MemoryIndex::new();
        declare(&mut index, "c:Widget", "Widget", SymbolKind::Class, A_H);
        reference(&mut index, "c:Widget", "Widget", SymbolKind::Class, &path);
        index.add_unit(unit(
            "View.o",
            &path,
            Some(1),
            &[(path.as_str(), A_H, 1), (path.as_str(), B_H, 2)],
        ));
        let ws = workspace(index);

        let report = ws.scan_file(&path, ScanLevel::AllRemovable).await.unwrap();
        assert_eq!(ws.remove_unused(&report).await.unwrap(), 1);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "#import \"A.h\"\n\n@implementation View\n@end\n");
    }
}
