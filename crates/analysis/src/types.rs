//! Error and report types

use crate::entry::IncludeEntry;
use index::IndexError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid pattern: {0}")]
    Pattern(String),
    #[error("Task error: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Outcome of scanning one file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file_path: String,
    /// Unit the include tree was built from; `None` means the index has no
    /// data for the file and `unused` is empty
    pub unit: Option<String>,
    pub unused: Vec<IncludeEntry>,
}

impl FileReport {
    pub fn not_indexed(file_path: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            unit: None,
            unused: Vec::new(),
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.unit.is_some()
    }
}

/// A file whose scan failed, kept apart from the others
#[derive(Debug)]
pub struct ScanFailure {
    pub file_path: String,
    pub error: AnalysisError,
}

/// Outcome of a multi-file scan. Report order is unspecified.
#[derive(Debug, Default)]
pub struct MultiScanReport {
    pub reports: Vec<FileReport>,
    pub failures: Vec<ScanFailure>,
}

impl MultiScanReport {
    /// Unused entries of every analyzed file
    pub fn unused_entries(&self) -> Vec<IncludeEntry> {
        self.reports
            .iter()
            .flat_map(|r| r.unused.iter().cloned())
            .collect()
    }

    /// Files the index knows nothing about
    pub fn not_indexed(&self) -> impl Iterator<Item = &str> {
        self.reports
            .iter()
            .filter(|r| !r.is_indexed())
            .map(|r| r.file_path.as_str())
    }
}
