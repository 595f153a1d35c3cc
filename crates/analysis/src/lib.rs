//! analysis - unused include detection
//!
//! Rebuilds a file's include tree from the flat include list of its
//! compilation unit, marks every include path that leads to a symbol the
//! file uses, and reports the root includes left unmarked.

mod analyzer;
mod config;
mod entry;
mod level;
mod pattern;
mod remover;
mod tree;
mod types;
mod workspace;

#[cfg(test)]
mod test_support;

pub use analyzer::IncludeAnalyzer;
pub use config::ScanConfig;
pub use entry::IncludeEntry;
pub use level::ScanLevel;
pub use pattern::{TextPattern, SELECTOR_PATTERN};
pub use remover::IncludeRemover;
pub use tree::{IncludeNode, IncludeTree, NodeId};
pub use types::{AnalysisError, FileReport, MultiScanReport, Result, ScanFailure};
pub use workspace::Workspace;
