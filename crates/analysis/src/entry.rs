use index::UnitInclude;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// One `#include` / `#import` directive: `source_path` includes
/// `target_path` on `line` (1-based)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludeEntry {
    pub source_path: String,
    pub target_path: String,
    pub line: u32,
}

impl IncludeEntry {
    pub fn new(source_path: impl Into<String>, target_path: impl Into<String>, line: u32) -> Self {
        Self {
            source_path: source_path.into(),
            target_path: target_path.into(),
            line,
        }
    }

    pub fn source_filename(&self) -> &str {
        file_name(&self.source_path)
    }

    pub fn target_filename(&self) -> &str {
        file_name(&self.target_path)
    }

    /// Compiler-style warning line
    pub fn warning_text(&self) -> String {
        format!(
            "{}:{}: warning: The import for \"{}\" could be removed",
            self.source_path,
            self.line,
            self.target_filename()
        )
    }

    /// Compiler-style error line
    pub fn error_text(&self) -> String {
        format!(
            "{}:{}: error: The import for \"{}\" could be removed",
            self.source_path,
            self.line,
            self.target_filename()
        )
    }
}

impl From<UnitInclude> for IncludeEntry {
    fn from(include: UnitInclude) -> Self {
        Self {
            source_path: include.source_path,
            target_path: include.target_path,
            line: include.line,
        }
    }
}

impl fmt::Display for IncludeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} -> {}", self.source_path, self.line, self.target_path)
    }
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}
