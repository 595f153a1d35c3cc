//! Deletes unused include lines from a source file

use crate::entry::IncludeEntry;
use crate::types::Result;
use std::path::PathBuf;

pub struct IncludeRemover {
    path: PathBuf,
    entries: Vec<IncludeEntry>,
}

impl IncludeRemover {
    pub fn new(path: impl Into<PathBuf>, entries: Vec<IncludeEntry>) -> Self {
        Self {
            path: path.into(),
            entries,
        }
    }

    /// Remove every entry's line and write the file back. A line is only
    /// removed when it exists and still names the entry's target file.
    /// Returns the number of removed lines.
    pub async fn execute(mut self) -> Result<usize> {
        if self.entries.is_empty() {
            return Ok(0);
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        // Split on '\n' only so '\r' and the final newline survive untouched
        let mut lines: Vec<&str> = content.split('\n').collect();

        // Bottom-up so earlier line numbers stay valid
        self.entries.sort_by(|a, b| b.line.cmp(&a.line));
        self.entries.dedup_by_key(|e| e.line);

        let mut removed = 0;
        for entry in &self.entries {
            let line = entry.line as usize;
            if line == 0 || line > lines.len() {
                tracing::warn!(
                    "{}: line {} out of range, skipping {}",
                    self.path.display(),
                    entry.line,
                    entry.target_filename()
                );
                continue;
            }
            if !lines[line - 1].contains(entry.target_filename()) {
                tracing::warn!(
                    "{}:{} does not mention {}, leaving it",
                    self.path.display(),
                    entry.line,
                    entry.target_filename()
                );
                continue;
            }
            lines.remove(line - 1);
            removed += 1;
        }

        if removed == 0 {
            return Ok(0);
        }

        tokio::fs::write(&self.path, lines.join("\n")).await?;

        tracing::info!("Removed {} include(s) from {}", removed, self.path.display());
        Ok(removed)
    }
}
