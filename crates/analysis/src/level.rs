use serde::{Deserialize, Serialize};

/// How aggressively includes are reported as removable.
///
/// Variants are ordered from safest to most aggressive; each step drops a
/// check instead of adding one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanLevel {
    /// Unused only when nothing reachable through it is referenced, via
    /// any include path
    CompletelyUnused,
    /// Unused when removing it should not break compilation
    AllRemovable,
    /// Extension occurrences no longer count
    WithoutExtends,
    /// Members of referenced declarations are no longer followed
    WithoutContains,
    /// Only symbols occurring in the file itself
    CurrentFileOnly,
}

impl ScanLevel {
    pub const ALL: [ScanLevel; 5] = [
        Self::CompletelyUnused,
        Self::AllRemovable,
        Self::WithoutExtends,
        Self::WithoutContains,
        Self::CurrentFileOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompletelyUnused => "completely-unused",
            Self::AllRemovable => "all-removable",
            Self::WithoutExtends => "without-extends",
            Self::WithoutContains => "without-contains",
            Self::CurrentFileOnly => "current-file-only",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == s)
    }

    /// Extension occurrences are validated against a base relation
    pub fn checks_extends(&self) -> bool {
        *self < Self::WithoutExtends
    }

    /// Contained members of declarations are followed
    pub fn checks_contains(&self) -> bool {
        *self < Self::WithoutContains
    }

    /// Every diamond path to a used header is kept
    pub fn marks_all_roots(&self) -> bool {
        *self == Self::CompletelyUnused
    }
}

impl Default for ScanLevel {
    fn default() -> Self {
        Self::AllRemovable
    }
}
