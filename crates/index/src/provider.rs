use crate::types::{Symbol, SymbolOccurrence, SymbolRoles, UnitInclude};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Unknown unit: {0}")]
    UnknownUnit(String),
    #[error("Query error: {0}")]
    Query(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Read-only view of a compiler symbol index.
///
/// Implementations must tolerate concurrent queries from several scan
/// workers; nothing here mutates the index.
#[async_trait]
pub trait SymbolIndex: Send + Sync {
    /// Names of every unit that references `path`
    async fn units_containing(&self, path: &str) -> Result<Vec<String>>;

    /// Last (re)index time of a unit, in unix milliseconds
    async fn unit_modification_time(&self, unit: &str) -> Result<Option<i64>>;

    /// Flat include list of a unit, in the order the indexer recorded it
    async fn includes_of_unit(&self, unit: &str) -> Result<Vec<UnitInclude>>;

    /// Every symbol with an occurrence in `path`
    async fn symbols_in_file(&self, path: &str) -> Result<Vec<Symbol>>;

    /// Occurrences of `usr` carrying any of `roles`
    async fn occurrences(&self, usr: &str, roles: SymbolRoles) -> Result<Vec<SymbolOccurrence>>;

    /// Occurrences holding a relation to `usr` with any of `roles`
    async fn related_occurrences(
        &self,
        usr: &str,
        roles: SymbolRoles,
    ) -> Result<Vec<SymbolOccurrence>>;

    /// Canonical occurrences of symbols named `name`
    async fn canonical_occurrences(&self, name: &str) -> Result<Vec<SymbolOccurrence>>;
}
