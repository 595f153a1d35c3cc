//! index - compiler symbol index access
//!
//! Read-only queries over compilation units, include edges, symbols and
//! occurrences, backed by an in-memory snapshot or a SQLite database.

mod memory;
mod provider;
mod sqlite;
mod types;

pub use memory::{IndexSnapshot, MemoryIndex};
pub use provider::{IndexError, Result, SymbolIndex};
pub use sqlite::SqliteIndex;
pub use types::{
    Symbol, SymbolKind, SymbolLocation, SymbolOccurrence, SymbolRelation, SymbolRoles,
    UnitInclude, UnitRecord,
};
