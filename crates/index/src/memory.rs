//! In-memory index, loaded from a JSON snapshot or assembled in code

use crate::provider::{IndexError, Result, SymbolIndex};
use crate::types::{Symbol, SymbolOccurrence, SymbolRoles, UnitInclude, UnitRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Serialized form of a whole index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSnapshot {
    #[serde(default)]
    pub units: Vec<UnitRecord>,
    #[serde(default)]
    pub occurrences: Vec<SymbolOccurrence>,
}

#[derive(Debug, Default)]
pub struct MemoryIndex {
    units: Vec<UnitRecord>,
    occurrences: Vec<SymbolOccurrence>,
    /// usr -> positions in `occurrences`
    by_usr: HashMap<String, Vec<usize>>,
    /// path -> positions in `occurrences`
    by_path: HashMap<String, Vec<usize>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: IndexSnapshot) -> Self {
        let mut index = Self::new();
        for unit in snapshot.units {
            index.add_unit(unit);
        }
        for occurrence in snapshot.occurrences {
            index.add_occurrence(occurrence);
        }
        index
    }

    /// Load a JSON snapshot from disk
    pub async fn load(path: &Path) -> Result<Self> {
        let data = tokio::fs::read_to_string(path).await?;
        let snapshot: IndexSnapshot = serde_json::from_str(&data)?;
        tracing::debug!(
            "Loaded snapshot {}: {} units, {} occurrences",
            path.display(),
            snapshot.units.len(),
            snapshot.occurrences.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn add_unit(&mut self, unit: UnitRecord) {
        self.units.push(unit);
    }

    pub fn add_occurrence(&mut self, occurrence: SymbolOccurrence) {
        let pos = self.occurrences.len();
        self.by_usr
            .entry(occurrence.symbol.usr.clone())
            .or_default()
            .push(pos);
        self.by_path
            .entry(occurrence.location.path.clone())
            .or_default()
            .push(pos);
        self.occurrences.push(occurrence);
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            units: self.units.clone(),
            occurrences: self.occurrences.clone(),
        }
    }

    fn unit(&self, name: &str) -> Result<&UnitRecord> {
        self.units
            .iter()
            .find(|u| u.name == name)
            .ok_or_else(|| IndexError::UnknownUnit(name.to_string()))
    }
}

#[async_trait]
impl SymbolIndex for MemoryIndex {
    async fn units_containing(&self, path: &str) -> Result<Vec<String>> {
        Ok(self
            .units
            .iter()
            .filter(|u| u.references_file(path))
            .map(|u| u.name.clone())
            .collect())
    }

    async fn unit_modification_time(&self, unit: &str) -> Result<Option<i64>> {
        Ok(self.unit(unit)?.modified_at)
    }

    async fn includes_of_unit(&self, unit: &str) -> Result<Vec<UnitInclude>> {
        Ok(self.unit(unit)?.includes.clone())
    }

    async fn symbols_in_file(&self, path: &str) -> Result<Vec<Symbol>> {
        let mut seen = HashSet::new();
        let mut symbols = Vec::new();
        for &pos in self.by_path.get(path).into_iter().flatten() {
            let symbol = &self.occurrences[pos].symbol;
            if seen.insert(symbol.usr.as_str()) {
                symbols.push(symbol.clone());
            }
        }
        Ok(symbols)
    }

    async fn occurrences(&self, usr: &str, roles: SymbolRoles) -> Result<Vec<SymbolOccurrence>> {
        Ok(self
            .by_usr
            .get(usr)
            .into_iter()
            .flatten()
            .map(|&pos| &self.occurrences[pos])
            .filter(|o| o.roles.intersects(roles))
            .cloned()
            .collect())
    }

    async fn related_occurrences(
        &self,
        usr: &str,
        roles: SymbolRoles,
    ) -> Result<Vec<SymbolOccurrence>> {
        Ok(self
            .occurrences
            .iter()
            .filter(|o| o.is_related_to(usr, roles))
            .cloned()
            .collect())
    }

    async fn canonical_occurrences(&self, name: &str) -> Result<Vec<SymbolOccurrence>> {
        Ok(self
            .occurrences
            .iter()
            .filter(|o| o.symbol.name == name && o.roles.contains(SymbolRoles::CANONICAL))
            .cloned()
            .collect())
    }
}
