use crate::entry::IncludeEntry;
use crate::level::ScanLevel;
use crate::pattern::TextPattern;
use crate::tree::IncludeTree;
use crate::types::{FileReport, Result};
use index::{SymbolIndex, SymbolOccurrence, SymbolRoles};
use std::collections::HashSet;

/// Finds the removable includes of one file.
///
/// Built per file and consumed by `find_unused_includes`; the caches only
/// bound repeated work inside that one pass.
pub struct IncludeAnalyzer<'a, I: SymbolIndex + ?Sized> {
    index: &'a I,
    file_path: String,
    scan_level: ScanLevel,
    patterns: &'a [TextPattern],
    /// Paths already resolved against the tree
    visited_paths: HashSet<String>,
    /// USRs whose declaration / canonical / extension occurrences were handled
    full_search_usrs: HashSet<String>,
    /// USRs handled as members of a declaration
    contained_search_usrs: HashSet<String>,
}

impl<'a, I: SymbolIndex + ?Sized> IncludeAnalyzer<'a, I> {
    pub fn new(
        index: &'a I,
        file_path: &str,
        scan_level: ScanLevel,
        patterns: &'a [TextPattern],
    ) -> Self {
        Self {
            index,
            file_path: file_path.to_string(),
            scan_level,
            patterns,
            visited_paths: HashSet::new(),
            full_search_usrs: HashSet::new(),
            contained_search_usrs: HashSet::new(),
        }
    }

    /// The most recently indexed unit containing the file. Ties and units
    /// without a timestamp keep the earlier pick.
    async fn latest_unit(&self) -> Result<Option<String>> {
        let units = self.index.units_containing(&self.file_path).await?;
        let mut latest: Option<(String, Option<i64>)> = None;

        for unit in units {
            let modified = self.index.unit_modification_time(&unit).await?;
            let newer = match (&latest, modified) {
                (None, _) => true,
                (Some((_, None)), Some(_)) => true,
                (Some((_, Some(best))), Some(m)) => m > *best,
                (Some(_), None) => false,
            };
            if newer {
                latest = Some((unit, modified));
            }
        }

        Ok(latest.map(|(unit, _)| unit))
    }

    async fn build_include_tree(&self) -> Result<Option<(String, IncludeTree)>> {
        let Some(unit) = self.latest_unit().await? else {
            return Ok(None);
        };

        let includes = self.index.includes_of_unit(&unit).await?;
        let tree = IncludeTree::build(
            &self.file_path,
            includes.into_iter().map(IncludeEntry::from),
        );

        tracing::debug!(
            "Include tree for {} from unit {}: {} nodes, {} unattached",
            self.file_path,
            unit,
            tree.len(),
            tree.discrete_entries().len()
        );
        Ok(Some((unit, tree)))
    }

    /// Extension occurrences count only while extensions are checked, and
    /// only when the extension really declares a base (e.g. a protocol
    /// conformance). Everything else counts.
    async fn should_count_occurrence(&self, occurrence: &SymbolOccurrence) -> Result<bool> {
        if !occurrence.roles.contains(SymbolRoles::EXTENDED_BY) {
            return Ok(true);
        }
        if !self.scan_level.checks_extends() {
            return Ok(false);
        }

        for relation in &occurrence.relations {
            let bases = self
                .index
                .related_occurrences(&relation.symbol.usr, SymbolRoles::BASE_OF)
                .await?;
            if !bases.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Members of a declaration (properties, fields, ...) are needed where
    /// the declaration is; methods are not.
    async fn check_contained_symbols(
        &mut self,
        occurrence: &SymbolOccurrence,
        tree: &mut IncludeTree,
    ) -> Result<()> {
        if !self.scan_level.checks_contains()
            || !occurrence.roles.contains(SymbolRoles::DECLARATION)
        {
            return Ok(());
        }

        let members = self
            .index
            .related_occurrences(&occurrence.symbol.usr, SymbolRoles::CONTAINED_BY)
            .await?;

        for member in members {
            let symbol = &member.symbol;
            if self.full_search_usrs.contains(&symbol.usr)
                || self.contained_search_usrs.contains(&symbol.usr)
            {
                continue;
            }
            if symbol.kind.is_method() {
                continue;
            }

            let declarations = self
                .index
                .occurrences(
                    &symbol.usr,
                    SymbolRoles::DECLARATION | SymbolRoles::EXTENDED_BY,
                )
                .await?;
            for declaration in &declarations {
                if self.should_count_occurrence(declaration).await? {
                    self.mark_include_path_used(tree, &declaration.location.path);
                }
            }

            self.contained_search_usrs.insert(symbol.usr.clone());
        }
        Ok(())
    }

    fn mark_include_path_used(&mut self, tree: &mut IncludeTree, path: &str) {
        if path == self.file_path || self.visited_paths.contains(path) {
            return;
        }

        let roots = if self.scan_level.marks_all_roots() {
            tree.trace_all_root_includes(path)
        } else {
            tree.trace_single_root_include(path).into_iter().collect()
        };
        for root in roots {
            tree.mark_subtree_used(root);
        }

        self.visited_paths.insert(path.to_string());
    }

    /// Names matched by the text patterns. An unreadable file yields none.
    async fn extra_symbol_names(&self) -> Vec<String> {
        if self.patterns.is_empty() {
            return Vec::new();
        }
        match tokio::fs::read_to_string(&self.file_path).await {
            Ok(content) => self
                .patterns
                .iter()
                .flat_map(|p| p.extract_names(&content))
                .collect(),
            Err(e) => {
                tracing::debug!("Skipping text patterns for {}: {}", self.file_path, e);
                Vec::new()
            }
        }
    }

    /// Run the analysis
    pub async fn find_unused_includes(mut self) -> Result<FileReport> {
        let Some((unit, mut tree)) = self.build_include_tree().await? else {
            tracing::debug!("No indexed unit contains {}", self.file_path);
            return Ok(FileReport::not_indexed(&self.file_path));
        };

        let symbols = self.index.symbols_in_file(&self.file_path).await?;
        let extra_names = self.extra_symbol_names().await;

        let roles = SymbolRoles::DECLARATION | SymbolRoles::CANONICAL | SymbolRoles::EXTENDED_BY;
        for symbol in &symbols {
            if self.full_search_usrs.contains(&symbol.usr) {
                continue;
            }
            let occurrences = self.index.occurrences(&symbol.usr, roles).await?;
            for occurrence in &occurrences {
                if !self.should_count_occurrence(occurrence).await? {
                    continue;
                }
                self.check_contained_symbols(occurrence, &mut tree).await?;
                self.mark_include_path_used(&mut tree, &occurrence.location.path);
            }
            self.full_search_usrs.insert(symbol.usr.clone());
        }

        for name in &extra_names {
            let occurrences = self.index.canonical_occurrences(name).await?;
            for occurrence in occurrences {
                if self.full_search_usrs.contains(&occurrence.symbol.usr) {
                    continue;
                }
                self.mark_include_path_used(&mut tree, &occurrence.location.path);
                self.full_search_usrs.insert(occurrence.symbol.usr);
            }
        }

        tree.resolve_candidates();
        let unused = tree.unused_root_includes();
        tracing::debug!(
            "{}: {} symbols, {} extra names, {} unused includes",
            self.file_path,
            symbols.len(),
            extra_names.len(),
            unused.len()
        );

        Ok(FileReport {
            file_path: self.file_path,
            unit: Some(unit),
            unused,
        })
    }
}
