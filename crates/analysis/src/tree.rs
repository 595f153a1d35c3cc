//! Include tree reconstruction and usage marking
//!
//! The tree is rebuilt per analyzed file from the flat include list of its
//! compilation unit. Nodes live in an arena; `included_by` is a plain
//! handle so upward walks never own anything.

use crate::entry::IncludeEntry;
use std::collections::HashMap;

/// Handle of a node inside one `IncludeTree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One include directive placed in the tree
#[derive(Debug, Clone)]
pub struct IncludeNode {
    entry: IncludeEntry,
    including: Vec<NodeId>,
    included_by: Option<NodeId>,
    used: bool,
}

impl IncludeNode {
    fn new(entry: IncludeEntry, included_by: Option<NodeId>) -> Self {
        Self {
            entry,
            including: Vec::new(),
            included_by,
            used: false,
        }
    }

    pub fn entry(&self) -> &IncludeEntry {
        &self.entry
    }

    pub fn including(&self) -> &[NodeId] {
        &self.including
    }

    pub fn included_by(&self) -> Option<NodeId> {
        self.included_by
    }

    pub fn is_used(&self) -> bool {
        self.used
    }
}

pub struct IncludeTree {
    /// Attached nodes in attach order, `nodes[0]` is the synthetic root
    nodes: Vec<IncludeNode>,
    /// target path -> nodes including that path
    search_table: HashMap<String, Vec<NodeId>>,
    /// Recently attached nodes, searched first when attaching
    unresolved: Vec<NodeId>,
    /// Entries with no parent in the tree yet
    discrete: Vec<IncludeEntry>,
    /// Ambiguous nodes sharing a target path, none used at query time
    candidate_batches: Vec<Vec<NodeId>>,
}

impl IncludeTree {
    const ROOT: NodeId = NodeId(0);

    pub fn new(file_path: &str) -> Self {
        let root = IncludeNode::new(IncludeEntry::new(file_path, file_path, 0), None);
        Self {
            nodes: vec![root],
            search_table: HashMap::new(),
            unresolved: vec![Self::ROOT],
            discrete: Vec::new(),
            candidate_batches: Vec::new(),
        }
    }

    /// Build the tree for `file_path` from a unit's include list and run
    /// the retry pass
    pub fn build<I>(file_path: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = IncludeEntry>,
    {
        let mut tree = Self::new(file_path);
        for entry in entries {
            tree.add_entry(entry);
        }
        tree.retry_discrete_entries();
        tree
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    pub fn file_path(&self) -> &str {
        &self.nodes[Self::ROOT.0].entry.target_path
    }

    pub fn node(&self, id: NodeId) -> &IncludeNode {
        &self.nodes[id.0]
    }

    /// Direct includes of the analyzed file
    pub fn root_includes(&self) -> &[NodeId] {
        &self.nodes[Self::ROOT.0].including
    }

    /// Number of attached nodes, root excluded
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn discrete_entries(&self) -> &[IncludeEntry] {
        &self.discrete
    }

    pub fn candidate_batches(&self) -> &[Vec<NodeId>] {
        &self.candidate_batches
    }

    pub fn nodes_for_path(&self, path: &str) -> &[NodeId] {
        self.search_table.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Attach one include entry.
    ///
    /// Unresolved nodes are tried first, then every attached node; entries
    /// that fit nowhere are parked until `retry_discrete_entries`.
    pub fn add_entry(&mut self, entry: IncludeEntry) {
        if self
            .nodes_for_path(&entry.target_path)
            .iter()
            .any(|id| self.nodes[id.0].entry == entry)
        {
            return;
        }

        let parent = self
            .unresolved
            .iter()
            .copied()
            .find(|&id| self.nodes[id.0].entry.target_path == entry.source_path);

        if let Some(parent) = parent {
            let grandparent = self.nodes[parent.0]
                .included_by
                .and_then(|p| self.nodes[p.0].included_by);
            let id = self.attach(parent, entry);

            if let Some(grandparent) = grandparent {
                let nodes = &self.nodes;
                let stale = &nodes[grandparent.0].entry;
                self.unresolved.retain(|n| nodes[n.0].entry != *stale);
            }
            self.unresolved.push(id);
            return;
        }

        if !self.attach_anywhere(&entry) {
            self.discrete.push(entry);
        }
    }

    /// Exhaustive attach over all nodes. An entry equal to an attached one
    /// counts as attached.
    fn attach_anywhere(&mut self, entry: &IncludeEntry) -> bool {
        let mut parent = None;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.entry == *entry {
                return true;
            }
            if node.entry.target_path == entry.source_path
                && node.entry.target_path != entry.target_path
            {
                parent = Some(NodeId(i));
            }
        }

        match parent {
            Some(parent) => {
                self.attach(parent, entry.clone());
                true
            }
            None => false,
        }
    }

    fn attach(&mut self, parent: NodeId, entry: IncludeEntry) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.search_table
            .entry(entry.target_path.clone())
            .or_default()
            .push(id);
        self.nodes.push(IncludeNode::new(entry, Some(parent)));
        self.nodes[parent.0].including.push(id);
        id
    }

    /// Re-attach parked entries until none are left or a full pass makes
    /// no progress. Whatever remains is left out of the tree.
    pub fn retry_discrete_entries(&mut self) {
        self.unresolved.clear();
        while !self.discrete.is_empty() {
            let before = self.discrete.len();
            let pending = std::mem::take(&mut self.discrete);
            for entry in pending.into_iter().rev() {
                if !self.attach_anywhere(&entry) {
                    self.discrete.push(entry);
                }
            }
            self.discrete.reverse();
            if self.discrete.len() == before {
                break;
            }
        }
    }

    /// The direct include of the analyzed file that pulls in `id`
    pub fn trace_root_include(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].included_by {
            if self.nodes[parent.0].included_by.is_none() {
                break;
            }
            current = parent;
        }
        current
    }

    /// Mark `id` and its whole subtree used. Stops at nodes already used.
    pub fn mark_subtree_used(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current.0];
            if node.used {
                continue;
            }
            node.used = true;
            stack.extend(node.including.iter().copied());
        }
    }

    pub fn unused_root_includes(&self) -> Vec<IncludeEntry> {
        self.root_includes()
            .iter()
            .map(|id| &self.nodes[id.0])
            .filter(|node| !node.used)
            .map(|node| node.entry.clone())
            .collect()
    }

    /// Drop batches where some member has been used since
    pub fn check_candidates(&mut self) {
        let nodes = &self.nodes;
        self.candidate_batches
            .retain(|batch| !batch.iter().any(|id| nodes[id.0].used));
    }

    /// The single node responsible for `path`.
    ///
    /// Returns `None` when nothing includes `path`, when one of its nodes is
    /// already used, or when several nodes match; the last case is queued
    /// as a candidate batch.
    pub fn find_used_node(&mut self, path: &str) -> Option<NodeId> {
        self.check_candidates();
        let nodes = self.search_table.get(path)?;
        if nodes.iter().any(|id| self.nodes[id.0].used) {
            return None;
        }
        match nodes.as_slice() {
            [] => None,
            [only] => Some(*only),
            _ => {
                self.candidate_batches.push(nodes.clone());
                None
            }
        }
    }

    pub fn trace_single_root_include(&mut self, path: &str) -> Option<NodeId> {
        self.find_used_node(path)
            .map(|id| self.trace_root_include(id))
    }

    /// Every distinct direct include through which `path` is reachable
    pub fn trace_all_root_includes(&self, path: &str) -> Vec<NodeId> {
        let mut roots = Vec::new();
        for &id in self.nodes_for_path(path) {
            let root = self.trace_root_include(id);
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }

    /// Settle leftover ambiguity by marking the first candidate of each
    /// batch still unresolved
    pub fn resolve_candidates(&mut self) {
        self.check_candidates();
        let batches = std::mem::take(&mut self.candidate_batches);
        for batch in batches {
            if batch.iter().any(|id| self.nodes[id.0].used) {
                continue;
            }
            if let Some(&first) = batch.first() {
                let root = self.trace_root_include(first);
                self.mark_subtree_used(root);
            }
        }
    }
}
