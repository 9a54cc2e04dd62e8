//! Flat index mapping displayed pages to tree paths.
//!
//! The generated index comes in two parts:
//!
//! - a sparse boundary list (`NAVTREEINDEX`) holding the first target of each
//!   index chunk, in sorted order
//! - chunks (`NAVTREEINDEX0`, `NAVTREEINDEX1`, ...) holding exact
//!   `target -> path` entries
//!
//! The boundary list tells which chunk to load for a page; loading is the
//! caller's business. [`FlatIndex::lookup`] only consults what has already
//! been inserted and never loads anything.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::fragment::{FragmentError, ParsedFragment};
use crate::node::FragmentId;
use crate::path::NodePath;
use crate::store::TreeStore;

/// Result of [`FlatIndex::lookup`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexMatch {
    /// Path of the node whose target equals the page id.
    Exact(NodePath),
    /// Path of the nearest enclosing entry (the page without its anchor).
    ///
    /// The node itself is not the page: the caller must expand it and look
    /// for the page among its children.
    Approximate(NodePath),
}

impl IndexMatch {
    /// Path carried by the match.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        match self {
            Self::Exact(path) | Self::Approximate(path) => path,
        }
    }

    /// True for [`IndexMatch::Exact`].
    #[must_use]
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }
}

/// One `target -> path` entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    /// Document reference with optional anchor.
    pub target: String,
    /// Path of the node in the tree.
    pub path: NodePath,
}

/// One loadable chunk of exact index entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexChunk {
    number: usize,
    entries: Vec<IndexEntry>,
}

impl IndexChunk {
    /// Fragment identifier of chunk `number` (`NAVTREEINDEX`, 2 -> `navtreeindex2`).
    #[must_use]
    pub fn fragment_id(variable: &str, number: usize) -> FragmentId {
        FragmentId::new(format!("{}{number}", variable.to_lowercase()))
    }

    /// Variable name of chunk `number` (`NAVTREEINDEX`, 2 -> `NAVTREEINDEX2`).
    #[must_use]
    pub fn variable(variable: &str, number: usize) -> String {
        format!("{variable}{number}")
    }

    /// Parse the text of chunk `number`.
    ///
    /// # Arguments
    ///
    /// * `variable` - Index variable prefix (e.g., "NAVTREEINDEX")
    /// * `number` - Chunk number
    /// * `source` - Raw fragment text
    pub fn parse(variable: &str, number: usize, source: &str) -> Result<Self, FragmentError> {
        let fragment = Self::fragment_id(variable, number);
        let parsed = ParsedFragment::parse(fragment.as_str(), source)?;
        let name = Self::variable(variable, number);
        let value = match (parsed.get(&name), parsed.assignments()) {
            (Some(value), _) => value,
            (None, [single]) => &single.value,
            (None, _) => {
                return Err(FragmentError::MissingVariable {
                    fragment: fragment.to_string(),
                    name,
                });
            }
        };
        Self::from_value(fragment.as_str(), number, value)
    }

    /// Build a chunk from an object of `target: [indices]` pairs.
    pub fn from_value(fragment: &str, number: usize, value: &Value) -> Result<Self, FragmentError> {
        let Value::Object(map) = value else {
            return Err(malformed(fragment, "expected an object of target paths"));
        };

        let entries = map
            .iter()
            .map(|(target, path)| {
                let indices = path
                    .as_array()
                    .and_then(|items| {
                        items
                            .iter()
                            .map(|i| i.as_u64().and_then(|i| usize::try_from(i).ok()))
                            .collect::<Option<Vec<_>>>()
                    })
                    .ok_or_else(|| {
                        malformed(
                            fragment,
                            &format!("path of {target} must be an array of indices"),
                        )
                    })?;
                Ok(IndexEntry {
                    target: target.clone(),
                    path: NodePath::from(indices),
                })
            })
            .collect::<Result<Vec<_>, FragmentError>>()?;

        Ok(Self { number, entries })
    }

    /// Move every entry below `root`.
    ///
    /// Generated chunks store paths relative to the single top-level node,
    /// with `[]` for that node itself.
    #[must_use]
    pub fn rebased(mut self, root: &NodePath) -> Self {
        if !root.is_root() {
            for entry in &mut self.entries {
                entry.path = root.join(&entry.path);
            }
        }
        self
    }

    /// Chunk number.
    #[must_use]
    pub fn number(&self) -> usize {
        self.number
    }

    /// Entries in the chunk.
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

/// Ordered lookup structure from displayed pages to tree paths.
#[derive(Clone, Debug, Default)]
pub struct FlatIndex {
    boundaries: Vec<String>,
    by_target: HashMap<String, NodePath>,
    /// Entries sorted by path, which is pre-order tree order.
    ordered: Vec<IndexEntry>,
    loaded_chunks: BTreeSet<usize>,
}

impl FlatIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index seeded with the sparse boundary list.
    #[must_use]
    pub fn with_boundaries(boundaries: Vec<String>) -> Self {
        Self {
            boundaries,
            ..Self::default()
        }
    }

    /// Create an index from exact entries.
    ///
    /// When a target appears more than once the first occurrence wins.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (String, NodePath)>) -> Self {
        let mut index = Self::new();
        index.extend(entries);
        index
    }

    /// Build an exact index from the materialized part of a store.
    ///
    /// Nodes are visited in pre-order; a target linked from several nodes
    /// maps to the first one.
    #[must_use]
    pub fn from_store(store: &TreeStore) -> Self {
        Self::from_entries(
            store
                .preorder()
                .into_iter()
                .filter_map(|(path, node)| node.target.clone().map(|target| (target, path))),
        )
    }

    /// Parse a boundary list: an array of targets or `[target, anchor]` pairs.
    pub fn parse_boundaries(fragment: &str, value: &Value) -> Result<Vec<String>, FragmentError> {
        let Value::Array(items) = value else {
            return Err(malformed(fragment, "boundary list must be an array"));
        };

        items
            .iter()
            .map(|item| match item {
                Value::String(target) => Ok(target.clone()),
                Value::Array(pair) => match pair.as_slice() {
                    [Value::String(page), Value::String(anchor)] if !anchor.is_empty() => {
                        Ok(format!("{page}#{anchor}"))
                    }
                    [Value::String(page), Value::String(_) | Value::Null] | [Value::String(page)] => {
                        Ok(page.clone())
                    }
                    _ => Err(malformed(fragment, "boundary pair must be [target, anchor]")),
                },
                _ => Err(malformed(fragment, "boundary must be a string or a pair")),
            })
            .collect()
    }

    /// Sparse boundary list.
    #[must_use]
    pub fn boundaries(&self) -> &[String] {
        &self.boundaries
    }

    /// Number of chunks announced by the boundary list.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.boundaries.len()
    }

    /// Chunk that holds `page_id`.
    ///
    /// Boundaries are sorted, so the chunk is the last one whose first target
    /// is not greater than `page_id`. Returns `None` without boundaries.
    #[must_use]
    pub fn chunk_for(&self, page_id: &str) -> Option<usize> {
        if self.boundaries.is_empty() {
            return None;
        }
        let after = self
            .boundaries
            .partition_point(|boundary| boundary.as_str() <= page_id);
        Some(after.saturating_sub(1))
    }

    /// True if chunk `number` has been inserted.
    #[must_use]
    pub fn is_chunk_loaded(&self, number: usize) -> bool {
        self.loaded_chunks.contains(&number)
    }

    /// Merge a chunk into the index.
    pub fn insert_chunk(&mut self, chunk: IndexChunk) {
        tracing::debug!(
            chunk = chunk.number,
            entries = chunk.entries.len(),
            "Index chunk inserted"
        );
        self.loaded_chunks.insert(chunk.number);
        self.extend(
            chunk
                .entries
                .into_iter()
                .map(|entry| (entry.target, entry.path)),
        );
    }

    /// Add one entry. Returns `false` if the target was already indexed.
    pub fn insert(&mut self, target: String, path: NodePath) -> bool {
        if self.by_target.contains_key(&target) {
            return false;
        }
        let at = self.ordered.partition_point(|entry| entry.path <= path);
        self.ordered.insert(
            at,
            IndexEntry {
                target: target.clone(),
                path: path.clone(),
            },
        );
        self.by_target.insert(target, path);
        true
    }

    fn extend(&mut self, entries: impl IntoIterator<Item = (String, NodePath)>) {
        for (target, path) in entries {
            self.insert(target, path);
        }
    }

    /// Resolve a displayed page to a tree path.
    ///
    /// Exact entries win. Otherwise a page with an anchor falls back to the
    /// entry of its document as an [`IndexMatch::Approximate`] match.
    #[must_use]
    pub fn lookup(&self, page_id: &str) -> Option<IndexMatch> {
        if let Some(path) = self.by_target.get(page_id) {
            return Some(IndexMatch::Exact(path.clone()));
        }
        let (document, _anchor) = page_id.split_once('#')?;
        self.by_target
            .get(document)
            .map(|path| IndexMatch::Approximate(path.clone()))
    }

    /// Entries in pre-order tree order.
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.ordered
    }

    /// Number of exact entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// True if no exact entry has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Entry following `target` in tree order.
    #[must_use]
    pub fn next(&self, target: &str) -> Option<&IndexEntry> {
        let at = self.position(target)?;
        self.ordered.get(at + 1)
    }

    /// Entry preceding `target` in tree order.
    #[must_use]
    pub fn previous(&self, target: &str) -> Option<&IndexEntry> {
        let at = self.position(target)?;
        self.ordered.get(at.checked_sub(1)?)
    }

    fn position(&self, target: &str) -> Option<usize> {
        let path = self.by_target.get(target)?;
        self.ordered
            .iter()
            .position(|entry| &entry.path == path && entry.target == target)
    }
}

fn malformed(fragment: &str, reason: &str) -> FragmentError {
    FragmentError::MalformedEntry {
        fragment: fragment.to_owned(),
        position: NodePath::root(),
        reason: reason.to_owned(),
    }
}
