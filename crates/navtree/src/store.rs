//! Tree store with lazily resolved fragments.
//!
//! The base forest is immutable shared data loaded once. Deferred subtrees are
//! materialized into a separate resolved-fragment cache layered on top, so the
//! base is never mutated and a resolved fragment is shared by every node that
//! references it.
//!
//! # Resolution
//!
//! [`TreeStore::resolve_deferred`] fetches, parses and caches a fragment in one
//! blocking call. Drivers that load fragments asynchronously use the split
//! form instead: [`TreeStore::begin_resolve`] tells whether a fetch is needed
//! and [`TreeStore::install`] records the fetched text once it arrives.

use std::collections::HashMap;
use std::sync::Arc;

use navtree_storage::{FragmentSource, StorageError};

use crate::fragment::{FragmentError, parse_subtree};
use crate::node::{Children, FragmentId, TreeNode};
use crate::path::NodePath;

/// Error returned by tree store operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Path does not address a materialized node.
    #[error("No node at path {0}")]
    InvalidPath(NodePath),
    /// Fetching the fragment failed.
    #[error("Failed to fetch fragment {fragment}: {source}")]
    Fetch {
        /// Fragment identifier.
        fragment: FragmentId,
        /// Storage error.
        #[source]
        source: StorageError,
    },
    /// Fragment text could not be parsed.
    #[error(transparent)]
    Parse(#[from] FragmentError),
}

/// Handle to a node whose children have not been loaded yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeferredHandle {
    path: NodePath,
    fragment: FragmentId,
}

impl DeferredHandle {
    /// Path of the node owning the deferred children.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Fragment holding the children.
    #[must_use]
    pub fn fragment(&self) -> &FragmentId {
        &self.fragment
    }
}

/// Children of a node as seen through the resolved-fragment cache.
#[derive(Debug, PartialEq, Eq)]
pub enum ChildrenView<'a> {
    /// No children.
    Leaf,
    /// Materialized children (inline or resolved).
    Inline(&'a [TreeNode]),
    /// Children are in a fragment that has not been loaded.
    Deferred(DeferredHandle),
    /// Loading the fragment failed; the branch must show an error, not look empty.
    LoadFailed {
        /// Handle for retrying the load.
        handle: DeferredHandle,
        /// Failure description.
        message: &'a str,
    },
}

/// Outcome of [`TreeStore::begin_resolve`].
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Fragment already materialized.
    Cached(Arc<[TreeNode]>),
    /// Fragment must be fetched and passed to [`TreeStore::install`].
    Fetch(FragmentId),
}

#[derive(Debug)]
enum Slot {
    Loaded(Arc<[TreeNode]>),
    Failed(String),
}

/// Navigation hierarchy with progressively materialized fragments.
#[derive(Debug)]
pub struct TreeStore {
    roots: Arc<[TreeNode]>,
    resolved: HashMap<FragmentId, Slot>,
}

impl TreeStore {
    /// Create a store over a base forest.
    #[must_use]
    pub fn new(roots: impl Into<Arc<[TreeNode]>>) -> Self {
        Self {
            roots: roots.into(),
            resolved: HashMap::new(),
        }
    }

    /// Base forest shared with other consumers.
    #[must_use]
    pub fn shared_roots(&self) -> Arc<[TreeNode]> {
        Arc::clone(&self.roots)
    }

    /// Root nodes of the forest.
    #[must_use]
    pub fn roots(&self) -> &[TreeNode] {
        &self.roots
    }

    /// Node at `path`, if every fragment on the way is materialized.
    #[must_use]
    pub fn node(&self, path: &NodePath) -> Option<&TreeNode> {
        let (&last, init) = path.indices().split_last()?;
        let mut siblings: &[TreeNode] = &self.roots[..];
        for &index in init {
            siblings = self.materialized(siblings.get(index)?)?;
        }
        siblings.get(last)
    }

    /// Children of the node at `path`; the empty path yields the root nodes.
    ///
    /// Never loads anything: a deferred slot comes back as a handle so the
    /// caller decides whether to trigger a load.
    pub fn children(&self, path: &NodePath) -> Result<ChildrenView<'_>, TreeError> {
        if path.is_root() {
            return Ok(ChildrenView::Inline(&self.roots[..]));
        }

        let node = self
            .node(path)
            .ok_or_else(|| TreeError::InvalidPath(path.clone()))?;

        let view = match &node.children {
            Children::None => ChildrenView::Leaf,
            Children::Inline(children) if children.is_empty() => ChildrenView::Leaf,
            Children::Inline(children) => ChildrenView::Inline(children.as_slice()),
            Children::Deferred(fragment) => {
                let handle = DeferredHandle {
                    path: path.clone(),
                    fragment: fragment.clone(),
                };
                match self.resolved.get(fragment) {
                    Some(Slot::Loaded(children)) if children.is_empty() => ChildrenView::Leaf,
                    Some(Slot::Loaded(children)) => ChildrenView::Inline(&children[..]),
                    Some(Slot::Failed(message)) => ChildrenView::LoadFailed {
                        handle,
                        message: message.as_str(),
                    },
                    None => ChildrenView::Deferred(handle),
                }
            }
        };
        Ok(view)
    }

    /// True if the fragment has been materialized successfully.
    #[must_use]
    pub fn is_resolved(&self, fragment: &FragmentId) -> bool {
        matches!(self.resolved.get(fragment), Some(Slot::Loaded(_)))
    }

    /// Number of materialized fragments.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.resolved
            .values()
            .filter(|slot| matches!(slot, Slot::Loaded(_)))
            .count()
    }

    /// Check whether resolving `handle` needs a fetch.
    ///
    /// A fragment whose previous load failed is fetched again.
    #[must_use]
    pub fn begin_resolve(&self, handle: &DeferredHandle) -> Resolution {
        match self.resolved.get(&handle.fragment) {
            Some(Slot::Loaded(children)) => Resolution::Cached(Arc::clone(children)),
            Some(Slot::Failed(_)) | None => Resolution::Fetch(handle.fragment.clone()),
        }
    }

    /// Record the outcome of fetching a fragment.
    ///
    /// On success the parsed children are cached and returned. An already
    /// materialized fragment is never replaced or downgraded: the cached
    /// children are returned and `fetched` is ignored. On failure the slot
    /// is marked as failed and the error is returned.
    pub fn install(
        &mut self,
        fragment: &FragmentId,
        fetched: Result<String, StorageError>,
    ) -> Result<Arc<[TreeNode]>, TreeError> {
        if let Some(Slot::Loaded(children)) = self.resolved.get(fragment) {
            tracing::debug!(%fragment, "Fragment already materialized, keeping cached children");
            return Ok(Arc::clone(children));
        }

        let parsed = match fetched {
            Ok(raw) => parse_subtree(fragment.as_str(), &raw).map_err(TreeError::from),
            Err(source) => Err(TreeError::Fetch {
                fragment: fragment.clone(),
                source,
            }),
        };

        match parsed {
            Ok(nodes) => {
                let children: Arc<[TreeNode]> = nodes.into();
                tracing::debug!(%fragment, count = children.len(), "Fragment materialized");
                self.resolved
                    .insert(fragment.clone(), Slot::Loaded(Arc::clone(&children)));
                Ok(children)
            }
            Err(e) => {
                tracing::warn!(%fragment, error = %e, "Failed to load fragment");
                self.resolved
                    .insert(fragment.clone(), Slot::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Fetch, parse and cache the children behind `handle`.
    ///
    /// Idempotent: once resolved, the same `Arc` is returned without fetching.
    pub fn resolve_deferred(
        &mut self,
        handle: &DeferredHandle,
        source: &dyn FragmentSource,
    ) -> Result<Arc<[TreeNode]>, TreeError> {
        match self.begin_resolve(handle) {
            Resolution::Cached(children) => Ok(children),
            Resolution::Fetch(fragment) => {
                let fetched = source.fetch(fragment.as_str());
                self.install(&fragment, fetched)
            }
        }
    }

    /// Materialized nodes in pre-order with their paths.
    ///
    /// Deferred subtrees that have not been resolved are skipped. A node
    /// deferring to a fragment already open above it is listed without its
    /// children, so self-referencing fragments stay finite.
    #[must_use]
    pub fn preorder(&self) -> Vec<(NodePath, &TreeNode)> {
        let mut out = Vec::new();
        let mut open = Vec::new();
        self.collect_preorder(&self.roots[..], &NodePath::root(), &mut open, &mut out);
        out
    }

    fn collect_preorder<'a>(
        &'a self,
        siblings: &'a [TreeNode],
        parent: &NodePath,
        open: &mut Vec<&'a FragmentId>,
        out: &mut Vec<(NodePath, &'a TreeNode)>,
    ) {
        for (i, node) in siblings.iter().enumerate() {
            let path = parent.child(i);
            out.push((path.clone(), node));
            let Some(children) = self.materialized(node) else {
                continue;
            };
            match &node.children {
                Children::Deferred(fragment) if open.contains(&fragment) => {
                    tracing::warn!(%fragment, %path, "Fragment refers back to itself, subtree skipped");
                }
                Children::Deferred(fragment) => {
                    open.push(fragment);
                    self.collect_preorder(children, &path, open, out);
                    open.pop();
                }
                _ => self.collect_preorder(children, &path, open, out),
            }
        }
    }

    /// Children of `node` if they are available without loading.
    fn materialized<'a>(&'a self, node: &'a TreeNode) -> Option<&'a [TreeNode]> {
        match &node.children {
            Children::None => None,
            Children::Inline(children) => Some(children.as_slice()),
            Children::Deferred(fragment) => match self.resolved.get(fragment) {
                Some(Slot::Loaded(children)) => Some(&children[..]),
                Some(Slot::Failed(_)) | None => None,
            },
        }
    }
}
