//! Sync controller state machine.
//!
//! The controller keeps a panel consistent with the displayed page without
//! doing any I/O itself. Each "page displayed" event starts a resolution
//! tagged with a fresh [`Generation`]; whenever an ancestor's children are not
//! loaded yet, the controller returns a [`FetchRequest`] and waits. The driver
//! performs the fetch, installs the result into the [`TreeStore`] and reports
//! back with [`SyncController::fragment_loaded`]. Completions carrying an older
//! generation are dropped, so the last displayed page always wins.
//!
//! ```text
//! Idle/Synced/SyncFailed --page_displayed--> Resolving
//! Resolving --fragment_loaded(latest)--> Resolving | Synced | SyncFailed
//! any --set_enabled(false)--> Idle
//! ```

use std::collections::BTreeSet;
use std::fmt;

use navtree::{ChildrenView, DeferredHandle, FlatIndex, FragmentId, IndexMatch, NodePath, TreeStore};

/// Monotonic tag of a page event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Generation following this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Raw counter value.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reason a page could not be highlighted.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The page has no entry in the index, exact or approximate.
    #[error("Page {page_id} is not in the navigation index")]
    TargetNotIndexed {
        /// Displayed page.
        page_id: String,
    },
    /// An ancestor's fragment could not be loaded.
    #[error("Failed to load fragment {fragment} for {path}: {message}")]
    FragmentLoadFailed {
        /// Fragment that failed.
        fragment: FragmentId,
        /// Node owning the fragment.
        path: NodePath,
        /// Failure description.
        message: String,
    },
    /// An approximate match did not narrow down to exactly one child.
    #[error("No unique entry for {page_id} below {path}")]
    PathResolutionAmbiguous {
        /// Displayed page.
        page_id: String,
        /// Enclosing node that was scanned.
        path: NodePath,
    },
    /// The index path does not lead to the page in the loaded tree.
    #[error("Index path {path} for {page_id} does not match the tree")]
    PathNotInTree {
        /// Displayed page.
        page_id: String,
        /// Path taken from the index.
        path: NodePath,
    },
}

/// Controller state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    /// No resolution has run since creation or the last disable.
    #[default]
    Idle,
    /// Waiting for a fragment.
    Resolving,
    /// The displayed page is selected.
    Synced,
    /// The last resolution failed; `selected` still shows the previous page.
    SyncFailed(SyncError),
}

/// Request to load the children behind a deferred handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    /// Event this fetch belongs to; pass it back to [`SyncController::fragment_loaded`].
    pub generation: Generation,
    /// Deferred children to load.
    pub handle: DeferredHandle,
}

impl FetchRequest {
    /// Fragment to fetch.
    #[must_use]
    pub fn fragment(&self) -> &FragmentId {
        self.handle.fragment()
    }
}

/// What the driver has to do after feeding an event to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncStep {
    /// Fetch a fragment, install it and call [`SyncController::fragment_loaded`].
    Fetch(FetchRequest),
    /// Resolution ended; see [`SyncController::state`].
    Finished,
    /// Event was dropped (sync disabled or stale generation).
    Ignored,
}

#[derive(Debug)]
struct Pending {
    generation: Generation,
    page_id: String,
    matched: IndexMatch,
    /// Fragment requested by the last `Fetch` step of this resolution.
    requested: Option<FragmentId>,
}

/// Panel synchronisation state machine.
#[derive(Debug)]
pub struct SyncController {
    enabled: bool,
    state: SyncState,
    generation: Generation,
    selected: Option<NodePath>,
    expanded: BTreeSet<NodePath>,
    pending: Option<Pending>,
}

impl Default for SyncController {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SyncController {
    /// Create a controller with sync initially on or off.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            state: SyncState::Idle,
            generation: Generation::default(),
            selected: None,
            expanded: BTreeSet::new(),
            pending: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Generation of the latest accepted page event.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Highlighted node.
    #[must_use]
    pub fn selected(&self) -> Option<&NodePath> {
        self.selected.as_ref()
    }

    /// Expanded branches.
    #[must_use]
    pub fn expanded(&self) -> &BTreeSet<NodePath> {
        &self.expanded
    }

    /// True if the branch at `path` is open.
    #[must_use]
    pub fn is_expanded(&self, path: &NodePath) -> bool {
        self.expanded.contains(path)
    }

    /// True if the panel follows the displayed page.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Switch synchronisation on or off.
    ///
    /// Disabling drops any in-flight resolution and returns to `Idle`.
    /// Enabling does not resynchronise with the page shown meanwhile; the
    /// next page event does.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if !enabled {
            if let Some(pending) = self.pending.take() {
                tracing::debug!(
                    generation = %pending.generation,
                    page = %pending.page_id,
                    "Sync disabled, dropping resolution"
                );
            }
            self.state = SyncState::Idle;
        }
        tracing::debug!(enabled, "Panel synchronisation toggled");
    }

    /// Flip synchronisation and return the new setting.
    pub fn toggle(&mut self) -> bool {
        self.set_enabled(!self.enabled);
        self.enabled
    }

    /// Open a branch. The caller is responsible for loading its children.
    pub fn expand(&mut self, path: NodePath) {
        self.expanded.insert(path);
    }

    /// Close a branch. `selected` is left alone even when it sits below.
    ///
    /// Returns `false` if the branch was not open.
    pub fn collapse(&mut self, path: &NodePath) -> bool {
        self.expanded.remove(path)
    }

    /// Handle a "page displayed" event.
    ///
    /// Ignored while sync is disabled. Otherwise supersedes any resolution
    /// still in flight.
    pub fn page_displayed(
        &mut self,
        page_id: &str,
        index: &FlatIndex,
        store: &TreeStore,
    ) -> SyncStep {
        if !self.enabled {
            tracing::debug!(page = %page_id, "Sync disabled, ignoring page event");
            return SyncStep::Ignored;
        }

        self.generation = self.generation.next();
        if let Some(previous) = self.pending.take() {
            tracing::debug!(
                superseded = %previous.generation,
                generation = %self.generation,
                "Superseding in-flight resolution"
            );
        }

        let Some(matched) = index.lookup(page_id) else {
            return self.fail(SyncError::TargetNotIndexed {
                page_id: page_id.to_owned(),
            });
        };
        tracing::debug!(
            page = %page_id,
            path = %matched.path(),
            exact = matched.is_exact(),
            generation = %self.generation,
            "Resolving page"
        );

        self.state = SyncState::Resolving;
        self.pending = Some(Pending {
            generation: self.generation,
            page_id: page_id.to_owned(),
            matched,
            requested: None,
        });
        self.advance(store)
    }

    /// Handle completion of a fetch issued for `generation`.
    ///
    /// The fragment must already be installed in `store`, successfully or
    /// not. Completions for anything but the latest event are ignored.
    pub fn fragment_loaded(&mut self, generation: Generation, store: &TreeStore) -> SyncStep {
        match &self.pending {
            Some(pending) if pending.generation == generation => self.advance(store),
            _ => {
                tracing::debug!(
                    %generation,
                    latest = %self.generation,
                    "Discarding stale fragment completion"
                );
                SyncStep::Ignored
            }
        }
    }

    /// Walk the pending path as far as the store allows.
    fn advance(&mut self, store: &TreeStore) -> SyncStep {
        let Some(mut pending) = self.pending.take() else {
            return SyncStep::Ignored;
        };

        let path = pending.matched.path().clone();
        // Approximate matches also open the enclosing node to scan its children.
        let open_depth = if pending.matched.is_exact() {
            path.depth().saturating_sub(1)
        } else {
            path.depth()
        };

        for depth in 1..=open_depth {
            let branch = path.prefix(depth);
            let view = match store.children(&branch) {
                Ok(view) => view,
                Err(_) => return self.fail(not_in_tree(&pending)),
            };
            let handle = match view {
                ChildrenView::Inline(_) => {
                    self.expanded.insert(branch);
                    continue;
                }
                ChildrenView::Leaf if depth < path.depth() => {
                    return self.fail(not_in_tree(&pending));
                }
                ChildrenView::Leaf => {
                    return self.fail(SyncError::PathResolutionAmbiguous {
                        page_id: pending.page_id,
                        path,
                    });
                }
                ChildrenView::LoadFailed { handle, message } => {
                    if pending.requested.as_ref() == Some(handle.fragment()) {
                        return self.fail(SyncError::FragmentLoadFailed {
                            fragment: handle.fragment().clone(),
                            path: branch,
                            message: message.to_owned(),
                        });
                    }
                    handle
                }
                ChildrenView::Deferred(handle) => {
                    if pending.requested.as_ref() == Some(handle.fragment()) {
                        return self.fail(SyncError::FragmentLoadFailed {
                            fragment: handle.fragment().clone(),
                            path: branch,
                            message: "fragment was not installed".to_owned(),
                        });
                    }
                    handle
                }
            };

            tracing::debug!(
                fragment = %handle.fragment(),
                path = %branch,
                generation = %pending.generation,
                "Requesting fragment"
            );
            pending.requested = Some(handle.fragment().clone());
            let request = FetchRequest {
                generation: pending.generation,
                handle,
            };
            self.pending = Some(pending);
            return SyncStep::Fetch(request);
        }

        let resolved = match &pending.matched {
            IndexMatch::Exact(_) => {
                if store.node(&path).is_some_and(|node| node.links_to(&pending.page_id)) {
                    Some(path.clone())
                } else {
                    return self.fail(not_in_tree(&pending));
                }
            }
            IndexMatch::Approximate(_) => unique_child(store, &path, &pending.page_id),
        };

        match resolved {
            Some(target) => {
                tracing::debug!(
                    page = %pending.page_id,
                    path = %target,
                    generation = %pending.generation,
                    "Page synchronised"
                );
                self.selected = Some(target);
                self.state = SyncState::Synced;
                SyncStep::Finished
            }
            None => self.fail(SyncError::PathResolutionAmbiguous {
                page_id: pending.page_id,
                path,
            }),
        }
    }

    fn fail(&mut self, error: SyncError) -> SyncStep {
        tracing::debug!(error = %error, generation = %self.generation, "Sync failed");
        self.pending = None;
        self.state = SyncState::SyncFailed(error);
        SyncStep::Finished
    }
}

fn not_in_tree(pending: &Pending) -> SyncError {
    SyncError::PathNotInTree {
        page_id: pending.page_id.clone(),
        path: pending.matched.path().clone(),
    }
}

/// Path of the only direct child of `parent` linking to `page_id`.
fn unique_child(store: &TreeStore, parent: &NodePath, page_id: &str) -> Option<NodePath> {
    let Ok(ChildrenView::Inline(children)) = store.children(parent) else {
        return None;
    };
    let mut matches = children
        .iter()
        .enumerate()
        .filter(|(_, node)| node.links_to(page_id))
        .map(|(i, _)| parent.child(i));
    let first = matches.next()?;
    matches.next().is_none().then_some(first)
}
