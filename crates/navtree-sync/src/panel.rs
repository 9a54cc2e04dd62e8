//! Blocking panel driver.
//!
//! [`Panel`] owns the tree store, the flat index and a [`SyncController`],
//! and performs every fetch the controller asks for inline through a
//! [`FragmentSource`]. It also exposes the visible rows of the tree as a
//! serialisable view model.

use std::sync::Arc;

use navtree::{
    ChildrenView, FlatIndex, FragmentError, IndexChunk, NodePath, ParsedFragment, TreeError,
    TreeNode, TreeStore,
};
use navtree_config::Config;
use navtree_storage::{FragmentSource, FsFragmentSource, StorageError};
use serde::Serialize;

use crate::controller::{SyncController, SyncState, SyncStep};
use crate::toggle::SyncToggle;

/// Names of the generated data the panel reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PanelOptions {
    /// Fragment holding the root forest and the index boundary list.
    pub root_fragment: String,
    /// Variable holding the root forest.
    pub root_variable: String,
    /// Variable prefix of the index boundary list and its chunks.
    pub index_variable: String,
    /// Node that index chunk paths are relative to.
    ///
    /// Generated chunks address the single top-level node as `[]`, so the
    /// default is `[0]`. Use the forest path for chunks holding full paths.
    pub index_root: NodePath,
    /// Whether sync starts enabled.
    pub sync_enabled: bool,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self {
            root_fragment: "navtreedata".to_owned(),
            root_variable: "NAVTREE".to_owned(),
            index_variable: "NAVTREEINDEX".to_owned(),
            index_root: NodePath::from([0]),
            sync_enabled: true,
        }
    }
}

impl From<&Config> for PanelOptions {
    fn from(config: &Config) -> Self {
        let tree = &config.tree_resolved;
        Self {
            root_fragment: tree.root_fragment.clone(),
            root_variable: tree.root_variable.clone(),
            index_variable: tree.index_variable.clone(),
            index_root: NodePath::from(tree.index_root.clone()),
            sync_enabled: config.sync.enabled,
        }
    }
}

/// Error opening a panel.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// Root fragment could not be fetched.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Root fragment could not be parsed.
    #[error(transparent)]
    Fragment(#[from] FragmentError),
}

/// Display state of one row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowState {
    /// No children.
    Leaf,
    /// Has children, closed.
    Collapsed,
    /// Has children, open.
    Expanded,
    /// Children could not be loaded; shown as an error, not as a leaf.
    LoadFailed {
        /// Failure description.
        message: String,
    },
}

/// One visible row of the panel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PanelRow {
    /// Node path.
    pub path: NodePath,
    /// Indentation level, 0 for root nodes.
    pub depth: usize,
    /// Display text.
    pub title: String,
    /// Link target.
    pub target: Option<String>,
    /// Expansion state.
    pub state: RowState,
    /// True for the highlighted row.
    pub selected: bool,
}

/// Navigation panel kept in step with the displayed page.
pub struct Panel {
    source: Arc<dyn FragmentSource>,
    options: PanelOptions,
    store: TreeStore,
    index: FlatIndex,
    controller: SyncController,
    toggle: SyncToggle,
}

impl std::fmt::Debug for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Panel")
            .field("options", &self.options)
            .field("store", &self.store)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl Panel {
    /// Load the root fragment and build the panel.
    ///
    /// Without a boundary list in the root fragment, the index is built from
    /// the inline part of the tree.
    pub fn open(source: Arc<dyn FragmentSource>, options: PanelOptions) -> Result<Self, PanelError> {
        let raw = source.fetch(&options.root_fragment)?;
        let parsed = ParsedFragment::parse(&options.root_fragment, &raw)?;

        let store = TreeStore::new(parsed.nodes(&options.root_variable)?);
        let index = match parsed.get(&options.index_variable) {
            Some(boundaries) => FlatIndex::with_boundaries(FlatIndex::parse_boundaries(
                &options.root_fragment,
                boundaries,
            )?),
            None => FlatIndex::from_store(&store),
        };
        let toggle = SyncToggle::from_fragment(&parsed);

        tracing::info!(
            fragment = %options.root_fragment,
            roots = store.roots().len(),
            chunks = index.chunk_count(),
            "Navigation panel opened"
        );

        Ok(Self {
            source,
            controller: SyncController::new(options.sync_enabled),
            options,
            store,
            index,
            toggle,
        })
    }

    /// Open a panel over the filesystem fragments named by `config`.
    pub fn from_config(config: &Config) -> Result<Self, PanelError> {
        let tree = &config.tree_resolved;
        let source = FsFragmentSource::with_extension(tree.source_dir.clone(), &tree.extension);
        Self::open(Arc::new(source), PanelOptions::from(config))
    }

    /// Synchronise with a newly displayed page.
    ///
    /// Loads the index chunks the page needs, then resolves its path,
    /// fetching fragments as the controller asks for them.
    pub fn page_displayed(&mut self, page_id: &str) -> &SyncState {
        if self.controller.is_enabled() {
            self.load_index_chunks(page_id);
        }

        let mut step = self
            .controller
            .page_displayed(page_id, &self.index, &self.store);
        while let SyncStep::Fetch(request) = step {
            let fetched = self.source.fetch(request.fragment().as_str());
            if let Err(e) = self.store.install(request.fragment(), fetched) {
                tracing::debug!(error = %e, "Fragment unavailable for sync");
            }
            step = self
                .controller
                .fragment_loaded(request.generation, &self.store);
        }

        self.controller.state()
    }

    /// Load the chunks holding `page_id` and its anchorless document.
    fn load_index_chunks(&mut self, page_id: &str) {
        let document = page_id.split_once('#').map(|(document, _)| document);
        for key in std::iter::once(page_id).chain(document) {
            let Some(number) = self.index.chunk_for(key) else {
                continue;
            };
            if self.index.is_chunk_loaded(number) {
                continue;
            }
            match self.fetch_chunk(number) {
                Ok(chunk) => self.index.insert_chunk(chunk),
                Err(e) => tracing::warn!(chunk = number, error = %e, "Failed to load index chunk"),
            }
        }
    }

    fn fetch_chunk(&self, number: usize) -> Result<IndexChunk, PanelError> {
        let fragment = IndexChunk::fragment_id(&self.options.index_variable, number);
        let raw = self.source.fetch(fragment.as_str())?;
        let chunk = IndexChunk::parse(&self.options.index_variable, number, &raw)?;
        Ok(chunk.rebased(&self.options.index_root))
    }

    /// Open a branch, loading its children if needed.
    ///
    /// A failed load leaves the branch closed and marked as failed.
    pub fn expand(&mut self, path: &NodePath) -> Result<(), TreeError> {
        let handle = match self.store.children(path)? {
            ChildrenView::Leaf => return Ok(()),
            ChildrenView::Inline(_) => None,
            ChildrenView::Deferred(handle) | ChildrenView::LoadFailed { handle, .. } => Some(handle),
        };
        if let Some(handle) = handle {
            self.store.resolve_deferred(&handle, self.source.as_ref())?;
        }
        self.controller.expand(path.clone());
        Ok(())
    }

    /// Close a branch.
    pub fn collapse(&mut self, path: &NodePath) -> bool {
        self.controller.collapse(path)
    }

    /// Flip synchronisation and return the new setting.
    pub fn toggle_sync(&mut self) -> bool {
        self.controller.toggle()
    }

    /// Tooltip of the sync control in its current state.
    #[must_use]
    pub fn toggle_label(&self) -> &str {
        self.toggle.label(self.controller.is_enabled())
    }

    /// True if the panel follows the displayed page.
    #[must_use]
    pub fn is_sync_enabled(&self) -> bool {
        self.controller.is_enabled()
    }

    /// Sync state.
    #[must_use]
    pub fn state(&self) -> &SyncState {
        self.controller.state()
    }

    /// Highlighted node.
    #[must_use]
    pub fn selected(&self) -> Option<&NodePath> {
        self.controller.selected()
    }

    /// Tree store.
    #[must_use]
    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    /// Flat index.
    #[must_use]
    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    /// Sync controller.
    #[must_use]
    pub fn controller(&self) -> &SyncController {
        &self.controller
    }

    /// Visible rows in display order.
    #[must_use]
    pub fn rows(&self) -> Vec<PanelRow> {
        let mut rows = Vec::new();
        self.collect_rows(self.store.roots(), &NodePath::root(), &mut rows);
        rows
    }

    fn collect_rows(&self, siblings: &[TreeNode], parent: &NodePath, rows: &mut Vec<PanelRow>) {
        for (i, node) in siblings.iter().enumerate() {
            let path = parent.child(i);
            let expanded = self.controller.is_expanded(&path);
            let (state, open) = match self.store.children(&path) {
                Ok(ChildrenView::Inline(children)) if expanded => (RowState::Expanded, Some(children)),
                Ok(ChildrenView::Inline(_) | ChildrenView::Deferred(_)) => (RowState::Collapsed, None),
                Ok(ChildrenView::LoadFailed { message, .. }) => (
                    RowState::LoadFailed {
                        message: message.to_owned(),
                    },
                    None,
                ),
                Ok(ChildrenView::Leaf) | Err(_) => (RowState::Leaf, None),
            };

            rows.push(PanelRow {
                depth: path.depth() - 1,
                title: node.title.clone(),
                target: node.target.clone(),
                state,
                selected: self.controller.selected() == Some(&path),
                path: path.clone(),
            });

            if let Some(children) = open {
                self.collect_rows(children, &path, rows);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use navtree_storage::{MockFragmentSource, StorageErrorKind};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::controller::SyncError;

    const NAVTREEDATA: &str = r#"var NAVTREE =
[
  [ "Intro", "intro.html", null ],
  [ "Reference", "ref.html", "ref_fragment" ]
];

var NAVTREEINDEX =
[
"intro.html"
];

var SYNCONMSG = 'click to disable panel synchronisation';
var SYNCOFFMSG = 'click to enable panel synchronisation';
"#;

    const NAVTREEINDEX0: &str = r#"var NAVTREEINDEX0 =
{
"classx.html":[1,0],
"intro.html":[0],
"ref.html":[1]
};
"#;

    const REF_FRAGMENT: &str = r#"var ref_fragment =
[
  [ "Class X", "classx.html", null ]
];"#;

    fn scenario_source() -> Arc<MockFragmentSource> {
        Arc::new(
            MockFragmentSource::new()
                .with_fragment("navtreedata", NAVTREEDATA)
                .with_fragment("navtreeindex0", NAVTREEINDEX0)
                .with_fragment("ref_fragment", REF_FRAGMENT),
        )
    }

    /// The scenario forest has two top-level nodes, so its chunk holds
    /// full paths.
    fn open(source: &Arc<MockFragmentSource>) -> Panel {
        let shared: Arc<MockFragmentSource> = Arc::clone(source);
        let options = PanelOptions {
            index_root: NodePath::root(),
            ..PanelOptions::default()
        };
        Panel::open(shared, options).unwrap()
    }

    fn titles(rows: &[PanelRow]) -> Vec<&str> {
        rows.iter().map(|row| row.title.as_str()).collect()
    }

    #[test]
    fn test_open_shows_collapsed_roots() {
        let source = scenario_source();
        let panel = open(&source);

        let rows = panel.rows();

        assert_eq!(titles(&rows), vec!["Intro", "Reference"]);
        assert_eq!(rows[0].state, RowState::Leaf);
        assert_eq!(rows[1].state, RowState::Collapsed);
        assert_eq!(source.fetches(), vec!["navtreedata"]);
        assert_eq!(panel.index().chunk_count(), 1);
    }

    #[test]
    fn test_page_displayed_syncs_scenario() {
        let source = scenario_source();
        let mut panel = open(&source);

        let state = panel.page_displayed("classx.html").clone();

        assert_eq!(state, SyncState::Synced);
        assert_eq!(panel.selected(), Some(&NodePath::from([1, 0])));
        assert_eq!(source.fetch_count("ref_fragment"), 1);
        assert_eq!(source.fetch_count("navtreeindex0"), 1);

        let rows = panel.rows();
        assert_eq!(titles(&rows), vec!["Intro", "Reference", "Class X"]);
        assert_eq!(rows[1].state, RowState::Expanded);
        assert_eq!(rows[2].depth, 1);
        assert!(rows[2].selected);
        assert!(!rows[1].selected);
    }

    #[test]
    fn test_repeated_events_reuse_loaded_data() {
        let source = scenario_source();
        let mut panel = open(&source);

        panel.page_displayed("classx.html");
        panel.page_displayed("intro.html");
        panel.page_displayed("classx.html");

        assert_eq!(source.fetch_count("ref_fragment"), 1);
        assert_eq!(source.fetch_count("navtreeindex0"), 1);
        assert_eq!(panel.selected(), Some(&NodePath::from([1, 0])));
    }

    #[test]
    fn test_unindexed_page_fails_without_touching_tree() {
        let source = scenario_source();
        let mut panel = open(&source);
        panel.page_displayed("intro.html");

        let state = panel.page_displayed("orphan.html").clone();

        assert_eq!(
            state,
            SyncState::SyncFailed(SyncError::TargetNotIndexed {
                page_id: "orphan.html".to_owned()
            })
        );
        assert_eq!(panel.selected(), Some(&NodePath::from([0])));
    }

    #[test]
    fn test_missing_index_chunk_degrades_sync() {
        let source = Arc::new(
            MockFragmentSource::new()
                .with_fragment("navtreedata", NAVTREEDATA)
                .with_fragment("ref_fragment", REF_FRAGMENT),
        );
        let mut panel = open(&source);

        let state = panel.page_displayed("classx.html").clone();

        assert!(matches!(
            state,
            SyncState::SyncFailed(SyncError::TargetNotIndexed { .. })
        ));
        assert_eq!(panel.rows().len(), 2);
    }

    #[test]
    fn test_failed_fragment_shows_error_row() {
        let source = Arc::new(
            MockFragmentSource::new()
                .with_fragment("navtreedata", NAVTREEDATA)
                .with_fragment("navtreeindex0", NAVTREEINDEX0)
                .with_failure("ref_fragment", StorageErrorKind::NotFound),
        );
        let mut panel = open(&source);

        let state = panel.page_displayed("classx.html").clone();

        assert!(matches!(
            state,
            SyncState::SyncFailed(SyncError::FragmentLoadFailed { .. })
        ));
        let rows = panel.rows();
        assert!(matches!(rows[1].state, RowState::LoadFailed { .. }));
        assert_eq!(panel.selected(), None);
    }

    #[test]
    fn test_expand_retries_failed_fragment() {
        let source = Arc::new(
            MockFragmentSource::new()
                .with_fragment("navtreedata", NAVTREEDATA)
                .with_failure("ref_fragment", StorageErrorKind::Unavailable),
        );
        let mut panel = open(&source);
        let reference = NodePath::from([1]);

        assert!(panel.expand(&reference).is_err());
        assert!(matches!(panel.rows()[1].state, RowState::LoadFailed { .. }));

        source.set_fragment("ref_fragment", REF_FRAGMENT);
        panel.expand(&reference).unwrap();

        let rows = panel.rows();
        assert_eq!(titles(&rows), vec!["Intro", "Reference", "Class X"]);
        assert_eq!(rows[1].state, RowState::Expanded);
        assert_eq!(source.fetch_count("ref_fragment"), 2);
    }

    #[test]
    fn test_collapse_hides_children_but_keeps_selection() {
        let source = scenario_source();
        let mut panel = open(&source);
        panel.page_displayed("classx.html");

        assert!(panel.collapse(&NodePath::from([1])));

        let rows = panel.rows();
        assert_eq!(titles(&rows), vec!["Intro", "Reference"]);
        assert_eq!(rows[1].state, RowState::Collapsed);
        assert_eq!(panel.selected(), Some(&NodePath::from([1, 0])));
    }

    #[test]
    fn test_expand_leaf_is_noop() {
        let source = scenario_source();
        let mut panel = open(&source);

        panel.expand(&NodePath::from([0])).unwrap();

        assert!(!panel.controller().is_expanded(&NodePath::from([0])));
    }

    #[test]
    fn test_expand_invalid_path() {
        let source = scenario_source();
        let mut panel = open(&source);

        let err = panel.expand(&NodePath::from([9])).unwrap_err();

        assert!(matches!(err, TreeError::InvalidPath(_)));
    }

    #[test]
    fn test_toggle_sync_changes_label_and_ignores_events() {
        let source = scenario_source();
        let mut panel = open(&source);
        assert_eq!(panel.toggle_label(), "click to disable panel synchronisation");

        assert!(!panel.toggle_sync());
        let state = panel.page_displayed("classx.html").clone();

        assert_eq!(panel.toggle_label(), "click to enable panel synchronisation");
        assert_eq!(state, SyncState::Idle);
        assert_eq!(source.fetches(), vec!["navtreedata"]);
    }

    #[test]
    fn test_open_without_boundaries_indexes_inline_tree() {
        let source = Arc::new(MockFragmentSource::new().with_fragment(
            "navtreedata",
            r#"var NAVTREE = [["Main","index.html",[["Page","page.html",null]]]];"#,
        ));
        let mut panel = open(&source);

        panel.page_displayed("page.html");

        assert_eq!(panel.selected(), Some(&NodePath::from([0, 0])));
        assert_eq!(panel.toggle_label(), "click to disable panel synchronisation");
    }

    #[test]
    fn test_generated_chunk_paths_start_below_main_page() {
        let source: Arc<dyn FragmentSource> = Arc::new(
            MockFragmentSource::new()
                .with_fragment(
                    "navtreedata",
                    r#"var NAVTREE =
[
  [ "Main", "index.html", [
    [ "Examples", "index.html#examples", null ],
    [ "Ref", "ref.html", null ]
  ] ]
];

var NAVTREEINDEX =
[
"index.html"
];"#,
                )
                .with_fragment(
                    "navtreeindex0",
                    r#"var NAVTREEINDEX0 =
{
"index.html":[],
"index.html#examples":[0],
"ref.html":[1]
};"#,
                ),
        );
        let mut panel = Panel::open(source, PanelOptions::default()).unwrap();

        assert_eq!(panel.page_displayed("index.html"), &SyncState::Synced);
        assert_eq!(panel.selected(), Some(&NodePath::from([0])));

        assert_eq!(panel.page_displayed("ref.html"), &SyncState::Synced);
        assert_eq!(panel.selected(), Some(&NodePath::from([0, 1])));

        assert_eq!(panel.page_displayed("index.html#examples"), &SyncState::Synced);
        assert_eq!(panel.selected(), Some(&NodePath::from([0, 0])));
        assert_eq!(titles(&panel.rows()), vec!["Main", "Examples", "Ref"]);
    }

    #[test]
    fn test_open_missing_root_fragment() {
        let source: Arc<dyn FragmentSource> = Arc::new(MockFragmentSource::new());

        let err = Panel::open(source, PanelOptions::default()).unwrap_err();

        assert!(matches!(err, PanelError::Storage(_)));
    }

    #[test]
    fn test_open_malformed_root_fragment() {
        let source: Arc<dyn FragmentSource> = Arc::new(
            MockFragmentSource::new().with_fragment("navtreedata", "var NAVTREE = [[1, 2, 3]];"),
        );

        let err = Panel::open(source, PanelOptions::default()).unwrap_err();

        assert!(matches!(err, PanelError::Fragment(_)));
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.sync.enabled = false;
        config.tree_resolved.root_variable = "MENU".to_owned();

        let options = PanelOptions::from(&config);

        assert!(!options.sync_enabled);
        assert_eq!(options.root_variable, "MENU");
        assert_eq!(options.index_root, NodePath::from([0]));
        assert_eq!(options.root_fragment, "navtreedata");
    }

    #[test]
    fn test_from_config_reads_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("navtreedata.js"), NAVTREEDATA).unwrap();
        std::fs::write(dir.path().join("navtreeindex0.js"), NAVTREEINDEX0).unwrap();
        std::fs::write(dir.path().join("ref_fragment.js"), REF_FRAGMENT).unwrap();
        let mut config = Config::default();
        config.tree_resolved.source_dir = dir.path().to_path_buf();
        config.tree_resolved.index_root = Vec::new();

        let mut panel = Panel::from_config(&config).unwrap();
        panel.page_displayed("classx.html");

        assert_eq!(panel.selected(), Some(&NodePath::from([1, 0])));
    }

    #[test]
    fn test_rows_serialize() {
        let source = scenario_source();
        let mut panel = open(&source);
        panel.page_displayed("classx.html");

        let json = serde_json::to_value(panel.rows()).unwrap();

        assert_eq!(
            json[2],
            serde_json::json!({
                "path": [1, 0],
                "depth": 1,
                "title": "Class X",
                "target": "classx.html",
                "state": { "kind": "leaf" },
                "selected": true
            })
        );
        assert_eq!(json[1]["state"]["kind"], "expanded");
    }
}
