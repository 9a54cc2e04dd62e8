//! Navigation tree model for documentation panels.
//!
//! Generated documentation ships its navigation hierarchy as a root fragment
//! plus many subtree fragments loaded on demand. This crate models that data:
//!
//! - [`TreeStore`] holds the base forest and a cache of resolved fragments
//! - [`FlatIndex`] maps a displayed page to its [`NodePath`] in the tree
//! - [`fragment`] parses the `var NAME = value;` fragment format
//!
//! Loading goes through [`navtree_storage::FragmentSource`]; nothing here
//! performs I/O on its own except [`TreeStore::resolve_deferred`], which
//! calls the source it is given.
//!
//! # Example
//!
//! ```ignore
//! use navtree::{ChildrenView, FlatIndex, NodePath, TreeStore, parse_subtree};
//! use navtree_storage::FsFragmentSource;
//!
//! let source = FsFragmentSource::new("html".into());
//! let roots = parse_subtree("navtreedata", &std::fs::read_to_string("html/navtreedata.js")?)?;
//! let mut store = TreeStore::new(roots);
//!
//! if let ChildrenView::Deferred(handle) = store.children(&NodePath::from([1]))? {
//!     store.resolve_deferred(&handle, &source)?;
//! }
//! let index = FlatIndex::from_store(&store);
//! ```

pub mod fragment;
mod index;
mod node;
mod path;
mod store;

pub use fragment::{FragmentError, ParsedFragment, parse_subtree};
pub use index::{FlatIndex, IndexChunk, IndexEntry, IndexMatch};
pub use node::{Children, FragmentId, TreeNode};
pub use path::NodePath;
pub use store::{ChildrenView, DeferredHandle, Resolution, TreeError, TreeStore};
