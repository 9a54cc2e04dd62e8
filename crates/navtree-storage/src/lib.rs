//! Fragment storage abstraction for navtree.
//!
//! Navigation data for a documentation site is split into fragments: the root
//! fragment holding the top of the tree, lazily loaded subtree fragments, and
//! the chunks of the flat index. This crate provides a [`FragmentSource`] trait
//! that hides where those fragments come from.
//!
//! # Architecture
//!
//! The crate provides:
//! - [`FragmentSource`] trait with `fetch()` and `exists()` methods
//! - [`FsFragmentSource`] reading `<id>.js` files from a directory
//! - [`MockFragmentSource`] for testing (behind `mock` feature flag)
//!
//! # Example
//!
//! ```ignore
//! use std::path::PathBuf;
//! use navtree_storage::{FragmentSource, FsFragmentSource};
//!
//! let source = FsFragmentSource::new(PathBuf::from("html"));
//! let raw = source.fetch("navtreedata")?;
//! ```

mod fs;
#[cfg(feature = "mock")]
mod mock;
mod storage;

pub use fs::FsFragmentSource;
#[cfg(feature = "mock")]
pub use mock::MockFragmentSource;
pub use storage::{ErrorStatus, FragmentSource, StorageError, StorageErrorKind};
