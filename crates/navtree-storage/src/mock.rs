//! Mock fragment source for testing.
//!
//! Provides [`MockFragmentSource`] for unit testing without filesystem access.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use crate::storage::{FragmentSource, StorageError, StorageErrorKind};

/// Mock fragment source for testing.
///
/// Stores fragment bodies in memory and records every fetch, so tests can
/// assert how many times a fragment was loaded.
///
/// # Example
///
/// ```ignore
/// use navtree_storage::{FragmentSource, MockFragmentSource};
///
/// let source = MockFragmentSource::new()
///     .with_fragment("ref_fragment", r#"[["Class X", "classx.html", null]]"#);
///
/// let raw = source.fetch("ref_fragment").unwrap();
/// assert_eq!(source.fetch_count("ref_fragment"), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockFragmentSource {
    fragments: RwLock<HashMap<String, String>>,
    failures: RwLock<HashMap<String, StorageErrorKind>>,
    fetches: Mutex<Vec<String>>,
}

impl MockFragmentSource {
    /// Create a new empty mock source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment body.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_fragment(self, id: impl Into<String>, body: impl Into<String>) -> Self {
        self.fragments
            .write()
            .unwrap()
            .insert(id.into(), body.into());
        self
    }

    /// Make fetching a fragment fail with the given kind.
    ///
    /// Takes precedence over a body registered with [`with_fragment`](Self::with_fragment).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_failure(self, id: impl Into<String>, kind: StorageErrorKind) -> Self {
        self.failures.write().unwrap().insert(id.into(), kind);
        self
    }

    /// Replace or add a fragment body after construction.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_fragment(&self, id: impl Into<String>, body: impl Into<String>) {
        let id = id.into();
        self.failures.write().unwrap().remove(&id);
        self.fragments.write().unwrap().insert(id, body.into());
    }

    /// Number of times a fragment was fetched.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn fetch_count(&self, id: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|f| *f == id)
            .count()
    }

    /// All fetched identifiers in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

impl FragmentSource for MockFragmentSource {
    fn fetch(&self, id: &str) -> Result<String, StorageError> {
        self.fetches.lock().unwrap().push(id.to_owned());

        if let Some(kind) = self.failures.read().unwrap().get(id) {
            return Err(StorageError::new(*kind)
                .with_fragment(id)
                .with_backend("Mock"));
        }

        self.fragments
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(id).with_backend("Mock"))
    }

    fn exists(&self, id: &str) -> bool {
        !self.failures.read().unwrap().contains_key(id)
            && self.fragments.read().unwrap().contains_key(id)
    }
}
