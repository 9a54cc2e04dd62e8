//! Filesystem fragment source.
//!
//! Provides [`FsFragmentSource`] for reading generated navigation fragments
//! (`navtreedata.js`, `navtreeindex0.js`, ...) from an output directory.

use std::fs;
use std::path::PathBuf;

use crate::storage::{FragmentSource, StorageError, validate_id};

/// Backend identifier for error messages.
const BACKEND: &str = "Fs";

/// Default fragment file extension.
const DEFAULT_EXTENSION: &str = "js";

/// Filesystem fragment source.
///
/// Maps a fragment identifier `id` to the file `<dir>/<id>.<extension>`.
///
/// # Example
///
/// ```ignore
/// use std::path::PathBuf;
/// use navtree_storage::{FragmentSource, FsFragmentSource};
///
/// let source = FsFragmentSource::new(PathBuf::from("html"));
/// let raw = source.fetch("navtreedata")?;
/// ```
#[derive(Debug)]
pub struct FsFragmentSource {
    /// Directory containing fragment files.
    dir: PathBuf,
    /// File extension without the leading dot.
    extension: String,
}

impl FsFragmentSource {
    /// Create a new filesystem source reading `.js` files.
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory containing the generated fragment files
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self::with_extension(dir, DEFAULT_EXTENSION)
    }

    /// Create a new filesystem source with a custom file extension.
    ///
    /// A leading dot in `extension` is ignored.
    #[must_use]
    pub fn with_extension(dir: PathBuf, extension: &str) -> Self {
        Self {
            dir,
            extension: extension.trim_start_matches('.').to_owned(),
        }
    }

    /// Directory this source reads from.
    #[must_use]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Resolve a fragment identifier to its file path.
    fn fragment_path(&self, id: &str) -> Result<PathBuf, StorageError> {
        validate_id(id).map_err(|e| e.with_backend(BACKEND))?;
        let file_name = if self.extension.is_empty() {
            id.to_owned()
        } else {
            format!("{id}.{}", self.extension)
        };
        Ok(self.dir.join(file_name))
    }
}

impl FragmentSource for FsFragmentSource {
    fn fetch(&self, id: &str) -> Result<String, StorageError> {
        let path = self.fragment_path(id)?;
        tracing::debug!(fragment = id, path = %path.display(), "Reading fragment");
        fs::read_to_string(&path).map_err(|e| {
            StorageError::io(e, path.as_path())
                .with_fragment(id)
                .with_backend(BACKEND)
        })
    }

    fn exists(&self, id: &str) -> bool {
        self.fragment_path(id).is_ok_and(|path| path.is_file())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;
    use crate::StorageErrorKind;

    fn assert_send_sync<T: Send + Sync>() {}

    fn create_test_dir() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn test_fs_source_is_send_sync() {
        assert_send_sync::<FsFragmentSource>();
    }

    #[test]
    fn test_fetch_existing_fragment() {
        let temp_dir = create_test_dir();
        fs::write(
            temp_dir.path().join("navtreedata.js"),
            "var NAVTREE = [];",
        )
        .unwrap();

        let source = FsFragmentSource::new(temp_dir.path().to_path_buf());
        let raw = source.fetch("navtreedata").unwrap();

        assert_eq!(raw, "var NAVTREE = [];");
    }

    #[test]
    fn test_fetch_with_custom_extension() {
        let temp_dir = create_test_dir();
        fs::write(temp_dir.path().join("files_dup.json"), "[]").unwrap();

        let source = FsFragmentSource::with_extension(temp_dir.path().to_path_buf(), ".json");

        assert_eq!(source.fetch("files_dup").unwrap(), "[]");
    }

    #[test]
    fn test_fetch_missing_fragment() {
        let temp_dir = create_test_dir();

        let source = FsFragmentSource::new(temp_dir.path().to_path_buf());
        let err = source.fetch("annotated_dup").unwrap_err();

        assert_eq!(err.kind, StorageErrorKind::NotFound);
        assert_eq!(err.backend, Some("Fs"));
        assert_eq!(err.fragment.as_deref(), Some("annotated_dup"));
        assert_eq!(
            err.path.as_deref(),
            Some(temp_dir.path().join("annotated_dup.js").as_path())
        );
    }

    #[test]
    fn test_fetch_rejects_path_traversal() {
        let temp_dir = create_test_dir();

        let source = FsFragmentSource::new(temp_dir.path().join("html"));
        let err = source.fetch("../secret").unwrap_err();

        assert_eq!(err.kind, StorageErrorKind::InvalidId);
        assert_eq!(err.backend, Some("Fs"));
    }

    #[test]
    fn test_exists() {
        let temp_dir = create_test_dir();
        fs::write(temp_dir.path().join("concepts.js"), "var concepts = [];").unwrap();
        fs::create_dir(temp_dir.path().join("search.js")).unwrap();

        let source = FsFragmentSource::new(temp_dir.path().to_path_buf());

        assert!(source.exists("concepts"));
        assert!(!source.exists("classes"));
        assert!(!source.exists("search"));
        assert!(!source.exists("../concepts"));
    }

    #[test]
    fn test_dir_accessor() {
        let source = FsFragmentSource::new(PathBuf::from("/site/html"));

        assert_eq!(source.dir(), Path::new("/site/html"));
    }
}
