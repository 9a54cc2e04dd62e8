//! Fragment source trait and error types.
//!
//! Provides the core [`FragmentSource`] trait for fetching navigation fragments,
//! along with [`StorageError`] for unified error handling across backends.
//!
//! # Fragment Identifiers
//!
//! All `id` parameters are **fragment identifiers**, not file paths:
//! - `"navtreedata"` - root fragment with the top of the tree and the index boundaries
//! - `"namespaces_dup"` - a lazily loaded subtree
//! - `"navtreeindex0"` - first chunk of the flat index
//!
//! Backends map identifiers to their internal storage format.

use std::path::PathBuf;

/// What went wrong, independent of the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageErrorKind {
    /// No fragment with this identifier.
    NotFound,
    /// Fragment exists but may not be read.
    PermissionDenied,
    /// Identifier is not a valid fragment name.
    InvalidId,
    /// Backend cannot serve fragments right now.
    Unavailable,
    /// Fetch took too long.
    Timeout,
    /// Anything else.
    Other,
}

impl StorageErrorKind {
    fn label(self) -> &'static str {
        match self {
            Self::NotFound => "Fragment not found",
            Self::PermissionDenied => "Access denied",
            Self::InvalidId => "Invalid fragment id",
            Self::Unavailable => "Source unavailable",
            Self::Timeout => "Fetch timed out",
            Self::Other => "Fetch failed",
        }
    }
}

impl From<std::io::ErrorKind> for StorageErrorKind {
    fn from(kind: std::io::ErrorKind) -> Self {
        use std::io::ErrorKind;
        match kind {
            ErrorKind::NotFound | ErrorKind::IsADirectory => Self::NotFound,
            ErrorKind::PermissionDenied => Self::PermissionDenied,
            ErrorKind::TimedOut => Self::Timeout,
            ErrorKind::WouldBlock | ErrorKind::ResourceBusy => Self::Unavailable,
            _ => Self::Other,
        }
    }
}

/// Whether fetching again may succeed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ErrorStatus {
    /// Same request will fail the same way.
    #[default]
    Permanent,
    /// Transient condition; a later fetch may succeed.
    Temporary,
}

/// Failure to fetch a fragment.
///
/// Carries the kind, the retry status and whatever context the backend had:
/// fragment id, resolved location, backend name and the underlying error.
#[derive(Debug)]
pub struct StorageError {
    /// Error category.
    pub kind: StorageErrorKind,
    /// Retry status.
    pub status: ErrorStatus,
    /// Fragment being fetched.
    pub fragment: Option<String>,
    /// Location the backend resolved the fragment to.
    pub path: Option<PathBuf>,
    /// Backend name ("Fs", "Mock").
    pub backend: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    /// Create an error of the given kind without context.
    #[must_use]
    pub fn new(kind: StorageErrorKind) -> Self {
        Self {
            kind,
            status: ErrorStatus::default(),
            fragment: None,
            path: None,
            backend: None,
            source: None,
        }
    }

    /// Missing fragment.
    #[must_use]
    pub fn not_found(fragment: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::NotFound).with_fragment(fragment)
    }

    /// Error from reading a fragment file at `path`.
    ///
    /// Timeouts and interrupted reads are marked temporary.
    #[must_use]
    pub fn io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        let status = if matches!(
            err.kind(),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
        ) {
            ErrorStatus::Temporary
        } else {
            ErrorStatus::Permanent
        };
        Self::new(err.kind().into())
            .with_status(status)
            .with_path(path)
            .with_source(err)
    }

    /// Set the fragment identifier.
    #[must_use]
    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// Set the resolved location.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the backend name.
    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the retry status.
    #[must_use]
    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Underlying error as a concrete type.
    #[must_use]
    pub fn downcast_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_deref()?.downcast_ref()
    }

    /// True if a later fetch may succeed.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.status == ErrorStatus::Temporary
    }
}

impl std::fmt::Display for StorageError {
    /// `[Backend] Kind: source (fragment: id)`, falling back to the path
    /// when no fragment id is known.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }
        f.write_str(self.kind.label())?;
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        match (&self.fragment, &self.path) {
            (Some(fragment), _) => write!(f, " (fragment: {fragment})"),
            (None, Some(path)) => write!(f, " (path: {})", path.display()),
            (None, None) => Ok(()),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

/// Source of navigation fragments.
///
/// Fragments are read-only from the consumer's point of view: a source is
/// asked for the raw text of a fragment and never written to. Parsing the
/// text is the consumer's job (`navtree::fragment`).
pub trait FragmentSource: Send + Sync {
    /// Fetch the raw text of a fragment.
    ///
    /// # Arguments
    ///
    /// * `id` - Fragment identifier (e.g., "navtreedata", "namespaces_dup")
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the fragment doesn't exist or can't be read.
    fn fetch(&self, id: &str) -> Result<String, StorageError>;

    /// Check if a fragment exists.
    ///
    /// Returns `false` on errors (treats errors as "doesn't exist").
    fn exists(&self, id: &str) -> bool {
        self.fetch(id).is_ok()
    }
}

/// Validate a fragment identifier.
///
/// Identifiers are bare names: no separators, no parent references, not empty.
pub(crate) fn validate_id(id: &str) -> Result<(), StorageError> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0'])
        && !id.starts_with('.');

    if valid {
        Ok(())
    } else {
        Err(StorageError::new(StorageErrorKind::InvalidId).with_fragment(id))
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::Path;

    use super::*;

    #[test]
    fn test_not_found_names_fragment() {
        let err = StorageError::not_found("annotated_dup");

        assert_eq!(err.kind, StorageErrorKind::NotFound);
        assert_eq!(err.status, ErrorStatus::Permanent);
        assert_eq!(err.fragment.as_deref(), Some("annotated_dup"));
        assert_eq!(err.to_string(), "Fragment not found (fragment: annotated_dup)");
    }

    #[test]
    fn test_io_maps_kind_and_keeps_source() {
        let err = StorageError::io(
            io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
            "/html/files_dup.js",
        );

        assert_eq!(err.kind, StorageErrorKind::PermissionDenied);
        assert!(!err.is_temporary());
        assert_eq!(err.path.as_deref(), Some(Path::new("/html/files_dup.js")));
        assert!(err.downcast_source::<io::Error>().is_some());
    }

    #[test]
    fn test_io_timeout_is_temporary() {
        let err = StorageError::io(io::Error::new(io::ErrorKind::TimedOut, "slow disk"), "/html/a.js");

        assert_eq!(err.kind, StorageErrorKind::Timeout);
        assert!(err.is_temporary());
    }

    #[test]
    fn test_io_kind_mapping() {
        assert_eq!(StorageErrorKind::from(io::ErrorKind::NotFound), StorageErrorKind::NotFound);
        assert_eq!(StorageErrorKind::from(io::ErrorKind::WouldBlock), StorageErrorKind::Unavailable);
        assert_eq!(StorageErrorKind::from(io::ErrorKind::InvalidData), StorageErrorKind::Other);
    }

    #[test]
    fn test_display_prefers_fragment_over_path() {
        let err = StorageError::io(io::Error::new(io::ErrorKind::NotFound, "no such file"), "/html/files_dup.js")
            .with_backend("Fs")
            .with_fragment("files_dup");

        assert_eq!(
            err.to_string(),
            "[Fs] Fragment not found: no such file (fragment: files_dup)"
        );
    }

    #[test]
    fn test_display_falls_back_to_path() {
        let err = StorageError::new(StorageErrorKind::Other).with_path("/html/a.js");

        assert_eq!(err.to_string(), "Fetch failed (path: /html/a.js)");
    }

    #[test]
    fn test_error_source_is_exposed() {
        let err = StorageError::new(StorageErrorKind::Unavailable)
            .with_status(ErrorStatus::Temporary)
            .with_source(io::Error::other("mount gone"));

        let source = std::error::Error::source(&err).map(ToString::to_string);

        assert_eq!(source.as_deref(), Some("mount gone"));
        assert!(err.is_temporary());
    }

    #[test]
    fn test_validate_id_accepts_generated_names() {
        assert!(validate_id("navtreedata").is_ok());
        assert!(validate_id("navtreeindex12").is_ok());
        assert!(validate_id("classfcarouge_1_1typed__matrix").is_ok());
    }

    #[test]
    fn test_validate_id_rejects_traversal() {
        for id in ["", ".", "..", "../etc/passwd", "a/b", "a\\b", ".hidden"] {
            let err = validate_id(id).unwrap_err();
            assert_eq!(err.kind, StorageErrorKind::InvalidId, "id {id:?}");
        }
    }
}
