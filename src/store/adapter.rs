use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by content store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `create` was called for a path that already holds a file.
    #[error("File already exists: {0}")]
    AlreadyExists(String),

    /// `remove`/`rename` was called for a path with no file behind it.
    #[error("No such file: {0}")]
    NotFound(String),

    /// Absolute paths and `..` segments are rejected before touching storage.
    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A hierarchical, path-addressed document store.
///
/// Paths are `/`-separated and relative to the store root. The engine treats
/// the store as externally mutable: files can be renamed or deleted out from
/// under it at any time, which is exactly the drift the reconciler repairs.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, StoreError>;

    /// Create a file. Fails with `AlreadyExists` if the path is taken;
    /// callers that want overwrite semantics remove the file first.
    async fn create(&self, path: &str, content: &str) -> Result<(), StoreError>;

    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), StoreError>;

    /// Create a single folder if missing. Parents must already exist; callers
    /// build folder chains one segment at a time.
    async fn ensure_folder(&self, path: &str) -> Result<(), StoreError>;
}

/// Canonical form of a store path: no leading or trailing separators.
///
/// An all-separator or empty input normalizes to the empty string (store
/// root).
pub fn normalize_path(path: &str) -> String {
    path.trim().trim_matches('/').to_string()
}

/// Reject paths that would escape the store root.
pub(crate) fn validate_path(path: &str) -> Result<(), StoreError> {
    if path.starts_with('/') || path.split('/').any(|seg| seg == "..") {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}
