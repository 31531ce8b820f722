use async_trait::async_trait;
use std::path::Path;

use super::FsError;

/// Result of a verified copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedFile {
    pub bytes: u64,
    /// Hex SHA-256 of the copied content.
    pub sha256: String,
}

/// Scoped filesystem primitives.
///
/// Each call either succeeds or fails as a whole from the caller's point of
/// view; no partial-state guarantee is made beyond the filesystem's own.
#[async_trait]
pub trait FileOps: Send + Sync {
    /// Create `path` and any missing parents. Succeeds if it already exists.
    async fn create_dir_all(&self, path: &Path) -> Result<(), FsError>;

    async fn exists(&self, path: &Path) -> Result<bool, FsError>;

    /// Copy `source` to `destination`, overwriting it. The destination
    /// appears whole or not at all.
    async fn copy(&self, source: &Path, destination: &Path) -> Result<CopiedFile, FsError>;

    /// Atomically replace `destination` with `source`, consuming `source`.
    async fn replace(&self, source: &Path, destination: &Path) -> Result<(), FsError>;
}
