//! Local filesystem implementation.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::debug;

use super::{CopiedFile, FileOps, FsError};

const BUFFER_SIZE: usize = 64 * 1024;

/// Filesystem operations on local (or locally mounted) paths.
pub struct LocalFileOps {
    verify_copies: bool,
}

impl LocalFileOps {
    pub fn new() -> Self {
        Self {
            verify_copies: true,
        }
    }

    /// Whether copies are re-read and compared against the source digest.
    pub fn with_verify_copies(mut self, verify: bool) -> Self {
        self.verify_copies = verify;
        self
    }

    /// Attempts to move a file atomically (rename).
    ///
    /// Returns `Ok(false)` when source and destination are on different
    /// filesystems.
    async fn try_atomic_move(source: &Path, destination: &Path) -> Result<bool, std::io::Error> {
        match fs::rename(source, destination).await {
            Ok(()) => Ok(true),
            Err(e) => {
                // EXDEV is 18 on Linux
                if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) {
                    Ok(false)
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn copy_hashed(source: &Path, destination: &Path) -> Result<CopiedFile, FsError> {
        let source_file = File::open(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FsError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                FsError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
            }
        })?;

        let dest_file = File::create(destination).await.map_err(|e| {
            FsError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;

        let mut reader = BufReader::with_capacity(BUFFER_SIZE, source_file);
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dest_file);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut bytes = 0u64;

        loop {
            let read = reader.read(&mut buffer).await.map_err(|e| {
                FsError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
            })?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            writer.write_all(&buffer[..read]).await.map_err(|e| {
                FsError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
            })?;
            bytes += read as u64;
        }

        writer.flush().await.map_err(|e| {
            FsError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;
        writer.get_ref().sync_all().await.map_err(|e| {
            FsError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;

        Ok(CopiedFile {
            bytes,
            sha256: format!("{:x}", hasher.finalize()),
        })
    }

    async fn sha256_of(path: &Path) -> Result<String, FsError> {
        let file = File::open(path).await.map_err(|e| FsError::ChecksumFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut hasher = Sha256::new();

        loop {
            let read = reader
                .read(&mut buffer)
                .await
                .map_err(|e| FsError::ChecksumFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    async fn copy_verified(&self, source: &Path, destination: &Path) -> Result<CopiedFile, FsError> {
        let copied = Self::copy_hashed(source, destination).await?;

        if self.verify_copies {
            let actual = Self::sha256_of(destination).await?;
            if actual != copied.sha256 {
                return Err(FsError::ChecksumMismatch {
                    path: destination.to_path_buf(),
                    expected: copied.sha256,
                    actual,
                });
            }
        }
        Ok(copied)
    }

    /// Hidden sibling of `destination` used to stage a copy or a
    /// cross-device replace.
    fn staging_path(destination: &Path) -> PathBuf {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        destination.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
    }
}

impl Default for LocalFileOps {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileOps for LocalFileOps {
    async fn create_dir_all(&self, path: &Path) -> Result<(), FsError> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| FsError::CreateDirFailed {
                path: path.to_path_buf(),
                source: e,
            })
    }

    async fn exists(&self, path: &Path) -> Result<bool, FsError> {
        fs::try_exists(path).await.map_err(|e| FsError::StatFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    async fn copy(&self, source: &Path, destination: &Path) -> Result<CopiedFile, FsError> {
        let staging = Self::staging_path(destination);
        let copied = match self.copy_verified(source, &staging).await {
            Ok(copied) => copied,
            Err(e) => {
                let _ = fs::remove_file(&staging).await;
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&staging, destination).await {
            let _ = fs::remove_file(&staging).await;
            return Err(FsError::copy_failed(
                source.to_path_buf(),
                destination.to_path_buf(),
                e,
            ));
        }

        debug!(
            "Copied {} to {} ({} bytes)",
            source.display(),
            destination.display(),
            copied.bytes
        );
        Ok(copied)
    }

    async fn replace(&self, source: &Path, destination: &Path) -> Result<(), FsError> {
        let moved = Self::try_atomic_move(source, destination)
            .await
            .map_err(|e| FsError::replace_failed(source.to_path_buf(), destination.to_path_buf(), e))?;
        if moved {
            return Ok(());
        }

        // Cross-device: stage next to the destination so the final rename
        // stays on one filesystem.
        debug!(
            "Cross-device replace of {}, staging a copy",
            destination.display()
        );
        let staging = Self::staging_path(destination);
        if let Err(e) = Self::copy_hashed(source, &staging).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&staging, destination).await {
            let _ = fs::remove_file(&staging).await;
            return Err(FsError::replace_failed(
                source.to_path_buf(),
                destination.to_path_buf(),
                e,
            ));
        }
        fs::remove_file(source)
            .await
            .map_err(|e| FsError::replace_failed(source.to_path_buf(), destination.to_path_buf(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_dir_all_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("work/nested");
        let ops = LocalFileOps::new();

        ops.create_dir_all(&dir).await.unwrap();
        ops.create_dir_all(&dir).await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_copy_reports_size_and_digest() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("R1_A_1");
        let backup = temp.path().join("R1_A_1_ORIGINAL");
        fs::write(&source, b"hello").await.unwrap();

        let copied = LocalFileOps::new().copy(&source, &backup).await.unwrap();
        assert_eq!(copied.bytes, 5);
        assert_eq!(
            copied.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(fs::read(&backup).await.unwrap(), b"hello");
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_copy_leaves_no_staging_file() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("R1_A_1");
        let backup = temp.path().join("R1_A_1_ORIGINAL");
        fs::write(&source, b"hello").await.unwrap();
        fs::write(&backup, b"older and longer content").await.unwrap();

        let ops = LocalFileOps::new();
        ops.copy(&source, &backup).await.unwrap();

        assert_eq!(fs::read(&backup).await.unwrap(), b"hello");
        assert!(ops.exists(&backup).await.unwrap());
        assert!(!ops.exists(&temp.path().join("missing")).await.unwrap());
        let mut entries = fs::read_dir(temp.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        assert_eq!(names, vec!["R1_A_1", "R1_A_1_ORIGINAL"]);
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let temp = TempDir::new().unwrap();
        let err = LocalFileOps::new()
            .copy(&temp.path().join("missing"), &temp.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::SourceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_replace_swaps_content() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("R1_A_1");
        let stamped = temp.path().join("work_R1_A_1");
        fs::write(&original, b"plain").await.unwrap();
        fs::write(&stamped, b"stamped").await.unwrap();

        LocalFileOps::new().replace(&stamped, &original).await.unwrap();

        assert_eq!(fs::read(&original).await.unwrap(), b"stamped");
        assert!(!stamped.exists());
    }

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        let staging = LocalFileOps::staging_path(Path::new("/data/pdf/R1_A_1"));
        assert_eq!(staging.parent(), Some(Path::new("/data/pdf")));
        let name = staging.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".R1_A_1."));
        assert!(name.ends_with(".tmp"));
    }
}
