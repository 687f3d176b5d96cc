//! Temporary storage for uploaded files
//!
//! Each multipart file part is written to `upload_dir/<uuid>` and wrapped in a
//! [`FileItem`]. A `FileItem` removes its file exactly once: either through
//! [`FileItem::release`], which consumes the item, or on drop if it was never
//! released (a failed multipart read, a panicking dispatch, a cancelled request).

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Upload storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create upload directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to write upload {filename}: {source}")]
    Write { filename: String, source: io::Error },
}

/// One uploaded file awaiting classification
#[derive(Debug)]
pub struct FileItem {
    filename: String,
    content_type: Option<String>,
    path: PathBuf,
    released: bool,
}

impl FileItem {
    /// Wrap an existing file; the item takes ownership of removing it
    pub fn new(filename: impl Into<String>, content_type: Option<String>, path: PathBuf) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            path,
            released: false,
        }
    }

    /// Original client-side filename
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Location of the temporary file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    /// Remove the temporary file
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Released upload"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove upload"),
        }
    }
}

impl Drop for FileItem {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Released upload on drop"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove upload"),
        }
    }
}

/// Writes uploads into a single directory
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if missing
    pub async fn ensure_dir(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: self.dir.clone(),
                source,
            })
    }

    /// Create an empty upload file
    ///
    /// The returned item already owns the file, so a write that fails halfway
    /// still gets cleaned up when the item is dropped.
    pub async fn create(
        &self,
        filename: &str,
        content_type: Option<String>,
    ) -> Result<(FileItem, tokio::fs::File), StorageError> {
        let path = self.dir.join(Uuid::new_v4().to_string());
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|source| StorageError::Write {
                filename: filename.to_string(),
                source,
            })?;
        Ok((FileItem::new(filename, content_type, path), file))
    }

    /// Store a complete in-memory file
    pub async fn store(
        &self,
        filename: &str,
        content_type: Option<String>,
        bytes: &[u8],
    ) -> Result<FileItem, StorageError> {
        let (item, mut file) = self.create(filename, content_type).await?;
        let write = async {
            file.write_all(bytes).await?;
            file.flush().await
        };
        write.await.map_err(|source| StorageError::Write {
            filename: filename.to_string(),
            source,
        })?;
        Ok(item)
    }
}
