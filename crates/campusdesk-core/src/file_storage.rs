//! File storage abstraction layer.
//!
//! Backends only move bytes around under string keys; fingerprinting, resizing
//! and reference tracking live in the media store built on top of this trait.
//!
//! # Example
//!
//! ```ignore
//! use campusdesk_core::file_storage::{FileStorage, LocalFileStorage};
//! use std::path::PathBuf;
//!
//! let storage = LocalFileStorage::new(
//!     PathBuf::from("./uploads"),
//!     "http://localhost:3000/media".to_string(),
//! );
//!
//! let key = storage.save("course/ab/abcdef.png", &bytes).await?;
//! let url = storage.get_url(&key)?;
//! storage.delete(&key).await?;
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::fs;

type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Abstract trait for file storage backends.
pub trait FileStorage: Send + Sync {
    /// Save file content under `key`, replacing any previous content.
    ///
    /// Returns the storage key on success.
    fn save<'a>(&'a self, key: &'a str, content: &'a [u8]) -> StorageFuture<'a, String>;

    /// Delete a file by key. A missing file is not an error.
    fn delete<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()>;

    /// Whether a file is stored under `key`.
    fn exists<'a>(&'a self, key: &'a str) -> StorageFuture<'a, bool>;

    /// Keys of the files stored directly under the `prefix` directory, sorted.
    ///
    /// A prefix with nothing stored under it yields an empty list.
    fn list<'a>(&'a self, prefix: &'a str) -> StorageFuture<'a, Vec<String>>;

    /// Get the public URL for accessing a file.
    fn get_url(&self, key: &str) -> Result<String, StorageError>;
}

/// Error type for file storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File exceeds maximum size of {max_bytes} bytes")]
    InvalidFileSize { max_bytes: usize },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resized variants were requested for bytes that are not a raster image.
    #[error("Content is not a supported image")]
    NotAnImage,

    /// Decoding succeeded but the resized image could not be produced.
    #[error("Image processing failed: {0}")]
    Image(String),
}

/// Local filesystem-based file storage implementation.
///
/// Files live under `base_dir/<key>` and are served from `base_url/<key>`.
#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
    base_url: String,
    max_file_size: usize,
}

impl LocalFileStorage {
    /// Create a new local file storage instance with a 5MB size limit.
    pub fn new(base_dir: PathBuf, base_url: String) -> Self {
        Self::with_max_size(base_dir, base_url, 5 * 1024 * 1024)
    }

    /// Create a new local file storage with custom max file size.
    pub fn with_max_size(base_dir: PathBuf, base_url: String, max_file_size: usize) -> Self {
        Self {
            base_dir,
            base_url,
            max_file_size,
        }
    }

    /// Validate storage key format to prevent path traversal.
    fn validate_key(key: &str) -> Result<(), StorageError> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Key must not be empty, contain '..', or start with '/'".to_string(),
            ));
        }

        if !key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '/' || c == '.')
        {
            return Err(StorageError::InvalidKey(
                "Key contains invalid characters".to_string(),
            ));
        }

        Ok(())
    }
}

impl FileStorage for LocalFileStorage {
    fn save<'a>(&'a self, key: &'a str, content: &'a [u8]) -> StorageFuture<'a, String> {
        Box::pin(async move {
            Self::validate_key(key)?;

            if content.len() > self.max_file_size {
                return Err(StorageError::InvalidFileSize {
                    max_bytes: self.max_file_size,
                });
            }

            let file_path = self.base_dir.join(key);
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent).await?;
            }

            // Temp file + rename so readers never observe a half-written file
            let temp_path = file_path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
            fs::write(&temp_path, content).await?;
            if let Err(e) = fs::rename(&temp_path, &file_path).await {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e.into());
            }

            tracing::debug!(storage.key = %key, size = content.len(), "Stored file");
            Ok(key.to_string())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            Self::validate_key(key)?;

            let file_path = self.base_dir.join(key);
            match fs::remove_file(&file_path).await {
                Ok(_) => {
                    tracing::debug!(storage.key = %key, "Deleted file");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> StorageFuture<'a, bool> {
        Box::pin(async move {
            Self::validate_key(key)?;
            Ok(fs::try_exists(self.base_dir.join(key)).await?)
        })
    }

    fn list<'a>(&'a self, prefix: &'a str) -> StorageFuture<'a, Vec<String>> {
        Box::pin(async move {
            Self::validate_key(prefix)?;
            let prefix = prefix.trim_end_matches('/');

            let mut entries = match fs::read_dir(self.base_dir.join(prefix)).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };

            let mut keys = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_file() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                    continue;
                };
                // In-flight saves
                if name.ends_with(".tmp") {
                    continue;
                }
                keys.push(format!("{prefix}/{name}"));
            }
            keys.sort();
            Ok(keys)
        })
    }

    fn get_url(&self, key: &str) -> Result<String, StorageError> {
        Self::validate_key(key)?;
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), key))
    }
}
