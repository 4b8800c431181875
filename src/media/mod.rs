//! Media storage for resource uploads.
//!
//! A [`MediaStore`] owns fingerprinting, bounding, variant generation and
//! file release. It never touches the database: deciding whether a stored
//! name is still referenced elsewhere is the lifecycle manager's job.
//!
//! - [`content`]: Content-addressed store over a [`campusdesk_core::FileStorage`]
//! - [`imaging`]: Decode, resize and re-encode helpers

use std::collections::BTreeMap;

use async_trait::async_trait;

use campusdesk_core::StorageError;
use campusdesk_models::{Bounds, MediaFieldSpec, MediaFiles, Resource, VariantSpec};

pub mod content;
pub mod imaging;

pub use content::ContentMediaStore;

/// Outcome of [`MediaStore::replace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReplacement {
    /// Files the field should reference after the update.
    pub current: Option<MediaFiles>,
    /// Previous files no longer referenced by this resource. The caller
    /// releases them once the row change has committed.
    pub superseded: Option<MediaFiles>,
}

impl MediaReplacement {
    /// `current` takes over from `previous`, which is superseded unless it
    /// names exactly the same files.
    pub fn new(previous: Option<MediaFiles>, current: MediaFiles) -> Self {
        Self {
            superseded: previous.filter(|files| *files != current),
            current: Some(current),
        }
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stored name of an original with the same fingerprint in `namespace`.
    async fn check_duplicate(
        &self,
        bytes: &[u8],
        namespace: &str,
    ) -> Result<Option<String>, StorageError>;

    /// Stores the original, scaled down to `bounds` when it is a larger image.
    /// Storing identical bytes twice yields the same name.
    async fn store(
        &self,
        bytes: &[u8],
        namespace: &str,
        bounds: Bounds,
    ) -> Result<String, StorageError>;

    /// Stores one resized derivative per spec; returns variant name to stored
    /// name.
    async fn store_with_variants(
        &self,
        bytes: &[u8],
        namespace: &str,
        variants: &[VariantSpec],
    ) -> Result<BTreeMap<String, String>, StorageError>;

    /// Removes the files behind `files`. Missing files are not an error.
    async fn discard(&self, namespace: &str, files: &MediaFiles) -> Result<(), StorageError>;

    fn url(&self, stored_name: &str) -> Result<String, StorageError>;

    /// Original plus every variant the field defines.
    async fn store_field(
        &self,
        bytes: &[u8],
        namespace: &str,
        field: &MediaFieldSpec,
    ) -> Result<MediaFiles, StorageError> {
        let original = self.store(bytes, namespace, field.bounds).await?;
        let variants = if field.variants.is_empty() {
            BTreeMap::new()
        } else {
            self.store_with_variants(bytes, namespace, &field.variants)
                .await?
        };

        Ok(MediaFiles { original, variants })
    }

    /// Stores `bytes` for `field` of `existing`. Without new bytes the current
    /// files are kept.
    async fn replace(
        &self,
        bytes: Option<&[u8]>,
        namespace: &str,
        existing: &Resource,
        field: &MediaFieldSpec,
    ) -> Result<MediaReplacement, StorageError> {
        let previous = existing.media.get(&field.name).cloned();
        let Some(bytes) = bytes else {
            return Ok(MediaReplacement {
                current: previous,
                superseded: None,
            });
        };

        let current = self.store_field(bytes, namespace, field).await?;
        Ok(MediaReplacement::new(previous, current))
    }

    /// Removes the files of one media field of `resource`, or of all of them.
    async fn delete(
        &self,
        namespace: &str,
        resource: &Resource,
        field: Option<&str>,
    ) -> Result<(), StorageError> {
        for (name, files) in &resource.media {
            if field.is_none_or(|f| f == name.as_str()) {
                self.discard(namespace, files).await?;
            }
        }
        Ok(())
    }
}
