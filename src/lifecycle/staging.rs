//! File bookkeeping for one lifecycle operation.
//!
//! Files are written before the row change commits and tracked by stored
//! name. If the transaction fails, every name this operation stored is
//! removed again, unless a committed row references it. Names an update
//! replaced are released after commit under the same check.
//!
//! The reference check reads committed rows only, and the removal that
//! follows it is not atomic. Another operation that stored or reused the same
//! name but has not committed yet is invisible to the check and can lose its
//! file; uploading the same bytes again recreates it.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use campusdesk_core::LifecycleError;
use campusdesk_models::{MediaFieldSpec, MediaFiles, Resource};

use crate::media::{MediaReplacement, MediaStore};
use crate::repository::ResourceRepository;

#[derive(Debug, Default)]
pub(crate) struct MediaStaging {
    /// Names this operation stored or reused.
    written: BTreeSet<String>,
    /// Superseded names no row pointed at when the update committed.
    released: BTreeSet<String>,
}

impl MediaStaging {
    /// Stores `bytes` for `field`. The original is tracked before variants
    /// are rendered so a failed render still cleans it up.
    pub(crate) async fn store<M: MediaStore>(
        &mut self,
        media: &M,
        namespace: &str,
        field: &MediaFieldSpec,
        bytes: &[u8],
    ) -> Result<MediaFiles, LifecycleError> {
        let original = media.store(bytes, namespace, field.bounds).await?;
        self.written.insert(original.clone());

        let mut files = MediaFiles::single(original);
        if !field.variants.is_empty() {
            files.variants = media
                .store_with_variants(bytes, namespace, &field.variants)
                .await?;
            self.written.extend(files.variants.values().cloned());
        }
        Ok(files)
    }

    pub(crate) async fn replace<M: MediaStore>(
        &mut self,
        media: &M,
        namespace: &str,
        existing: &Resource,
        field: &MediaFieldSpec,
        bytes: &[u8],
    ) -> Result<MediaReplacement, LifecycleError> {
        let previous = existing.media.get(&field.name).cloned();
        let current = self.store(media, namespace, field, bytes).await?;
        Ok(MediaReplacement::new(previous, current))
    }

    /// Schedules `stored_name` for removal once the transaction commits.
    pub(crate) fn release(&mut self, stored_name: &str) {
        self.released.insert(stored_name.to_string());
    }

    /// Cleans up after the transaction. Failures are logged, never raised:
    /// the row change has already been decided.
    pub(crate) async fn finish<R, M>(
        self,
        repo: &R,
        media: &M,
        entity: &str,
        namespace: &str,
        committed: bool,
    ) where
        R: ResourceRepository,
        M: MediaStore,
    {
        let (names, reason) = if committed {
            (self.released, "superseded")
        } else {
            (self.written, "rolled back")
        };

        for name in names {
            match repo.media_references(entity, &name).await {
                Ok(0) => {}
                Ok(references) => {
                    debug!(stored = %name, references, reason, "Media still referenced, keeping");
                    continue;
                }
                Err(e) => {
                    warn!(stored = %name, reason, error = %e, "Could not check media references, keeping");
                    continue;
                }
            }

            match media.discard(namespace, &MediaFiles::single(name.as_str())).await {
                Ok(()) => debug!(stored = %name, reason, "Released media"),
                Err(e) => warn!(stored = %name, reason, error = %e, "Failed to release media"),
            }
        }
    }
}
