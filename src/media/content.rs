//! Content-addressed media store.
//!
//! Files are named after the SHA-256 of the uploaded bytes and sharded by its
//! first two hex digits, `{namespace}/{hash[0..2]}/...`:
//!
//! - image originals: `{hash}-{max_width}x{max_height}.{ext}`, one per bounds
//! - other originals: `{hash}.{ext}`, stored verbatim
//! - variants: `{hash}-{variant}-{width}x{height}-{fit}.{ext}`
//!
//! Everything that shapes the stored bytes is part of the name, so the same
//! upload with the same processing always lands on the same file, and a file
//! is never reused for a different size.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use campusdesk_config::MediaConfig;
use campusdesk_core::{FileStorage, LocalFileStorage, StorageError};
use campusdesk_models::{Bounds, MediaFiles, VariantSpec};

use super::{MediaStore, imaging};

#[derive(Clone)]
pub struct ContentMediaStore {
    storage: Arc<dyn FileStorage>,
}

impl ContentMediaStore {
    pub fn new(storage: Arc<dyn FileStorage>) -> Self {
        Self { storage }
    }

    /// Store backed by the local filesystem described by `config`.
    pub fn local(config: &MediaConfig) -> Self {
        Self::new(Arc::new(LocalFileStorage::with_max_size(
            config.root.clone(),
            config.base_url.clone(),
            config.max_file_size,
        )))
    }
}

impl std::fmt::Debug for ContentMediaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentMediaStore").finish_non_exhaustive()
    }
}

/// Hex SHA-256 of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn shard(namespace: &str, hash: &str) -> String {
    format!("{namespace}/{}", &hash[..2])
}

fn original_name(namespace: &str, hash: &str, bytes: &[u8], bounds: Bounds) -> String {
    let shard = shard(namespace, hash);
    let ext = imaging::extension_for(bytes);
    if imaging::sniff_format(bytes).is_some() {
        format!("{shard}/{hash}-{}x{}.{ext}", bounds.max_width, bounds.max_height)
    } else {
        format!("{shard}/{hash}.{ext}")
    }
}

fn variant_name(namespace: &str, hash: &str, spec: &VariantSpec, ext: &str) -> String {
    format!(
        "{}/{hash}-{}-{}x{}-{}.{ext}",
        shard(namespace, hash),
        spec.name,
        spec.width,
        spec.height,
        spec.fit.as_str()
    )
}

/// Whether `key` names an original of the content fingerprinted as `hash`,
/// whatever bounds it was stored with. Variants never match.
fn is_original_of(key: &str, hash: &str) -> bool {
    let file = key.rsplit('/').next().unwrap_or(key);
    let stem = file.split_once('.').map_or(file, |(stem, _)| stem);
    let Some(rest) = stem.strip_prefix(hash) else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }

    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    rest.strip_prefix('-')
        .and_then(|dims| dims.split_once('x'))
        .is_some_and(|(w, h)| is_number(w) && is_number(h))
}

async fn run_blocking<T, F>(work: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StorageError::Image(e.to_string()))?
}

#[async_trait]
impl MediaStore for ContentMediaStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn check_duplicate(
        &self,
        bytes: &[u8],
        namespace: &str,
    ) -> Result<Option<String>, StorageError> {
        let hash = fingerprint(bytes);
        let existing = self
            .storage
            .list(&shard(namespace, &hash))
            .await?
            .into_iter()
            .find(|key| is_original_of(key, &hash));

        if let Some(name) = &existing {
            debug!(stored = %name, "Fingerprint already stored");
        }
        Ok(existing)
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn store(
        &self,
        bytes: &[u8],
        namespace: &str,
        bounds: Bounds,
    ) -> Result<String, StorageError> {
        let name = original_name(namespace, &fingerprint(bytes), bytes, bounds);
        if self.storage.exists(&name).await? {
            debug!(stored = %name, "Reusing stored original");
            return Ok(name);
        }

        let owned = bytes.to_vec();
        let resized = run_blocking(move || imaging::fit_within(&owned, bounds)).await?;

        self.storage
            .save(&name, resized.as_deref().unwrap_or(bytes))
            .await?;
        debug!(stored = %name, resized = resized.is_some(), "Stored original");

        Ok(name)
    }

    #[instrument(skip(self, bytes, variants), fields(size = bytes.len(), variants = variants.len()))]
    async fn store_with_variants(
        &self,
        bytes: &[u8],
        namespace: &str,
        variants: &[VariantSpec],
    ) -> Result<BTreeMap<String, String>, StorageError> {
        if variants.is_empty() {
            return Ok(BTreeMap::new());
        }

        let hash = fingerprint(bytes);
        let ext = imaging::extension_for(bytes);
        let names: BTreeMap<String, String> = variants
            .iter()
            .map(|spec| (spec.name.clone(), variant_name(namespace, &hash, spec, ext)))
            .collect();

        let mut missing = Vec::new();
        for spec in variants {
            if !self.storage.exists(&names[&spec.name]).await? {
                missing.push(spec.clone());
            }
        }
        if missing.is_empty() {
            debug!("Reusing stored variants");
            return Ok(names);
        }

        let owned = bytes.to_vec();
        let rendered = run_blocking(move || imaging::render_variants(&owned, &missing)).await?;

        // Only files created here are rolled back on a failed save
        let mut saved: Vec<&str> = Vec::new();
        for (variant, encoded) in &rendered {
            let Some(name) = names.get(variant) else {
                continue;
            };
            if let Err(e) = self.storage.save(name, encoded).await {
                for name in saved {
                    if let Err(cleanup) = self.storage.delete(name).await {
                        warn!(stored = %name, error = %cleanup, "Failed to remove partial variant");
                    }
                }
                return Err(e);
            }
            saved.push(name);
        }
        debug!(count = saved.len(), "Stored variants");

        Ok(names)
    }

    #[instrument(skip(self, files), fields(original = %files.original))]
    async fn discard(&self, namespace: &str, files: &MediaFiles) -> Result<(), StorageError> {
        let prefix = format!("{namespace}/");
        for name in files.names() {
            if !name.starts_with(&prefix) {
                warn!(stored = %name, "Refusing to delete file outside namespace");
                continue;
            }
            self.storage.delete(name).await?;
        }
        Ok(())
    }

    fn url(&self, stored_name: &str) -> Result<String, StorageError> {
        self.storage.get_url(stored_name)
    }
}
