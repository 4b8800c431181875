//! Resource lifecycle management.
//!
//! One [`LifecycleManager`] serves one entity type. It owns the
//! Active/Trashed/Purged state machine, delegates slugs to [`crate::slug`] and
//! files to a [`MediaStore`], and runs every transition in one repository
//! transaction.
//!
//! Reads live here; transitions are in [`transitions`], bulk operations in
//! [`crate::bulk`] and counts in [`crate::statistics`].

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use campusdesk_core::{LifecycleError, ListParams, Page};
use campusdesk_models::{
    EntityDefinition, FieldSet, MediaFieldSpec, MediaFiles, MediaUpload, Resource, ResourceDraft,
    ResourceId, Scope,
};
use campusdesk_observability::metrics;

use crate::media::MediaStore;
use crate::repository::{RepositoryError, ResourceRepository, ResourceTx};
use crate::slug;

mod staging;
pub mod transitions;

pub(crate) use staging::MediaStaging;

pub struct LifecycleManager<R, M> {
    pub(crate) repo: R,
    pub(crate) media: M,
    pub(crate) definition: EntityDefinition,
}

impl<R, M> LifecycleManager<R, M>
where
    R: ResourceRepository,
    M: MediaStore,
{
    pub fn new(repo: R, media: M, definition: EntityDefinition) -> Self {
        Self {
            repo,
            media,
            definition,
        }
    }

    pub fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub(crate) fn entity(&self) -> &str {
        &self.definition.name
    }

    pub(crate) fn namespace(&self) -> &str {
        &self.definition.namespace
    }

    /// Active resource by id.
    #[instrument(skip(self), fields(entity = %self.definition.name))]
    pub async fn find(&self, id: ResourceId) -> Result<Resource, LifecycleError> {
        self.repo
            .find(self.entity(), id, Scope::Active)
            .await?
            .ok_or_else(|| {
                debug!(%id, "Resource not found");
                LifecycleError::not_found(self.entity())
            })
    }

    /// Trashed resource by id.
    #[instrument(skip(self), fields(entity = %self.definition.name))]
    pub async fn find_trashed(&self, id: ResourceId) -> Result<Resource, LifecycleError> {
        self.repo
            .find(self.entity(), id, Scope::Trashed)
            .await?
            .ok_or_else(|| LifecycleError::not_found_in_trash(self.entity()))
    }

    #[instrument(skip(self), fields(entity = %self.definition.name))]
    pub async fn find_with_trashed(&self, id: ResourceId) -> Result<Resource, LifecycleError> {
        self.repo
            .find(self.entity(), id, Scope::WithTrashed)
            .await?
            .ok_or_else(|| LifecycleError::not_found(self.entity()))
    }

    #[instrument(skip(self, params), fields(entity = %self.definition.name))]
    pub async fn list(
        &self,
        scope: Scope,
        params: &ListParams,
    ) -> Result<Page<Resource>, LifecycleError> {
        let page = self.repo.list(self.entity(), scope, params).await?;
        debug!(
            total = page.meta.total,
            returned = page.data.len(),
            "Listed resources"
        );
        Ok(page)
    }

    /// Public URL of a stored media file.
    pub fn media_url(&self, stored_name: &str) -> Result<String, LifecycleError> {
        Ok(self.media.url(stored_name)?)
    }

    /// Text the slug is derived from, for entity types that use slugs.
    pub(crate) fn slug_candidate(&self, fields: &FieldSet) -> Option<String> {
        let source = self.definition.slug_source.as_ref()?;
        Some(
            fields
                .get(source)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        )
    }

    /// Resolves each upload to its field definition, applying the declared
    /// bounds over the field's defaults.
    pub(crate) fn upload_specs<'a>(
        &self,
        uploads: &'a [MediaUpload],
    ) -> Result<Vec<(MediaFieldSpec, &'a [u8])>, LifecycleError> {
        uploads
            .iter()
            .map(|upload| {
                let mut spec = self
                    .definition
                    .media_field(&upload.field)
                    .cloned()
                    .ok_or_else(|| {
                        LifecycleError::validation(format!(
                            "{} has no media field '{}'",
                            self.entity(),
                            upload.field
                        ))
                    })?;
                if upload.bytes.is_empty() {
                    return Err(LifecycleError::validation(format!(
                        "upload for '{}' is empty",
                        upload.field
                    )));
                }
                if let Some(max_width) = upload.max_width {
                    spec.bounds.max_width = max_width;
                }
                if let Some(max_height) = upload.max_height {
                    spec.bounds.max_height = max_height;
                }
                Ok((spec, upload.bytes.as_slice()))
            })
            .collect()
    }

    /// Inserts `draft`, deriving its slug from `candidate`. A slug lost to a
    /// concurrent writer is retried once with the next suffix.
    pub(crate) async fn insert_with_slug(
        &self,
        tx: &mut R::Tx,
        mut draft: ResourceDraft,
        candidate: Option<String>,
    ) -> Result<Resource, LifecycleError> {
        let entity = self.entity();
        let Some(candidate) = candidate else {
            return Ok(tx.insert(&draft).await?);
        };

        draft.slug = Some(slug::generate_unique_slug(tx, &candidate, entity, None).await?);
        match tx.insert(&draft).await {
            Err(RepositoryError::SlugTaken(collided)) => {
                warn!(slug = %collided, "Slug taken by a concurrent writer, retrying");
                metrics::track_slug_retry(entity);
                draft.slug = Some(
                    slug::regenerate_after_collision(tx, &candidate, entity, None, &collided)
                        .await?,
                );
                Ok(tx.insert(&draft).await?)
            }
            result => Ok(result?),
        }
    }

    /// Saves `resource`, re-deriving its slug from `candidate` when given.
    /// Same retry rule as [`Self::insert_with_slug`].
    pub(crate) async fn save_with_slug(
        &self,
        tx: &mut R::Tx,
        mut resource: Resource,
        candidate: Option<String>,
    ) -> Result<Resource, LifecycleError> {
        let entity = self.entity();
        let Some(candidate) = candidate else {
            return Ok(tx.save(&resource).await?);
        };

        resource.slug =
            Some(slug::generate_unique_slug(tx, &candidate, entity, Some(resource.id)).await?);
        match tx.save(&resource).await {
            Err(RepositoryError::SlugTaken(collided)) => {
                warn!(slug = %collided, "Slug taken by a concurrent writer, retrying");
                metrics::track_slug_retry(entity);
                resource.slug = Some(
                    slug::regenerate_after_collision(
                        tx,
                        &candidate,
                        entity,
                        Some(resource.id),
                        &collided,
                    )
                    .await?,
                );
                Ok(tx.save(&resource).await?)
            }
            result => Ok(result?),
        }
    }

    /// Releases the media of a trashed `resource`, then deletes its row.
    ///
    /// Stored names another row still references, as an original or a
    /// variant, are kept. A failed file removal aborts before the row is
    /// touched. The check sees committed rows only; see [`MediaStaging`] for
    /// the window that leaves.
    pub(crate) async fn purge_in_tx(
        &self,
        tx: &mut R::Tx,
        resource: &Resource,
    ) -> Result<(), LifecycleError> {
        let entity = self.entity();
        let namespace = self.namespace();

        // 1. Find names shared with other rows
        let mut shared = BTreeSet::new();
        for name in resource.media.values().flat_map(MediaFiles::names) {
            if tx.media_references(entity, name, resource.id).await? > 0 {
                shared.insert(name);
            }
        }

        // 2. Release the rest
        if shared.is_empty() {
            self.media.delete(namespace, resource, None).await?;
        } else {
            debug!(id = %resource.id, ?shared, "Keeping media referenced elsewhere");
            let released: BTreeSet<&str> = resource
                .media
                .values()
                .flat_map(MediaFiles::names)
                .filter(|name| !shared.contains(name))
                .collect();
            for name in released {
                self.media
                    .discard(namespace, &MediaFiles::single(name))
                    .await?;
            }
        }

        // 3. Delete the row
        tx.remove(entity, resource.id).await?;
        Ok(())
    }

    /// Purges one trashed resource in its own transaction. Returns `false`
    /// when it is no longer in the trash.
    pub(crate) async fn purge_one(&self, id: ResourceId) -> Result<bool, LifecycleError> {
        let mut tx = self.repo.begin().await?;
        let Some(resource) = tx.find(self.entity(), id, Scope::Trashed).await? else {
            debug!(%id, "Already gone from trash, skipping");
            return Ok(false);
        };

        self.purge_in_tx(&mut tx, &resource).await?;
        tx.commit().await?;
        Ok(true)
    }
}
