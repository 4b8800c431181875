//! State transitions: create, update, trash, restore, purge, status toggle
//! and duplication.
//!
//! Checks that can fail without side effects (unknown media field, duplicate
//! content, missing row) run before anything is written. File writes happen
//! inside the transaction; see [`super::MediaStaging`] for how they are
//! reconciled with its outcome.

use tracing::{debug, info, instrument, warn};

use campusdesk_core::LifecycleError;
use campusdesk_models::{
    LifecycleState, Resource, ResourceDraft, ResourceId, ResourceInput, Scope, UserId,
};
use campusdesk_observability::metrics;

use super::{LifecycleManager, MediaStaging};
use crate::media::MediaStore;
use crate::repository::{ResourceRepository, ResourceTx};
use crate::slug;

impl<R, M> LifecycleManager<R, M>
where
    R: ResourceRepository,
    M: MediaStore,
{
    /// Creates an active resource attributed to `actor`.
    ///
    /// With `prevent_duplicate` set, an upload whose bytes are already stored
    /// in the namespace fails with [`LifecycleError::DuplicateContent`].
    #[instrument(skip(self, input), fields(entity = %self.definition.name, db.operation = "INSERT"))]
    pub async fn create(
        &self,
        input: ResourceInput,
        actor: Option<UserId>,
    ) -> Result<Resource, LifecycleError> {
        let entity = self.entity();
        let namespace = self.namespace();
        let ResourceInput {
            fields,
            is_active,
            uploads,
            prevent_duplicate,
        } = input;

        // 1. Checks that must fail before any write
        let specs = self.upload_specs(&uploads)?;
        if prevent_duplicate {
            for (spec, bytes) in &specs {
                if let Some(existing) = self.media.check_duplicate(bytes, namespace).await? {
                    warn!(field = %spec.name, existing = %existing, "Rejected duplicate upload");
                    metrics::track_duplicate_rejected(entity);
                    return Err(LifecycleError::DuplicateContent { existing });
                }
            }
        }

        let mut draft = ResourceDraft::new(entity, fields, is_active.unwrap_or(true));
        draft.created_by = actor;
        let candidate = self.slug_candidate(&draft.fields);

        // 2. Store media and insert the row in one transaction
        let mut staging = MediaStaging::default();
        let result: Result<Resource, LifecycleError> = async {
            let mut tx = self.repo.begin().await?;
            for (spec, bytes) in &specs {
                let files = staging.store(&self.media, namespace, spec, bytes).await?;
                draft.media.insert(spec.name.clone(), files);
            }

            let resource = self.insert_with_slug(&mut tx, draft, candidate).await?;
            tx.commit().await?;
            Ok(resource)
        }
        .await;

        // 3. Reconcile files with the outcome
        staging
            .finish(&self.repo, &self.media, entity, namespace, result.is_ok())
            .await;

        let resource = result?;
        metrics::track_resource_created(entity);
        info!(id = %resource.id, slug = ?resource.slug, "Resource created");
        Ok(resource)
    }

    /// Updates an active or trashed resource in place.
    ///
    /// Fields are merged over the current set. The slug is re-derived only
    /// when its source text slugifies differently. Replaced media is released
    /// after commit unless the saved row or another row still references it.
    #[instrument(skip(self, input), fields(entity = %self.definition.name, db.operation = "UPDATE"))]
    pub async fn update(
        &self,
        id: ResourceId,
        input: ResourceInput,
        actor: Option<UserId>,
    ) -> Result<Resource, LifecycleError> {
        let entity = self.entity();
        let namespace = self.namespace();
        let ResourceInput {
            fields,
            is_active,
            uploads,
            ..
        } = input;
        let specs = self.upload_specs(&uploads)?;

        let mut staging = MediaStaging::default();
        let result: Result<Resource, LifecycleError> = async {
            let mut tx = self.repo.begin().await?;

            // 1. Lock the row, trashed or not
            let existing = tx
                .find(entity, id, Scope::WithTrashed)
                .await?
                .ok_or_else(|| LifecycleError::not_found(entity))?;

            // 2. Merge fields and audit data
            let mut resource = existing.clone();
            resource.fields.extend(fields);
            if let Some(active) = is_active {
                resource.is_active = active;
            }
            if actor.is_some() {
                resource.updated_by = actor;
            }

            // 3. Replace media
            let mut superseded = Vec::new();
            for (spec, bytes) in &specs {
                let replacement = staging
                    .replace(&self.media, namespace, &existing, spec, bytes)
                    .await?;
                if let Some(current) = replacement.current {
                    resource.media.insert(spec.name.clone(), current);
                }
                superseded.extend(replacement.superseded);
            }

            // 4. Follow the slug source
            let candidate = self.changed_slug_candidate(&existing, &resource);
            let saved = self.save_with_slug(&mut tx, resource, candidate).await?;

            // 5. Release replaced files neither this row nor another points at
            for files in &superseded {
                for name in files.names() {
                    if saved.references_media(name) {
                        debug!(stored = %name, "Replaced media still used by another field");
                    } else if tx.media_references(entity, name, id).await? > 0 {
                        debug!(stored = %name, "Replaced media still shared, keeping");
                    } else {
                        staging.release(name);
                    }
                }
            }

            tx.commit().await?;
            Ok(saved)
        }
        .await;

        staging
            .finish(&self.repo, &self.media, entity, namespace, result.is_ok())
            .await;

        let resource = result?;
        info!(id = %resource.id, slug = ?resource.slug, "Resource updated");
        Ok(resource)
    }

    /// Moves an active resource to the trash. Media is kept.
    #[instrument(skip(self), fields(entity = %self.definition.name, db.operation = "UPDATE"))]
    pub async fn delete(&self, id: ResourceId) -> Result<Resource, LifecycleError> {
        let entity = self.entity();
        let mut tx = self.repo.begin().await?;

        if tx.trash(entity, &[id]).await? == 0 {
            debug!(%id, "No active resource to trash");
            return Err(LifecycleError::not_found(entity));
        }
        let trashed = tx
            .find(entity, id, Scope::Trashed)
            .await?
            .ok_or_else(|| LifecycleError::not_found(entity))?;
        tx.commit().await?;

        metrics::track_resource_trashed(entity, 1);
        info!(%id, "Resource moved to trash");
        Ok(trashed)
    }

    /// Brings a trashed resource back.
    #[instrument(skip(self), fields(entity = %self.definition.name, db.operation = "UPDATE"))]
    pub async fn restore(
        &self,
        id: ResourceId,
        actor: Option<UserId>,
    ) -> Result<Resource, LifecycleError> {
        let entity = self.entity();
        let mut tx = self.repo.begin().await?;

        if tx.restore(entity, &[id], actor).await? == 0 {
            debug!(%id, "Resource not in trash");
            return Err(LifecycleError::not_found_in_trash(entity));
        }
        let restored = tx
            .find(entity, id, Scope::Active)
            .await?
            .ok_or_else(|| LifecycleError::not_found_in_trash(entity))?;
        tx.commit().await?;

        metrics::track_resource_restored(entity, 1);
        info!(%id, "Resource restored from trash");
        Ok(restored)
    }

    /// Permanently deletes a trashed resource and releases its media.
    ///
    /// An active resource is rejected with
    /// [`LifecycleError::ValidationConflict`]; it has to be trashed first.
    #[instrument(skip(self), fields(entity = %self.definition.name, db.operation = "DELETE"))]
    pub async fn force_delete(&self, id: ResourceId) -> Result<Resource, LifecycleError> {
        let entity = self.entity();
        let mut tx = self.repo.begin().await?;

        let Some(resource) = tx.find(entity, id, Scope::Trashed).await? else {
            if tx.find(entity, id, Scope::Active).await?.is_some() {
                warn!(%id, "Refusing to purge a resource that is not in trash");
                return Err(LifecycleError::validation(format!(
                    "{entity} must be moved to trash before it can be permanently deleted"
                )));
            }
            return Err(LifecycleError::not_found_in_trash(entity));
        };

        self.purge_in_tx(&mut tx, &resource).await?;
        tx.commit().await?;

        metrics::track_resource_purged(entity, 1);
        info!(%id, "Resource permanently deleted");
        Ok(Resource {
            state: LifecycleState::Purged,
            ..resource
        })
    }

    /// Flips the active/inactive flag of an active resource.
    #[instrument(skip(self), fields(entity = %self.definition.name, db.operation = "UPDATE"))]
    pub async fn toggle_status(
        &self,
        id: ResourceId,
        actor: Option<UserId>,
    ) -> Result<Resource, LifecycleError> {
        let entity = self.entity();
        let mut tx = self.repo.begin().await?;

        let mut resource = tx
            .find(entity, id, Scope::Active)
            .await?
            .ok_or_else(|| LifecycleError::not_found(entity))?;
        resource.is_active = !resource.is_active;
        if actor.is_some() {
            resource.updated_by = actor;
        }

        let saved = tx.save(&resource).await?;
        tx.commit().await?;

        info!(%id, is_active = saved.is_active, "Resource status toggled");
        Ok(saved)
    }

    /// Copies an active resource into a new inactive one.
    ///
    /// The copy gets a slug derived from `"<source text> (Copy)"` and shares
    /// the source's media files.
    #[instrument(skip(self), fields(entity = %self.definition.name, db.operation = "INSERT"))]
    pub async fn duplicate(
        &self,
        id: ResourceId,
        actor: Option<UserId>,
    ) -> Result<Resource, LifecycleError> {
        let entity = self.entity();
        let mut tx = self.repo.begin().await?;

        let source = tx
            .find(entity, id, Scope::Active)
            .await?
            .ok_or_else(|| LifecycleError::not_found(entity))?;
        let candidate = self
            .slug_candidate(&source.fields)
            .map(|text| format!("{text} (Copy)"));

        let copy = self
            .insert_with_slug(&mut tx, source.clone_draft(actor), candidate)
            .await?;
        tx.commit().await?;

        metrics::track_resource_created(entity);
        info!(source = %id, id = %copy.id, slug = ?copy.slug, "Resource duplicated");
        Ok(copy)
    }

    /// Slug source text when it changed enough to need a new slug.
    fn changed_slug_candidate(&self, existing: &Resource, updated: &Resource) -> Option<String> {
        let next = self.slug_candidate(&updated.fields)?;
        let previous = self.slug_candidate(&existing.fields).unwrap_or_default();

        (existing.slug.is_none() || slug::slugify(&next) != slug::slugify(&previous))
            .then_some(next)
    }
}
