//! Bulk operations over id sets.
//!
//! Trash and status changes run as one statement in one transaction. They
//! fail only when nothing matched; a partial match succeeds with the smaller
//! count. Restore first narrows the ids to those actually in the trash.
//! Purges go item by item, each in its own transaction, so a failure midway
//! leaves earlier items purged; re-running finishes the rest.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use campusdesk_core::LifecycleError;
use campusdesk_models::{BulkOperation, ResourceId, UserId};
use campusdesk_observability::metrics;

use crate::lifecycle::LifecycleManager;
use crate::media::MediaStore;
use crate::repository::{ResourceRepository, ResourceTx};

impl<R, M> LifecycleManager<R, M>
where
    R: ResourceRepository,
    M: MediaStore,
{
    /// Applies `operation` to `ids`; returns how many resources it affected.
    #[instrument(
        skip(self, ids),
        fields(entity = %self.definition.name, operation = operation.label(), requested = ids.len())
    )]
    pub async fn bulk_apply(
        &self,
        ids: &[ResourceId],
        operation: BulkOperation,
        actor: Option<UserId>,
    ) -> Result<u64, LifecycleError> {
        let ids: Vec<ResourceId> = ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let affected = match operation {
            BulkOperation::SoftDelete => self.bulk_trash(&ids).await?,
            BulkOperation::SetStatus(active) => self.bulk_set_status(&ids, active, actor).await?,
            BulkOperation::Restore => self.bulk_restore(&ids, actor).await?,
            BulkOperation::ForceDelete => self.bulk_purge(&ids).await?,
        };

        metrics::track_bulk_operation(self.entity(), operation.label(), affected);
        info!(affected, "Bulk operation applied");
        Ok(affected)
    }

    /// Purges every trashed resource of this type. An empty trash yields 0.
    #[instrument(skip(self), fields(entity = %self.definition.name, db.operation = "DELETE"))]
    pub async fn empty_trash(&self) -> Result<u64, LifecycleError> {
        let trashed = self.repo.trashed_ids(self.entity(), None).await?;
        if trashed.is_empty() {
            debug!("Trash already empty");
            return Ok(0);
        }

        let purged = self.purge_each(trashed).await?;
        info!(purged, "Trash emptied");
        Ok(purged)
    }

    async fn bulk_trash(&self, ids: &[ResourceId]) -> Result<u64, LifecycleError> {
        let entity = self.entity();
        let mut tx = self.repo.begin().await?;

        let affected = tx.trash(entity, ids).await?;
        if affected == 0 {
            return Err(LifecycleError::not_found(entity));
        }
        tx.commit().await?;

        metrics::track_resource_trashed(entity, affected);
        Ok(affected)
    }

    async fn bulk_set_status(
        &self,
        ids: &[ResourceId],
        active: bool,
        actor: Option<UserId>,
    ) -> Result<u64, LifecycleError> {
        let entity = self.entity();
        let mut tx = self.repo.begin().await?;

        let affected = tx.set_status(entity, ids, active, actor).await?;
        if affected == 0 {
            return Err(LifecycleError::not_found(entity));
        }
        tx.commit().await?;

        Ok(affected)
    }

    async fn bulk_restore(
        &self,
        ids: &[ResourceId],
        actor: Option<UserId>,
    ) -> Result<u64, LifecycleError> {
        let entity = self.entity();
        let mut tx = self.repo.begin().await?;

        // 1. Resolve the subset that is actually in the trash
        let trashed = tx.trashed_ids(entity, ids).await?;
        if trashed.is_empty() {
            return Err(LifecycleError::not_found_in_trash(entity));
        }

        // 2. Restore exactly that subset
        let affected = tx.restore(entity, &trashed, actor).await?;
        tx.commit().await?;

        metrics::track_resource_restored(entity, affected);
        Ok(affected)
    }

    async fn bulk_purge(&self, ids: &[ResourceId]) -> Result<u64, LifecycleError> {
        let trashed = self.repo.trashed_ids(self.entity(), Some(ids)).await?;
        if trashed.is_empty() {
            return Err(LifecycleError::not_found_in_trash(self.entity()));
        }

        self.purge_each(trashed).await
    }

    async fn purge_each(&self, ids: Vec<ResourceId>) -> Result<u64, LifecycleError> {
        let mut purged = 0;
        let result: Result<(), LifecycleError> = async {
            for id in ids {
                if self.purge_one(id).await? {
                    purged += 1;
                }
            }
            Ok(())
        }
        .await;

        // Count what was purged even when a later item failed
        metrics::track_resource_purged(self.entity(), purged);
        result.map(|()| purged)
    }
}
