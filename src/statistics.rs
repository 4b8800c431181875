//! Per-type counts for dashboards.

use tracing::{debug, instrument};

use campusdesk_core::LifecycleError;
use campusdesk_models::{StatWindows, Statistics};

use crate::lifecycle::LifecycleManager;
use crate::media::MediaStore;
use crate::repository::ResourceRepository;

impl<R, M> LifecycleManager<R, M>
where
    R: ResourceRepository,
    M: MediaStore,
{
    /// Counts for this type, with time windows taken from the current UTC
    /// time.
    pub async fn statistics(&self) -> Result<Statistics, LifecycleError> {
        self.statistics_at(StatWindows::now()).await
    }

    #[instrument(skip(self), fields(entity = %self.definition.name, db.operation = "SELECT"))]
    pub async fn statistics_at(&self, windows: StatWindows) -> Result<Statistics, LifecycleError> {
        let stats = self.repo.statistics(self.entity(), &windows).await?;
        debug!(
            total = stats.total,
            trashed = stats.trashed,
            today = stats.today,
            "Computed statistics"
        );
        Ok(stats)
    }
}
