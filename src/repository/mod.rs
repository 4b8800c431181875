//! Persistence seam for the lifecycle core.
//!
//! A [`ResourceRepository`] serves reads and opens transactions; every write
//! goes through a [`ResourceTx`] so a lifecycle transition is one atomic unit.
//! Dropping a transaction without committing rolls it back.
//!
//! - [`postgres`]: SQLx/PostgreSQL backend over the `resources` table
//! - [`memory`]: In-process backend for tests (`test-utils` feature)

use async_trait::async_trait;

use campusdesk_core::{LifecycleError, ListParams, Page};
use campusdesk_models::{
    Resource, ResourceDraft, ResourceId, Scope, StatWindows, Statistics, UserId,
};

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod postgres;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryRepository;
pub use postgres::PgResourceRepository;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The per-type slug uniqueness constraint rejected a write.
    #[error("slug '{0}' is already taken")]
    SlugTaken(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("malformed row: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RepositoryError> for LifecycleError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::SlugTaken(slug) => {
                LifecycleError::Conflict(format!("slug '{slug}' is already taken"))
            }
            other => LifecycleError::database(other),
        }
    }
}

#[async_trait]
pub trait ResourceRepository: Send + Sync {
    type Tx: ResourceTx;

    async fn begin(&self) -> Result<Self::Tx, RepositoryError>;

    async fn find(
        &self,
        entity: &str,
        id: ResourceId,
        scope: Scope,
    ) -> Result<Option<Resource>, RepositoryError>;

    async fn list(
        &self,
        entity: &str,
        scope: Scope,
        params: &ListParams,
    ) -> Result<Page<Resource>, RepositoryError>;

    /// Which of `ids` (every trashed row when `None`) are currently trashed.
    async fn trashed_ids(
        &self,
        entity: &str,
        ids: Option<&[ResourceId]>,
    ) -> Result<Vec<ResourceId>, RepositoryError>;

    async fn statistics(
        &self,
        entity: &str,
        windows: &StatWindows,
    ) -> Result<Statistics, RepositoryError>;

    /// Committed rows of `entity`, trashed included, whose media points at
    /// `stored_name` as an original or a variant.
    async fn media_references(
        &self,
        entity: &str,
        stored_name: &str,
    ) -> Result<i64, RepositoryError>;
}

#[async_trait]
pub trait ResourceTx: Send {
    /// Looks up a row and locks it for the rest of the transaction.
    async fn find(
        &mut self,
        entity: &str,
        id: ResourceId,
        scope: Scope,
    ) -> Result<Option<Resource>, RepositoryError>;

    /// Slugs of every row of `entity`, trashed included, starting with `prefix`.
    async fn slugs_with_prefix(
        &mut self,
        entity: &str,
        prefix: &str,
    ) -> Result<Vec<(ResourceId, String)>, RepositoryError>;

    /// Fails with [`RepositoryError::SlugTaken`] on a slug collision, leaving
    /// the transaction usable for a retry.
    async fn insert(&mut self, draft: &ResourceDraft) -> Result<Resource, RepositoryError>;

    /// Writes slug, fields, status, media and modifier; bumps `updated_at`.
    /// Same collision contract as [`ResourceTx::insert`].
    async fn save(&mut self, resource: &Resource) -> Result<Resource, RepositoryError>;

    /// Sets the trash marker on the active rows among `ids`.
    async fn trash(&mut self, entity: &str, ids: &[ResourceId]) -> Result<u64, RepositoryError>;

    /// Clears the trash marker on the trashed rows among `ids`, stamping the
    /// modifier when an actor is present.
    async fn restore(
        &mut self,
        entity: &str,
        ids: &[ResourceId],
        actor: Option<UserId>,
    ) -> Result<u64, RepositoryError>;

    /// Sets the status flag on rows among `ids`, in any trash state. Rows
    /// already holding the flag are not counted.
    async fn set_status(
        &mut self,
        entity: &str,
        ids: &[ResourceId],
        active: bool,
        actor: Option<UserId>,
    ) -> Result<u64, RepositoryError>;

    async fn trashed_ids(
        &mut self,
        entity: &str,
        ids: &[ResourceId],
    ) -> Result<Vec<ResourceId>, RepositoryError>;

    async fn remove(&mut self, entity: &str, id: ResourceId) -> Result<u64, RepositoryError>;

    /// Rows of `entity` other than `exclude` whose media points at
    /// `stored_name` as an original or a variant.
    async fn media_references(
        &mut self,
        entity: &str,
        stored_name: &str,
        exclude: ResourceId,
    ) -> Result<i64, RepositoryError>;

    async fn commit(self) -> Result<(), RepositoryError>;
}
