//! In-process repository for tests.
//!
//! A transaction works on a private copy of the rows and publishes it on
//! commit, so an aborted operation leaves nothing behind. Commits are
//! last-writer-wins; tests drive one operation at a time.
//!
//! Hooks reproduce what is hard to provoke against a real database:
//! [`MemoryRepository::simulate_concurrent_insert`],
//! [`MemoryRepository::simulate_concurrent_commit`] and
//! [`MemoryRepository::fail_next_write`].

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use campusdesk_core::{ListParams, Page, PaginationMeta, SortDirection};
use campusdesk_models::{
    LifecycleState, Resource, ResourceDraft, ResourceId, Scope, StatWindows, Statistics, UserId,
};

use super::{RepositoryError, ResourceRepository, ResourceTx};

#[derive(Debug, Default)]
struct Store {
    rows: HashMap<ResourceId, Resource>,
    /// Rows a competing writer commits right before our next insert or save.
    racing: VecDeque<Resource>,
    fail_next_write: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    store: Arc<Mutex<Store>>,
}

fn lock(store: &Mutex<Store>) -> MutexGuard<'_, Store> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a row of `entity` holding `slug` that another writer commits
    /// after our slug lookup and before our write. Calling it twice makes the
    /// retry lose as well.
    pub fn simulate_concurrent_insert(&self, entity: &str, slug: &str) {
        let now = Utc::now();
        let row = Resource {
            id: ResourceId::new(),
            entity_type: entity.to_string(),
            slug: Some(slug.to_string()),
            fields: Default::default(),
            is_active: true,
            state: LifecycleState::Active,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
            media: Default::default(),
        };
        self.simulate_concurrent_commit(row);
    }

    /// Queues `resource` to be committed by another writer right before our
    /// next insert or save, even one that then fails.
    pub fn simulate_concurrent_commit(&self, resource: Resource) {
        lock(&self.store).racing.push_back(resource);
    }

    /// Makes the next insert or save fail with a database error.
    pub fn fail_next_write(&self) {
        lock(&self.store).fail_next_write = true;
    }

    /// Stores `resource` as-is, outside any lifecycle rule.
    pub fn seed(&self, resource: Resource) {
        lock(&self.store).rows.insert(resource.id, resource);
    }

    /// Raw row lookup, whatever its state.
    pub fn row(&self, id: ResourceId) -> Option<Resource> {
        lock(&self.store).rows.get(&id).cloned()
    }

    pub fn count(&self, entity: &str) -> usize {
        lock(&self.store)
            .rows
            .values()
            .filter(|r| r.entity_type == entity)
            .count()
    }
}

#[async_trait]
impl ResourceRepository for MemoryRepository {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, RepositoryError> {
        let rows = lock(&self.store).rows.clone();
        Ok(MemoryTx {
            store: Arc::clone(&self.store),
            rows,
        })
    }

    async fn find(
        &self,
        entity: &str,
        id: ResourceId,
        scope: Scope,
    ) -> Result<Option<Resource>, RepositoryError> {
        Ok(lock(&self.store)
            .rows
            .get(&id)
            .filter(|r| r.entity_type == entity && scope.admits(&r.state))
            .cloned())
    }

    async fn list(
        &self,
        entity: &str,
        scope: Scope,
        params: &ListParams,
    ) -> Result<Page<Resource>, RepositoryError> {
        let needle = params.search_term().map(str::to_lowercase);
        let mut matches: Vec<Resource> = lock(&self.store)
            .rows
            .values()
            .filter(|r| r.entity_type == entity && scope.admits(&r.state))
            .filter(|r| params.status.flag().is_none_or(|flag| r.is_active == flag))
            .filter(|r| needle.as_deref().is_none_or(|n| matches_search(r, n)))
            .cloned()
            .collect();

        let key = params.sort_key();
        matches.sort_by(|a, b| {
            let ordering = compare_by(a, b, key).then_with(|| a.id.cmp(&b.id));
            match params.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        let total = matches.len() as i64;
        let data = matches
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit() as usize)
            .collect();

        Ok(Page {
            data,
            meta: PaginationMeta::new(total, params),
        })
    }

    async fn trashed_ids(
        &self,
        entity: &str,
        ids: Option<&[ResourceId]>,
    ) -> Result<Vec<ResourceId>, RepositoryError> {
        let store = lock(&self.store);
        let mut found: Vec<ResourceId> = store
            .rows
            .values()
            .filter(|r| r.entity_type == entity && r.state.is_trashed())
            .filter(|r| ids.is_none_or(|ids| ids.contains(&r.id)))
            .map(|r| r.id)
            .collect();
        found.sort();
        Ok(found)
    }

    async fn statistics(
        &self,
        entity: &str,
        windows: &StatWindows,
    ) -> Result<Statistics, RepositoryError> {
        let store = lock(&self.store);
        let mut stats = Statistics::default();

        for row in store.rows.values().filter(|r| r.entity_type == entity) {
            if row.state.is_trashed() {
                stats.trashed += 1;
                continue;
            }
            stats.total += 1;
            if row.is_active {
                stats.active += 1;
            } else {
                stats.inactive += 1;
            }
            if row.created_at >= windows.month_start {
                stats.this_month += 1;
            }
            if row.created_at >= windows.week_start {
                stats.this_week += 1;
            }
            if row.created_at >= windows.day_start {
                stats.today += 1;
            }
        }

        Ok(stats)
    }

    async fn media_references(
        &self,
        entity: &str,
        stored_name: &str,
    ) -> Result<i64, RepositoryError> {
        let store = lock(&self.store);
        Ok(count_media_references(store.rows.values(), entity, stored_name, None))
    }
}

fn count_media_references<'a>(
    rows: impl Iterator<Item = &'a Resource>,
    entity: &str,
    stored_name: &str,
    exclude: Option<ResourceId>,
) -> i64 {
    rows.filter(|r| r.entity_type == entity && Some(r.id) != exclude)
        .filter(|r| r.references_media(stored_name))
        .count() as i64
}

fn matches_search(resource: &Resource, needle: &str) -> bool {
    if resource
        .slug
        .as_deref()
        .is_some_and(|slug| slug.to_lowercase().contains(needle))
    {
        return true;
    }
    resource
        .fields
        .values()
        .any(|value| text_of(value).to_lowercase().contains(needle))
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ascending order with missing values last, as PostgreSQL sorts NULLs.
fn compare_by(a: &Resource, b: &Resource, key: &str) -> Ordering {
    match key {
        "created_at" => a.created_at.cmp(&b.created_at),
        "updated_at" => a.updated_at.cmp(&b.updated_at),
        "is_active" => a.is_active.cmp(&b.is_active),
        "slug" => nulls_last(a.slug.clone(), b.slug.clone()),
        field => nulls_last(
            a.fields.get(field).map(text_of),
            b.fields.get(field).map(text_of),
        ),
    }
}

fn nulls_last(a: Option<String>, b: Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub struct MemoryTx {
    store: Arc<Mutex<Store>>,
    rows: HashMap<ResourceId, Resource>,
}

impl MemoryTx {
    /// Lands a queued competing row, or fails when a failure was requested.
    fn before_write(&mut self) -> Result<(), RepositoryError> {
        let mut store = lock(&self.store);
        if let Some(row) = store.racing.pop_front() {
            store.rows.insert(row.id, row.clone());
            self.rows.insert(row.id, row);
        }
        if std::mem::take(&mut store.fail_next_write) {
            return Err(RepositoryError::Database(sqlx::Error::Protocol(
                "simulated write failure".to_string(),
            )));
        }
        Ok(())
    }

    fn check_slug(
        &self,
        entity: &str,
        id: ResourceId,
        slug: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let Some(slug) = slug else {
            return Ok(());
        };
        let taken = self.rows.values().any(|r| {
            r.id != id && r.entity_type == entity && r.slug.as_deref() == Some(slug)
        });
        if taken {
            return Err(RepositoryError::SlugTaken(slug.to_string()));
        }
        Ok(())
    }

    fn rows_of<'a>(
        &'a mut self,
        entity: &'a str,
        ids: &'a [ResourceId],
    ) -> impl Iterator<Item = &'a mut Resource> + 'a {
        self.rows
            .values_mut()
            .filter(move |r| r.entity_type == entity && ids.contains(&r.id))
    }
}

#[async_trait]
impl ResourceTx for MemoryTx {
    async fn find(
        &mut self,
        entity: &str,
        id: ResourceId,
        scope: Scope,
    ) -> Result<Option<Resource>, RepositoryError> {
        Ok(self
            .rows
            .get(&id)
            .filter(|r| r.entity_type == entity && scope.admits(&r.state))
            .cloned())
    }

    async fn slugs_with_prefix(
        &mut self,
        entity: &str,
        prefix: &str,
    ) -> Result<Vec<(ResourceId, String)>, RepositoryError> {
        Ok(self
            .rows
            .values()
            .filter(|r| r.entity_type == entity)
            .filter_map(|r| r.slug.as_ref().map(|slug| (r.id, slug)))
            .filter(|(_, slug)| slug.starts_with(prefix))
            .map(|(id, slug)| (id, slug.clone()))
            .collect())
    }

    async fn insert(&mut self, draft: &ResourceDraft) -> Result<Resource, RepositoryError> {
        self.before_write()?;
        self.check_slug(&draft.entity_type, draft.id, draft.slug.as_deref())?;

        let now = Utc::now();
        let resource = Resource {
            id: draft.id,
            entity_type: draft.entity_type.clone(),
            slug: draft.slug.clone(),
            fields: draft.fields.clone(),
            is_active: draft.is_active,
            state: LifecycleState::Active,
            created_by: draft.created_by,
            updated_by: None,
            created_at: now,
            updated_at: now,
            media: draft.media.clone(),
        };
        self.rows.insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn save(&mut self, resource: &Resource) -> Result<Resource, RepositoryError> {
        self.before_write()?;
        self.check_slug(&resource.entity_type, resource.id, resource.slug.as_deref())?;

        let Some(row) = self.rows.get_mut(&resource.id) else {
            return Err(RepositoryError::Database(sqlx::Error::RowNotFound));
        };
        row.slug = resource.slug.clone();
        row.fields = resource.fields.clone();
        row.is_active = resource.is_active;
        row.media = resource.media.clone();
        row.updated_by = resource.updated_by;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn trash(&mut self, entity: &str, ids: &[ResourceId]) -> Result<u64, RepositoryError> {
        let now = Utc::now();
        let mut affected = 0;
        for row in self.rows_of(entity, ids).filter(|r| r.state.is_active()) {
            row.state = LifecycleState::Trashed { since: now };
            row.updated_at = now;
            affected += 1;
        }
        Ok(affected)
    }

    async fn restore(
        &mut self,
        entity: &str,
        ids: &[ResourceId],
        actor: Option<UserId>,
    ) -> Result<u64, RepositoryError> {
        let now = Utc::now();
        let mut affected = 0;
        for row in self.rows_of(entity, ids).filter(|r| r.state.is_trashed()) {
            row.state = LifecycleState::Active;
            row.updated_at = now;
            if actor.is_some() {
                row.updated_by = actor;
            }
            affected += 1;
        }
        Ok(affected)
    }

    async fn set_status(
        &mut self,
        entity: &str,
        ids: &[ResourceId],
        active: bool,
        actor: Option<UserId>,
    ) -> Result<u64, RepositoryError> {
        let now = Utc::now();
        let mut affected = 0;
        for row in self.rows_of(entity, ids).filter(|r| r.is_active != active) {
            row.is_active = active;
            row.updated_at = now;
            if actor.is_some() {
                row.updated_by = actor;
            }
            affected += 1;
        }
        Ok(affected)
    }

    async fn trashed_ids(
        &mut self,
        entity: &str,
        ids: &[ResourceId],
    ) -> Result<Vec<ResourceId>, RepositoryError> {
        let mut found: Vec<ResourceId> = self
            .rows
            .values()
            .filter(|r| r.entity_type == entity && r.state.is_trashed() && ids.contains(&r.id))
            .map(|r| r.id)
            .collect();
        found.sort();
        Ok(found)
    }

    async fn remove(&mut self, entity: &str, id: ResourceId) -> Result<u64, RepositoryError> {
        match self.rows.get(&id) {
            Some(row) if row.entity_type == entity => {
                self.rows.remove(&id);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn media_references(
        &mut self,
        entity: &str,
        stored_name: &str,
        exclude: ResourceId,
    ) -> Result<i64, RepositoryError> {
        Ok(count_media_references(self.rows.values(), entity, stored_name, Some(exclude)))
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        lock(&self.store).rows = self.rows;
        Ok(())
    }
}
