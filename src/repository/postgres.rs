//! PostgreSQL backend over the `resources` table.
//!
//! Rows are locked with `FOR UPDATE` when read inside a transaction. Inserts
//! and saves run inside a savepoint so a slug collision can be retried without
//! abandoning the enclosing transaction. Trash timestamps come from the
//! database clock.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use campusdesk_core::{ListParams, Page, PaginationMeta};
use campusdesk_models::{
    FieldSet, LifecycleState, MediaFiles, Resource, ResourceDraft, ResourceId, Scope, StatWindows,
    Statistics, UserId,
};

use super::{RepositoryError, ResourceRepository, ResourceTx};

const COLUMNS: &str = "id, entity_type, slug, fields, media, is_active, created_by, \
                       updated_by, created_at, updated_at, deleted_at";

/// Partial unique index on `(entity_type, slug)`.
const SLUG_CONSTRAINT: &str = "resources_entity_slug_key";

/// Columns that can be sorted on directly; any other key sorts by field value.
const SORTABLE_COLUMNS: &[&str] = &["created_at", "updated_at", "slug", "is_active"];

#[derive(Debug, FromRow)]
struct ResourceRow {
    id: ResourceId,
    entity_type: String,
    slug: Option<String>,
    fields: Json<FieldSet>,
    media: Json<BTreeMap<String, MediaFiles>>,
    is_active: bool,
    created_by: Option<UserId>,
    updated_by: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<ResourceRow> for Resource {
    fn from(row: ResourceRow) -> Self {
        Self {
            id: row.id,
            entity_type: row.entity_type,
            slug: row.slug,
            fields: row.fields.0,
            is_active: row.is_active,
            state: LifecycleState::from_trash_marker(row.deleted_at),
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            media: row.media.0,
        }
    }
}

fn scope_clause(scope: Scope) -> &'static str {
    match scope {
        Scope::Active => " AND deleted_at IS NULL",
        Scope::Trashed => " AND deleted_at IS NOT NULL",
        Scope::WithTrashed => "",
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// `%term%` with LIKE wildcards in `term` escaped.
fn like_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

fn prefix_pattern(prefix: &str) -> String {
    format!("{}%", escape_like(prefix))
}

fn uuids(ids: &[ResourceId]) -> Vec<Uuid> {
    ids.iter().map(|id| id.into_inner()).collect()
}

/// Rows of `entity`, except `exclude`, with a media field pointing at
/// `stored_name` through its original or one of its variants.
async fn count_media_references<'e, E>(
    executor: E,
    entity: &str,
    stored_name: &str,
    exclude: Option<ResourceId>,
) -> Result<i64, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM resources r
         WHERE r.entity_type = $1 AND ($3::uuid IS NULL OR r.id <> $3)
           AND EXISTS (
               SELECT 1 FROM jsonb_each(r.media) m
               WHERE m.value->>'original' = $2
                  OR EXISTS (
                      SELECT 1 FROM jsonb_each_text(COALESCE(m.value->'variants', '{}'::jsonb)) v
                      WHERE v.value = $2
                  )
           )",
    )
    .bind(entity)
    .bind(stored_name)
    .bind(exclude)
    .fetch_one(executor)
    .await?;

    Ok(count)
}

/// Maps a violation of the slug index to [`RepositoryError::SlugTaken`].
fn slug_violation(e: sqlx::Error, slug: Option<&str>) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &e
        && db_err.is_unique_violation()
        && db_err.constraint() == Some(SLUG_CONSTRAINT)
    {
        return RepositoryError::SlugTaken(slug.unwrap_or_default().to_string());
    }
    RepositoryError::from(e)
}

#[derive(Debug, Clone)]
pub struct PgResourceRepository {
    pool: PgPool,
}

impl PgResourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceRepository for PgResourceRepository {
    type Tx = PgResourceTx;

    async fn begin(&self) -> Result<PgResourceTx, RepositoryError> {
        Ok(PgResourceTx {
            tx: self.pool.begin().await?,
        })
    }

    #[instrument(skip(self), fields(db.table = "resources", db.operation = "SELECT"))]
    async fn find(
        &self,
        entity: &str,
        id: ResourceId,
        scope: Scope,
    ) -> Result<Option<Resource>, RepositoryError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM resources WHERE id = $1 AND entity_type = $2{}",
            scope_clause(scope)
        );
        let row = sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(id)
            .bind(entity)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Resource::from))
    }

    #[instrument(skip(self, params), fields(db.table = "resources", db.operation = "SELECT"))]
    async fn list(
        &self,
        entity: &str,
        scope: Scope,
        params: &ListParams,
    ) -> Result<Page<Resource>, RepositoryError> {
        let limit = params.limit();
        let offset = params.offset();

        let mut where_clause = format!(" WHERE entity_type = $1{}", scope_clause(scope));
        let mut binds: Vec<String> = Vec::new();

        match params.status.flag() {
            Some(true) => where_clause.push_str(" AND is_active"),
            Some(false) => where_clause.push_str(" AND NOT is_active"),
            None => {}
        }

        if let Some(term) = params.search_term() {
            binds.push(like_pattern(term));
            where_clause.push_str(&format!(
                " AND (slug ILIKE ${n} OR EXISTS \
                 (SELECT 1 FROM jsonb_each_text(fields) f WHERE f.value ILIKE ${n}))",
                n = binds.len() + 1
            ));
        }

        let count_query = format!("SELECT COUNT(*) FROM resources{where_clause}");
        let mut count_sql = sqlx::query_scalar::<_, i64>(&count_query).bind(entity);
        for bind in &binds {
            count_sql = count_sql.bind(bind);
        }
        let total = count_sql.fetch_one(&self.pool).await?;

        let key = params.sort_key();
        let order = if SORTABLE_COLUMNS.contains(&key) {
            key.to_string()
        } else {
            binds.push(key.to_string());
            format!("fields->>${}", binds.len() + 1)
        };
        let direction = params.direction.as_sql();

        let data_query = format!(
            "SELECT {COLUMNS} FROM resources{where_clause} \
             ORDER BY {order} {direction}, id {direction} LIMIT {limit} OFFSET {offset}"
        );
        let mut data_sql = sqlx::query_as::<_, ResourceRow>(&data_query).bind(entity);
        for bind in binds {
            data_sql = data_sql.bind(bind);
        }
        let rows = data_sql.fetch_all(&self.pool).await?;

        Ok(Page {
            data: rows.into_iter().map(Resource::from).collect(),
            meta: PaginationMeta::new(total, params),
        })
    }

    #[instrument(skip(self, ids), fields(db.table = "resources", db.operation = "SELECT"))]
    async fn trashed_ids(
        &self,
        entity: &str,
        ids: Option<&[ResourceId]>,
    ) -> Result<Vec<ResourceId>, RepositoryError> {
        let found = match ids {
            Some(ids) => {
                sqlx::query_scalar::<_, ResourceId>(
                    "SELECT id FROM resources
                     WHERE entity_type = $1 AND id = ANY($2) AND deleted_at IS NOT NULL
                     ORDER BY id",
                )
                .bind(entity)
                .bind(uuids(ids))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar::<_, ResourceId>(
                    "SELECT id FROM resources
                     WHERE entity_type = $1 AND deleted_at IS NOT NULL
                     ORDER BY id",
                )
                .bind(entity)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(found)
    }

    #[instrument(skip(self), fields(db.table = "resources", db.operation = "SELECT"))]
    async fn statistics(
        &self,
        entity: &str,
        windows: &StatWindows,
    ) -> Result<Statistics, RepositoryError> {
        let (total, active, inactive, trashed, this_month, this_week, today) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64, i64)>(
                r#"SELECT
                    COUNT(*) FILTER (WHERE deleted_at IS NULL),
                    COUNT(*) FILTER (WHERE deleted_at IS NULL AND is_active),
                    COUNT(*) FILTER (WHERE deleted_at IS NULL AND NOT is_active),
                    COUNT(*) FILTER (WHERE deleted_at IS NOT NULL),
                    COUNT(*) FILTER (WHERE deleted_at IS NULL AND created_at >= $2),
                    COUNT(*) FILTER (WHERE deleted_at IS NULL AND created_at >= $3),
                    COUNT(*) FILTER (WHERE deleted_at IS NULL AND created_at >= $4)
                   FROM resources
                   WHERE entity_type = $1"#,
            )
            .bind(entity)
            .bind(windows.month_start)
            .bind(windows.week_start)
            .bind(windows.day_start)
            .fetch_one(&self.pool)
            .await?;

        Ok(Statistics {
            total,
            active,
            inactive,
            trashed,
            this_month,
            this_week,
            today,
        })
    }

    #[instrument(skip(self), fields(db.table = "resources", db.operation = "SELECT"))]
    async fn media_references(
        &self,
        entity: &str,
        stored_name: &str,
    ) -> Result<i64, RepositoryError> {
        count_media_references(&self.pool, entity, stored_name, None).await
    }
}

pub struct PgResourceTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ResourceTx for PgResourceTx {
    #[instrument(skip(self), fields(db.table = "resources", db.operation = "SELECT"))]
    async fn find(
        &mut self,
        entity: &str,
        id: ResourceId,
        scope: Scope,
    ) -> Result<Option<Resource>, RepositoryError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM resources WHERE id = $1 AND entity_type = $2{} FOR UPDATE",
            scope_clause(scope)
        );
        let row = sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(id)
            .bind(entity)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(Resource::from))
    }

    async fn slugs_with_prefix(
        &mut self,
        entity: &str,
        prefix: &str,
    ) -> Result<Vec<(ResourceId, String)>, RepositoryError> {
        let slugs = sqlx::query_as::<_, (ResourceId, String)>(
            "SELECT id, slug FROM resources WHERE entity_type = $1 AND slug LIKE $2",
        )
        .bind(entity)
        .bind(prefix_pattern(prefix))
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(slugs)
    }

    #[instrument(skip(self, draft), fields(db.table = "resources", db.operation = "INSERT", slug = ?draft.slug))]
    async fn insert(&mut self, draft: &ResourceDraft) -> Result<Resource, RepositoryError> {
        let sql = format!(
            "INSERT INTO resources
                (id, entity_type, slug, fields, media, is_active, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );

        let mut savepoint = sqlx::Connection::begin(&mut *self.tx).await?;
        let result = sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(draft.id)
            .bind(&draft.entity_type)
            .bind(&draft.slug)
            .bind(Json(&draft.fields))
            .bind(Json(&draft.media))
            .bind(draft.is_active)
            .bind(draft.created_by)
            .fetch_one(&mut *savepoint)
            .await;

        match result {
            Ok(row) => {
                savepoint.commit().await?;
                Ok(row.into())
            }
            Err(e) => {
                savepoint.rollback().await?;
                debug!(error = %e, "Insert rolled back to savepoint");
                Err(slug_violation(e, draft.slug.as_deref()))
            }
        }
    }

    #[instrument(skip(self, resource), fields(db.table = "resources", db.operation = "UPDATE", id = %resource.id))]
    async fn save(&mut self, resource: &Resource) -> Result<Resource, RepositoryError> {
        let sql = format!(
            "UPDATE resources
             SET slug = $3, fields = $4, media = $5, is_active = $6, updated_by = $7,
                 updated_at = NOW()
             WHERE id = $1 AND entity_type = $2
             RETURNING {COLUMNS}"
        );

        let mut savepoint = sqlx::Connection::begin(&mut *self.tx).await?;
        let result = sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(resource.id)
            .bind(&resource.entity_type)
            .bind(&resource.slug)
            .bind(Json(&resource.fields))
            .bind(Json(&resource.media))
            .bind(resource.is_active)
            .bind(resource.updated_by)
            .fetch_one(&mut *savepoint)
            .await;

        match result {
            Ok(row) => {
                savepoint.commit().await?;
                Ok(row.into())
            }
            Err(e) => {
                savepoint.rollback().await?;
                debug!(error = %e, "Update rolled back to savepoint");
                Err(slug_violation(e, resource.slug.as_deref()))
            }
        }
    }

    #[instrument(skip(self, ids), fields(db.table = "resources", db.operation = "UPDATE", count = ids.len()))]
    async fn trash(&mut self, entity: &str, ids: &[ResourceId]) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE resources SET deleted_at = NOW(), updated_at = NOW()
             WHERE entity_type = $1 AND id = ANY($2) AND deleted_at IS NULL",
        )
        .bind(entity)
        .bind(uuids(ids))
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, ids), fields(db.table = "resources", db.operation = "UPDATE", count = ids.len()))]
    async fn restore(
        &mut self,
        entity: &str,
        ids: &[ResourceId],
        actor: Option<UserId>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE resources
             SET deleted_at = NULL, updated_at = NOW(), updated_by = COALESCE($3, updated_by)
             WHERE entity_type = $1 AND id = ANY($2) AND deleted_at IS NOT NULL",
        )
        .bind(entity)
        .bind(uuids(ids))
        .bind(actor)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, ids), fields(db.table = "resources", db.operation = "UPDATE", count = ids.len()))]
    async fn set_status(
        &mut self,
        entity: &str,
        ids: &[ResourceId],
        active: bool,
        actor: Option<UserId>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE resources
             SET is_active = $3, updated_at = NOW(), updated_by = COALESCE($4, updated_by)
             WHERE entity_type = $1 AND id = ANY($2) AND is_active <> $3",
        )
        .bind(entity)
        .bind(uuids(ids))
        .bind(active)
        .bind(actor)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn trashed_ids(
        &mut self,
        entity: &str,
        ids: &[ResourceId],
    ) -> Result<Vec<ResourceId>, RepositoryError> {
        let found = sqlx::query_scalar::<_, ResourceId>(
            "SELECT id FROM resources
             WHERE entity_type = $1 AND id = ANY($2) AND deleted_at IS NOT NULL
             ORDER BY id
             FOR UPDATE",
        )
        .bind(entity)
        .bind(uuids(ids))
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(found)
    }

    #[instrument(skip(self), fields(db.table = "resources", db.operation = "DELETE"))]
    async fn remove(&mut self, entity: &str, id: ResourceId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM resources WHERE id = $1 AND entity_type = $2")
            .bind(id)
            .bind(entity)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn media_references(
        &mut self,
        entity: &str,
        stored_name: &str,
        exclude: ResourceId,
    ) -> Result<i64, RepositoryError> {
        count_media_references(&mut *self.tx, entity, stored_name, Some(exclude)).await
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}
