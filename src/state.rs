use campusdesk_config::{DatabaseConfig, MediaConfig};
use campusdesk_db::{PgPool, init_db_pool, run_migrations};
use campusdesk_models::EntityDefinition;

use crate::lifecycle::LifecycleManager;
use crate::media::ContentMediaStore;
use crate::repository::PgResourceRepository;

/// Lifecycle manager backed by PostgreSQL and the local media store.
pub type PgLifecycleManager = LifecycleManager<PgResourceRepository, ContentMediaStore>;

#[derive(Clone, Debug)]
pub struct AppState {
    pub db: PgPool,
    pub media: ContentMediaStore,
    pub media_config: MediaConfig,
}

/// Loads `.env`, connects the pool, applies migrations and opens the media
/// store.
///
/// # Panics
///
/// Panics when the database is unreachable or migrations fail. Meant to run
/// once at startup.
pub async fn init_app_state() -> AppState {
    dotenvy::dotenv().ok();

    let db = init_db_pool(&DatabaseConfig::from_env()).await;
    if let Err(e) = run_migrations(&db).await {
        tracing::error!(error = %e, "Failed to run migrations");
        panic!("Failed to run migrations: {e}");
    }

    let media_config = MediaConfig::from_env();
    tracing::info!(
        root = %media_config.root.display(),
        base_url = %media_config.base_url,
        "Media store ready"
    );

    AppState {
        db,
        media: ContentMediaStore::local(&media_config),
        media_config,
    }
}

impl AppState {
    /// Manager for one entity type, sharing this state's pool and store.
    pub fn manager(&self, definition: EntityDefinition) -> PgLifecycleManager {
        LifecycleManager::new(
            PgResourceRepository::new(self.db.clone()),
            self.media.clone(),
            definition,
        )
    }
}
