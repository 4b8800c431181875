//! # Campusdesk DB
//!
//! PostgreSQL pool initialization and schema migrations.
//!
//! # Example
//!
//! ```ignore
//! use campusdesk_config::DatabaseConfig;
//! use campusdesk_db::{init_db_pool, run_migrations};
//!
//! let pool = init_db_pool(&DatabaseConfig::from_env()).await;
//! run_migrations(&pool).await?;
//! ```

use campusdesk_config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;

/// Initializes a PostgreSQL connection pool.
///
/// # Panics
///
/// Panics if the connection to the database fails. This is meant to be
/// called once during startup.
pub async fn init_db_pool(config: &DatabaseConfig) -> PgPool {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .expect("Failed to connect to database");

    tracing::info!(max_connections = config.max_connections, "Database pool ready");
    pool
}

/// Applies the bundled migrations (the `resources` table and its indexes).
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

// Re-export PgPool for convenience
pub use sqlx::PgPool;
