//! # Campusdesk Config
//!
//! Configuration structures loaded from environment variables:
//!
//! - [`database`]: PostgreSQL connection settings
//! - [`media`]: Upload storage location, public URL and size limit
//!
//! # Example
//!
//! ```ignore
//! use campusdesk_config::{DatabaseConfig, MediaConfig};
//!
//! let database_config = DatabaseConfig::from_env();
//! let media_config = MediaConfig::from_env();
//! ```

pub mod database;
pub mod media;

// Re-export commonly used types at crate root
pub use database::DatabaseConfig;
pub use media::MediaConfig;
