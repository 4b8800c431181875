//! # Campusdesk Core
//!
//! Core types, errors, and utilities shared by the Campusdesk back office.
//!
//! - [`errors`]: Lifecycle error taxonomy with HTTP response conversion
//! - [`file_storage`]: Pluggable file storage backends for uploaded media
//! - [`pagination`]: Listing parameters and pagination metadata
//!
//! # Example
//!
//! ```ignore
//! use campusdesk_core::errors::LifecycleError;
//! use campusdesk_core::pagination::ListParams;
//!
//! let error = LifecycleError::not_found("course");
//! let params = ListParams::default();
//! let limit = params.limit();
//! ```

pub mod errors;
pub mod file_storage;
pub mod pagination;

// Re-export commonly used types at crate root
pub use errors::LifecycleError;
pub use file_storage::{FileStorage, LocalFileStorage, StorageError};
pub use pagination::{ListParams, Page, PaginationMeta, SortDirection, StatusFilter};
