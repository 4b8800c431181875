//! # Campusdesk Models
//!
//! Data structures shared by the lifecycle core and its persistence layer.
//!
//! - [`ids`]: Strongly-typed resource and actor ids
//! - [`resource`]: The generic resource, its lifecycle state and drafts
//! - [`entity`]: Entity type definitions (slug source, media fields, variants)
//! - [`statistics`]: Statistics counts and time windows
//! - [`bulk`]: Bulk operations

pub mod bulk;
pub mod entity;
pub mod ids;
pub mod resource;
pub mod statistics;

// Re-export commonly used types at crate root for convenience
pub use bulk::BulkOperation;
pub use entity::{Bounds, EntityDefinition, FitMode, MediaFieldSpec, VariantSpec};
pub use ids::{ResourceId, UserId};
pub use resource::{
    FieldSet, LifecycleState, MediaFiles, MediaUpload, Resource, ResourceDraft, ResourceInput,
    Scope,
};
pub use statistics::{StatWindows, Statistics};
