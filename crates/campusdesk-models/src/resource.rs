//! The generic managed resource and its lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::ids::{ResourceId, UserId};

/// Entity-specific field values, as validated by the request layer.
pub type FieldSet = serde_json::Map<String, Value>;

/// Where a resource sits in its lifecycle.
///
/// The trash marker is a state here rather than a nullable column every query
/// has to remember; repositories translate to and from `deleted_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    Trashed { since: DateTime<Utc> },
    /// Terminal. Only ever observed on the value returned by a purge.
    Purged,
}

impl LifecycleState {
    pub fn from_trash_marker(deleted_at: Option<DateTime<Utc>>) -> Self {
        match deleted_at {
            Some(since) => Self::Trashed { since },
            None => Self::Active,
        }
    }

    pub fn trash_marker(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Trashed { since } => Some(*since),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_trashed(&self) -> bool {
        matches!(self, Self::Trashed { .. })
    }
}

/// Row visibility used by lookups and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Normal listings: trash marker absent.
    Active,
    /// Trash listings: trash marker set.
    Trashed,
    WithTrashed,
}

impl Scope {
    pub fn admits(self, state: &LifecycleState) -> bool {
        match self {
            Self::Active => state.is_active(),
            Self::Trashed => state.is_trashed(),
            Self::WithTrashed => !matches!(state, LifecycleState::Purged),
        }
    }
}

/// Stored files behind one media field: the bounded original plus any
/// named variants produced from the same upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFiles {
    pub original: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variants: BTreeMap<String, String>,
}

impl MediaFiles {
    pub fn single(original: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            variants: BTreeMap::new(),
        }
    }

    /// Every stored name, original first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.original.as_str()).chain(self.variants.values().map(String::as_str))
    }

    pub fn contains(&self, stored_name: &str) -> bool {
        self.names().any(|name| name == stored_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub entity_type: String,
    pub slug: Option<String>,
    pub fields: FieldSet,
    /// Active/inactive flag, independent of the trash state.
    pub is_active: bool,
    #[serde(flatten)]
    pub state: LifecycleState,
    pub created_by: Option<UserId>,
    pub updated_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub media: BTreeMap<String, MediaFiles>,
}

impl Resource {
    /// String value of a field, if present and a string.
    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Whether any media field of this resource points at `stored_name`.
    pub fn references_media(&self, stored_name: &str) -> bool {
        self.media.values().any(|files| files.contains(stored_name))
    }

    /// Copies this resource into a draft for a new row.
    ///
    /// Identity, slug, status and audit fields are not carried over: the copy
    /// gets a fresh id, no slug (the caller derives one), starts inactive and
    /// is attributed to `actor`. Media references are shared with the source.
    pub fn clone_draft(&self, actor: Option<UserId>) -> ResourceDraft {
        ResourceDraft {
            id: ResourceId::new(),
            entity_type: self.entity_type.clone(),
            slug: None,
            fields: self.fields.clone(),
            is_active: false,
            media: self.media.clone(),
            created_by: actor,
        }
    }
}

/// A resource that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDraft {
    pub id: ResourceId,
    pub entity_type: String,
    pub slug: Option<String>,
    pub fields: FieldSet,
    pub is_active: bool,
    pub media: BTreeMap<String, MediaFiles>,
    pub created_by: Option<UserId>,
}

impl ResourceDraft {
    pub fn new(entity_type: impl Into<String>, fields: FieldSet, is_active: bool) -> Self {
        Self {
            id: ResourceId::new(),
            entity_type: entity_type.into(),
            slug: None,
            fields,
            is_active,
            media: BTreeMap::new(),
            created_by: None,
        }
    }
}

/// An uploaded file for one media field.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaUpload {
    pub field: String,
    pub bytes: Vec<u8>,
    /// Declared bounds; fall back to the field definition when absent.
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

impl MediaUpload {
    pub fn new(field: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            bytes,
            max_width: None,
            max_height: None,
        }
    }

    pub fn bounded(mut self, max_width: u32, max_height: u32) -> Self {
        self.max_width = Some(max_width);
        self.max_height = Some(max_height);
        self
    }
}

impl std::fmt::Debug for MediaUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaUpload")
            .field("field", &self.field)
            .field("size", &self.bytes.len())
            .field("max_width", &self.max_width)
            .field("max_height", &self.max_height)
            .finish()
    }
}

/// Validated data handed over by the request layer for create and update.
#[derive(Debug, Clone, Default)]
pub struct ResourceInput {
    /// Field values; on update they are merged over the existing set.
    pub fields: FieldSet,
    /// Status flag; create defaults to active, update keeps the current value.
    pub is_active: Option<bool>,
    pub uploads: Vec<MediaUpload>,
    /// Reject uploads whose bytes are already stored in the namespace.
    /// Only honoured by create.
    pub prevent_duplicate: bool,
}

impl ResourceInput {
    pub fn with_fields(fields: FieldSet) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    pub fn upload(mut self, upload: MediaUpload) -> Self {
        self.uploads.push(upload);
        self
    }

    pub fn prevent_duplicate(mut self) -> Self {
        self.prevent_duplicate = true;
        self
    }
}
