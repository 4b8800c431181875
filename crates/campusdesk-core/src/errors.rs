//! Error taxonomy for resource lifecycle operations.
//!
//! Every manager operation returns [`LifecycleError`]. Lookup and duplicate
//! errors are raised before any write; storage and database failures abort the
//! enclosing transaction.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::file_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Single-entity lookup miss in the active scope.
    #[error("{entity} not found")]
    NotFound { entity: String },

    /// Lookup miss restricted to trashed rows.
    #[error("{entity} not found in trash")]
    NotFoundInTrash { entity: String },

    /// Fingerprint collision on create. Carries the stored name of the
    /// existing file.
    #[error("identical content already stored as {existing}")]
    DuplicateContent { existing: String },

    /// Slug or other unique-constraint race left unresolved after retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller-supplied data violates a lifecycle invariant.
    #[error("{0}")]
    ValidationConflict(String),

    #[error("storage failure: {0}")]
    StorageIo(#[source] StorageError),

    #[error("database error: {0}")]
    Database(#[source] anyhow::Error),
}

impl LifecycleError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    pub fn not_found_in_trash(entity: impl Into<String>) -> Self {
        Self::NotFoundInTrash {
            entity: entity.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationConflict(message.into())
    }

    pub fn database<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self::Database(err.into())
    }

    /// HTTP status the request layer should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } | Self::NotFoundInTrash { .. } => StatusCode::NOT_FOUND,
            Self::DuplicateContent { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ValidationConflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::StorageIo(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for LifecycleError {
    fn from(err: StorageError) -> Self {
        match err {
            // Oversized uploads and malformed keys are caller data, not I/O.
            StorageError::InvalidFileSize { .. }
            | StorageError::InvalidKey(_)
            | StorageError::NotAnImage => {
                Self::ValidationConflict(err.to_string())
            }
            other => Self::StorageIo(other),
        }
    }
}

impl IntoResponse for LifecycleError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::DuplicateContent { existing } => Json(json!({
                "error": self.to_string(),
                "existing": existing,
            })),
            _ => Json(json!({
                "error": self.to_string()
            })),
        };

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            LifecycleError::not_found("course").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LifecycleError::not_found_in_trash("course").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LifecycleError::DuplicateContent {
                existing: "course/ab/abcd.png".into()
            }
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            LifecycleError::validation("trash it first").status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_oversized_upload_is_a_validation_conflict() {
        let err: LifecycleError = StorageError::InvalidFileSize { max_bytes: 10 }.into();
        assert!(matches!(err, LifecycleError::ValidationConflict(_)));

        let err: LifecycleError =
            StorageError::Io(std::io::Error::other("disk full")).into();
        assert!(matches!(err, LifecycleError::StorageIo(_)));
    }

    #[test]
    fn test_messages_name_the_entity() {
        assert_eq!(
            LifecycleError::not_found_in_trash("slider").to_string(),
            "slider not found in trash"
        );
    }
}
