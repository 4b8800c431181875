use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use campusdesk_core::{LifecycleError, StorageError};
use serde_json::Value;

async fn body_of(err: LifecycleError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_duplicate_content_names_existing_file() {
    let (status, body) = body_of(LifecycleError::DuplicateContent {
        existing: "gallery/ab/abcdef.png".into(),
    })
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["existing"], "gallery/ab/abcdef.png");
}

#[tokio::test]
async fn test_not_found_in_trash() {
    let (status, body) = body_of(LifecycleError::not_found_in_trash("news")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "news not found in trash");
}

#[tokio::test]
async fn test_non_image_variants_are_unprocessable() {
    let (status, _) = body_of(StorageError::NotAnImage.into()).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_internal_errors() {
    let (status, _) = body_of(LifecycleError::database(anyhow::anyhow!("connection reset"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = body_of(
        StorageError::Io(std::io::Error::other("disk full")).into(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
