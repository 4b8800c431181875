mod common;

use std::sync::Arc;

use campusdesk::catalog;
use campusdesk::media::{ContentMediaStore, MediaStore};
use campusdesk_core::{LifecycleError, LocalFileStorage};
use campusdesk_models::{
    EntityDefinition, LifecycleState, MediaFieldSpec, MediaFiles, MediaUpload, Resource,
    ResourceId, ResourceInput, VariantSpec,
};
use chrono::Utc;
use common::{TestContext, image_dimensions, png, setup, titled, titled_with_upload};

fn album() -> EntityDefinition {
    EntityDefinition::new("album").slugged_by("title").with_media(
        MediaFieldSpec::new("cover", 120, 80)
            .with_variant(VariantSpec::cover("thumb", 30, 20))
            .with_variant(VariantSpec::contain("medium", 60, 40)),
    )
}

fn album_ctx() -> TestContext {
    setup(album())
}

#[tokio::test]
async fn test_upload_stores_bounded_original_and_variants() {
    let ctx = album_ctx();

    let album = ctx
        .manager
        .create(titled_with_upload("Sports day", "cover", png(240, 160, 1)), None)
        .await
        .unwrap();

    let files = &album.media["cover"];
    assert!(files.original.starts_with("album/"));
    assert!(files.original.ends_with(".png"));
    assert_eq!(image_dimensions(&ctx.path_of(&files.original)), (120, 80));
    assert_eq!(image_dimensions(&ctx.path_of(&files.variants["thumb"])), (30, 20));
    assert_eq!(image_dimensions(&ctx.path_of(&files.variants["medium"])), (60, 40));
    assert_eq!(ctx.file_count(), 3);
}

#[tokio::test]
async fn test_small_upload_is_stored_verbatim() {
    let ctx = setup(catalog::notice());
    let bytes = png(20, 10, 3);

    let notice = ctx
        .manager
        .create(titled_with_upload("Exam dates", "attachment", bytes.clone()), None)
        .await
        .unwrap();

    let stored = std::fs::read(ctx.path_of(&notice.media["attachment"].original)).unwrap();
    assert_eq!(stored, bytes);
}

#[tokio::test]
async fn test_documents_keep_their_extension() {
    let ctx = setup(catalog::download());
    let pdf = b"%PDF-1.7\n% prospectus\n".to_vec();

    let download = ctx
        .manager
        .create(titled_with_upload("Prospectus", "file", pdf.clone()), None)
        .await
        .unwrap();

    let original = &download.media["file"].original;
    assert!(original.starts_with("download/"));
    assert!(original.ends_with(".pdf"));
    assert_eq!(std::fs::read(ctx.path_of(original)).unwrap(), pdf);
    assert!(
        ctx.manager
            .media_url(original)
            .unwrap()
            .ends_with(original.as_str())
    );
}

#[tokio::test]
async fn test_variants_of_non_image_are_rejected_without_leftovers() {
    let ctx = album_ctx();

    let err = ctx
        .manager
        .create(
            titled_with_upload("Broken", "cover", b"%PDF-1.4 not an image".to_vec()),
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::ValidationConflict(_)), "got {err:?}");
    assert_eq!(ctx.repo.count("album"), 0);
    assert_eq!(ctx.file_count(), 0);
}

#[tokio::test]
async fn test_duplicate_upload_is_rejected_when_requested() {
    let ctx = album_ctx();
    let bytes = png(40, 40, 7);

    let first = ctx
        .manager
        .create(titled_with_upload("Original", "cover", bytes.clone()), None)
        .await
        .unwrap();

    let err = ctx
        .manager
        .create(
            titled_with_upload("Copy", "cover", bytes).prevent_duplicate(),
            None,
        )
        .await
        .unwrap_err();

    match err {
        LifecycleError::DuplicateContent { existing } => {
            assert_eq!(existing, first.media["cover"].original);
        }
        other => panic!("expected DuplicateContent, got {other:?}"),
    }
    assert_eq!(ctx.repo.count("album"), 1);
}

#[tokio::test]
async fn test_identical_uploads_share_files_without_dedup_flag() {
    let ctx = album_ctx();
    let bytes = png(40, 40, 9);

    let a = ctx
        .manager
        .create(titled_with_upload("A", "cover", bytes.clone()), None)
        .await
        .unwrap();
    let b = ctx
        .manager
        .create(titled_with_upload("B", "cover", bytes), None)
        .await
        .unwrap();

    assert_eq!(a.media["cover"], b.media["cover"]);
    assert_eq!(ctx.file_count(), 3);

    // Purging one keeps the shared files for the other
    ctx.manager.delete(a.id).await.unwrap();
    ctx.manager.force_delete(a.id).await.unwrap();
    assert!(ctx.stored(&b.media["cover"].original));

    ctx.manager.delete(b.id).await.unwrap();
    ctx.manager.force_delete(b.id).await.unwrap();
    assert_eq!(ctx.file_count(), 0);
}

#[tokio::test]
async fn test_unknown_media_field_is_rejected() {
    let ctx = album_ctx();

    let err = ctx
        .manager
        .create(titled_with_upload("Odd", "banner", png(10, 10, 1)), None)
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::ValidationConflict(_)));
    assert_eq!(ctx.file_count(), 0);
}

#[tokio::test]
async fn test_empty_upload_is_rejected() {
    let ctx = album_ctx();

    let err = ctx
        .manager
        .create(titled_with_upload("Empty", "cover", Vec::new()), None)
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::ValidationConflict(_)));
}

#[tokio::test]
async fn test_declared_bounds_override_field_bounds() {
    let ctx = album_ctx();
    let input = titled("Bounded").upload(MediaUpload::new("cover", png(240, 160, 4)).bounded(60, 60));

    let album = ctx.manager.create(input, None).await.unwrap();

    assert_eq!(
        image_dimensions(&ctx.path_of(&album.media["cover"].original)),
        (60, 40)
    );
}

#[tokio::test]
async fn test_replace_releases_old_files_after_commit() {
    let ctx = album_ctx();
    let album = ctx
        .manager
        .create(titled_with_upload("Prize day", "cover", png(40, 40, 10)), None)
        .await
        .unwrap();
    let old = album.media["cover"].clone();

    let updated = ctx
        .manager
        .update(
            album.id,
            ResourceInput::default().upload(MediaUpload::new("cover", png(40, 40, 11))),
            None,
        )
        .await
        .unwrap();

    let new = &updated.media["cover"];
    assert_ne!(new.original, old.original);
    assert!(ctx.stored(&new.original));
    for name in old.names() {
        assert!(!ctx.stored(name), "{name} should have been released");
    }
    assert_eq!(ctx.file_count(), 3);
}

#[tokio::test]
async fn test_replace_keeps_files_shared_with_a_duplicate() {
    let ctx = album_ctx();
    let album = ctx
        .manager
        .create(titled_with_upload("Farewell", "cover", png(40, 40, 20)), None)
        .await
        .unwrap();
    let copy = ctx.manager.duplicate(album.id, None).await.unwrap();
    let shared = album.media["cover"].clone();
    assert_eq!(copy.media["cover"], shared);

    ctx.manager
        .update(
            album.id,
            ResourceInput::default().upload(MediaUpload::new("cover", png(40, 40, 21))),
            None,
        )
        .await
        .unwrap();

    for name in shared.names() {
        assert!(ctx.stored(name), "{name} is still used by the copy");
    }
}

#[tokio::test]
async fn test_reuploading_same_bytes_keeps_files() {
    let ctx = album_ctx();
    let bytes = png(40, 40, 30);
    let album = ctx
        .manager
        .create(titled_with_upload("Same", "cover", bytes.clone()), None)
        .await
        .unwrap();

    let updated = ctx
        .manager
        .update(
            album.id,
            ResourceInput::default().upload(MediaUpload::new("cover", bytes)),
            None,
        )
        .await
        .unwrap();

    assert_eq!(updated.media, album.media);
    assert!(ctx.stored(&album.media["cover"].original));
}

#[tokio::test]
async fn test_failed_create_removes_written_files() {
    let ctx = album_ctx();
    ctx.repo.fail_next_write();

    let err = ctx
        .manager
        .create(titled_with_upload("Doomed", "cover", png(40, 40, 40)), None)
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::Database(_)), "got {err:?}");
    assert_eq!(ctx.repo.count("album"), 0);
    assert_eq!(ctx.file_count(), 0);
}

#[tokio::test]
async fn test_failed_create_keeps_preexisting_files() {
    let ctx = album_ctx();
    let bytes = png(40, 40, 41);
    let existing = ctx
        .manager
        .create(titled_with_upload("Kept", "cover", bytes.clone()), None)
        .await
        .unwrap();
    ctx.repo.fail_next_write();

    ctx.manager
        .create(titled_with_upload("Doomed", "cover", bytes), None)
        .await
        .unwrap_err();

    for name in existing.media["cover"].names() {
        assert!(ctx.stored(name));
    }
}

#[tokio::test]
async fn test_failed_update_leaves_row_and_old_files() {
    let ctx = album_ctx();
    let album = ctx
        .manager
        .create(titled_with_upload("Stable", "cover", png(40, 40, 50)), None)
        .await
        .unwrap();
    ctx.repo.fail_next_write();

    ctx.manager
        .update(
            album.id,
            titled("Changed").upload(MediaUpload::new("cover", png(40, 40, 51))),
            None,
        )
        .await
        .unwrap_err();

    let row = ctx.repo.row(album.id).unwrap();
    assert_eq!(row.text_field("title"), Some("Stable"));
    assert_eq!(row.media, album.media);
    assert!(ctx.stored(&album.media["cover"].original));
    assert_eq!(ctx.file_count(), 3);
}

#[tokio::test]
async fn test_trash_keeps_media_and_purge_removes_it() {
    let ctx = album_ctx();
    let album = ctx
        .manager
        .create(titled_with_upload("Retired", "cover", png(40, 40, 60)), None)
        .await
        .unwrap();

    ctx.manager.delete(album.id).await.unwrap();
    assert_eq!(ctx.file_count(), 3);

    ctx.manager.force_delete(album.id).await.unwrap();
    assert_eq!(ctx.file_count(), 0);
}

fn poster() -> EntityDefinition {
    EntityDefinition::new("poster")
        .slugged_by("title")
        .with_media(
            MediaFieldSpec::new("cover", 300, 300).with_variant(VariantSpec::cover("thumb", 40, 40)),
        )
        .with_media(
            MediaFieldSpec::new("banner", 50, 50).with_variant(VariantSpec::cover("thumb", 20, 10)),
        )
}

/// Two fields with identical processing, so the same upload shares files.
fn profile() -> EntityDefinition {
    let field = |name| {
        MediaFieldSpec::new(name, 100, 100).with_variant(VariantSpec::cover("thumb", 20, 20))
    };
    EntityDefinition::new("profile")
        .slugged_by("title")
        .with_media(field("photo"))
        .with_media(field("avatar"))
}

#[tokio::test]
async fn test_same_bytes_under_other_bounds_are_resized_again() {
    let ctx = setup(poster());
    let bytes = png(200, 100, 70);

    let small = ctx
        .manager
        .create(titled_with_upload("Small", "banner", bytes.clone()), None)
        .await
        .unwrap();
    let large = ctx
        .manager
        .create(titled_with_upload("Large", "cover", bytes.clone()), None)
        .await
        .unwrap();

    let small = &small.media["banner"].original;
    let large = &large.media["cover"].original;
    assert_ne!(small, large);
    assert_eq!(image_dimensions(&ctx.path_of(small)), (50, 25));
    assert_eq!(image_dimensions(&ctx.path_of(large)), (200, 100));

    // Either stored size still counts as the same content
    let err = ctx
        .manager
        .create(
            titled_with_upload("Again", "cover", bytes).prevent_duplicate(),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::DuplicateContent { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_variants_with_the_same_name_keep_their_own_sizes() {
    let ctx = setup(poster());
    let bytes = png(200, 100, 71);

    let poster = ctx
        .manager
        .create(
            titled("Both")
                .upload(MediaUpload::new("cover", bytes.clone()))
                .upload(MediaUpload::new("banner", bytes)),
            None,
        )
        .await
        .unwrap();

    let cover_thumb = &poster.media["cover"].variants["thumb"];
    let banner_thumb = &poster.media["banner"].variants["thumb"];
    assert_ne!(cover_thumb, banner_thumb);
    assert_eq!(image_dimensions(&ctx.path_of(cover_thumb)), (40, 40));
    assert_eq!(image_dimensions(&ctx.path_of(banner_thumb)), (20, 10));
    assert_eq!(ctx.file_count(), 4);
}

#[tokio::test]
async fn test_replacing_one_field_keeps_files_another_field_uses() {
    let ctx = setup(profile());
    let bytes = png(60, 60, 72);
    let profile = ctx
        .manager
        .create(
            titled("Head teacher")
                .upload(MediaUpload::new("photo", bytes.clone()))
                .upload(MediaUpload::new("avatar", bytes)),
            None,
        )
        .await
        .unwrap();
    let shared = profile.media["avatar"].clone();
    assert_eq!(profile.media["photo"], shared);

    let updated = ctx
        .manager
        .update(
            profile.id,
            ResourceInput::default().upload(MediaUpload::new("photo", png(60, 60, 73))),
            None,
        )
        .await
        .unwrap();

    assert_eq!(updated.media["avatar"], shared);
    assert_ne!(updated.media["photo"], shared);
    for name in shared.names() {
        assert!(ctx.stored(name), "{name} is still used by the avatar");
    }
    assert_eq!(ctx.file_count(), 4);
}

#[tokio::test]
async fn test_rollback_keeps_files_a_concurrent_writer_committed() {
    let ctx = album_ctx();
    let bytes = png(40, 40, 74);
    let cover = album().media_field("cover").cloned().unwrap();

    // Names the upload will get, computed in a scratch store
    let scratch = tempfile::tempdir().unwrap();
    let files = ContentMediaStore::new(Arc::new(LocalFileStorage::new(
        scratch.path().to_path_buf(),
        "http://localhost:3000/media".to_string(),
    )))
    .store_field(&bytes, "album", &cover)
    .await
    .unwrap();

    // Another writer reuses the same files and commits while our insert fails
    let now = Utc::now();
    ctx.repo.simulate_concurrent_commit(Resource {
        id: ResourceId::new(),
        entity_type: "album".into(),
        slug: Some("concurrent".into()),
        fields: Default::default(),
        is_active: true,
        state: LifecycleState::Active,
        created_by: None,
        updated_by: None,
        created_at: now,
        updated_at: now,
        media: [("cover".to_string(), files.clone())].into_iter().collect(),
    });
    ctx.repo.fail_next_write();

    let err = ctx
        .manager
        .create(titled_with_upload("Doomed", "cover", bytes), None)
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::Database(_)), "got {err:?}");
    assert_eq!(ctx.repo.count("album"), 1);
    for name in files.names() {
        assert!(ctx.stored(name), "{name} is referenced by the committed row");
    }
}

#[tokio::test]
async fn test_purge_keeps_a_variant_shared_under_another_original() {
    let ctx = setup(poster());
    let bytes = png(200, 100, 75);
    let poster = ctx
        .manager
        .create(titled_with_upload("Shared thumb", "cover", bytes), None)
        .await
        .unwrap();
    let thumb = poster.media["cover"].variants["thumb"].clone();

    // A row pointing at the thumb alone, as its original
    let now = Utc::now();
    ctx.repo.seed(Resource {
        id: ResourceId::new(),
        entity_type: "poster".into(),
        slug: None,
        fields: Default::default(),
        is_active: true,
        state: LifecycleState::Active,
        created_by: None,
        updated_by: None,
        created_at: now,
        updated_at: now,
        media: [("banner".to_string(), MediaFiles::single(thumb.clone()))]
            .into_iter()
            .collect(),
    });

    ctx.manager.delete(poster.id).await.unwrap();
    ctx.manager.force_delete(poster.id).await.unwrap();

    assert!(ctx.stored(&thumb));
    assert!(!ctx.stored(&poster.media["cover"].original));
    assert_eq!(ctx.file_count(), 1);
}
