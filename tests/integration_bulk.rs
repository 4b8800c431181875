mod common;

use campusdesk::catalog;
use campusdesk_core::LifecycleError;
use campusdesk_models::{BulkOperation, ResourceId};
use common::{TestContext, actor, png, setup, titled, titled_with_upload};

async fn seed_news(ctx: &TestContext, count: usize) -> Vec<ResourceId> {
    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        let news = ctx
            .manager
            .create(titled(&format!("Bulletin {n}")), None)
            .await
            .unwrap();
        ids.push(news.id);
    }
    ids
}

#[tokio::test]
async fn test_bulk_trash_counts_matches_only() {
    let ctx = setup(catalog::news());
    let ids = seed_news(&ctx, 2).await;

    let affected = ctx
        .manager
        .bulk_apply(&[ids[0], ResourceId::new()], BulkOperation::SoftDelete, None)
        .await
        .unwrap();
    assert_eq!(affected, 1);

    // Already trashed rows do not count again
    let affected = ctx
        .manager
        .bulk_apply(&ids, BulkOperation::SoftDelete, None)
        .await
        .unwrap();
    assert_eq!(affected, 1);
    assert!(ctx.repo.row(ids[1]).unwrap().state.is_trashed());
}

#[tokio::test]
async fn test_bulk_trash_without_matches_is_not_found() {
    let ctx = setup(catalog::news());
    seed_news(&ctx, 1).await;

    let err = ctx
        .manager
        .bulk_apply(&[ResourceId::new()], BulkOperation::SoftDelete, None)
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::NotFound { .. }));
}

#[tokio::test]
async fn test_bulk_ids_are_deduplicated() {
    let ctx = setup(catalog::news());
    let ids = seed_news(&ctx, 1).await;

    let affected = ctx
        .manager
        .bulk_apply(&[ids[0], ids[0], ids[0]], BulkOperation::SoftDelete, None)
        .await
        .unwrap();

    assert_eq!(affected, 1);
}

#[tokio::test]
async fn test_bulk_restore_takes_trashed_subset() {
    let ctx = setup(catalog::news());
    let ids = seed_news(&ctx, 3).await;
    ctx.manager.delete(ids[0]).await.unwrap();
    ctx.manager.delete(ids[1]).await.unwrap();

    let restorer = actor();
    let affected = ctx
        .manager
        .bulk_apply(&ids, BulkOperation::Restore, restorer)
        .await
        .unwrap();

    assert_eq!(affected, 2);
    for id in &ids[..2] {
        let row = ctx.repo.row(*id).unwrap();
        assert!(row.state.is_active());
        assert_eq!(row.updated_by, restorer);
    }
    assert_eq!(ctx.repo.row(ids[2]).unwrap().updated_by, None);
}

#[tokio::test]
async fn test_bulk_restore_with_nothing_trashed() {
    let ctx = setup(catalog::news());
    let ids = seed_news(&ctx, 2).await;

    let err = ctx
        .manager
        .bulk_apply(&ids, BulkOperation::Restore, None)
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::NotFoundInTrash { .. }));
}

#[tokio::test]
async fn test_bulk_set_status_counts_changed_rows() {
    let ctx = setup(catalog::news());
    let ids = seed_news(&ctx, 3).await;
    ctx.manager.toggle_status(ids[0], None).await.unwrap();
    ctx.manager.delete(ids[1]).await.unwrap();

    // ids[0] is already inactive; the trashed ids[1] still changes
    let affected = ctx
        .manager
        .bulk_apply(&ids, BulkOperation::SetStatus(false), None)
        .await
        .unwrap();
    assert_eq!(affected, 2);
    assert!(ids.iter().all(|id| !ctx.repo.row(*id).unwrap().is_active));

    let err = ctx
        .manager
        .bulk_apply(&ids, BulkOperation::SetStatus(false), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }));

    let affected = ctx
        .manager
        .bulk_apply(&ids[2..], BulkOperation::SetStatus(true), actor())
        .await
        .unwrap();
    assert_eq!(affected, 1);
}

#[tokio::test]
async fn test_bulk_force_delete_skips_active_rows() {
    let ctx = setup(catalog::news());
    let ids = seed_news(&ctx, 3).await;
    ctx.manager.delete(ids[0]).await.unwrap();
    ctx.manager.delete(ids[1]).await.unwrap();

    let affected = ctx
        .manager
        .bulk_apply(&ids, BulkOperation::ForceDelete, None)
        .await
        .unwrap();

    assert_eq!(affected, 2);
    assert!(ctx.repo.row(ids[0]).is_none());
    assert!(ctx.repo.row(ids[1]).is_none());
    assert!(ctx.repo.row(ids[2]).is_some());

    let err = ctx
        .manager
        .bulk_apply(&ids[2..], BulkOperation::ForceDelete, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFoundInTrash { .. }));
}

#[tokio::test]
async fn test_bulk_force_delete_releases_media() {
    let ctx = setup(catalog::slider());
    let mut ids = Vec::new();
    for shade in 0..3u8 {
        let slider = ctx
            .manager
            .create(titled_with_upload("Slide", "image", png(32, 16, shade)), None)
            .await
            .unwrap();
        ids.push(slider.id);
    }
    ctx.manager
        .bulk_apply(&ids, BulkOperation::SoftDelete, None)
        .await
        .unwrap();
    assert_eq!(ctx.file_count(), 6);

    let affected = ctx
        .manager
        .bulk_apply(&ids, BulkOperation::ForceDelete, None)
        .await
        .unwrap();

    assert_eq!(affected, 3);
    assert_eq!(ctx.file_count(), 0);
}

#[tokio::test]
async fn test_empty_trash() {
    let ctx = setup(catalog::news());
    assert_eq!(ctx.manager.empty_trash().await.unwrap(), 0);

    let ids = seed_news(&ctx, 4).await;
    ctx.manager
        .bulk_apply(&ids[..3], BulkOperation::SoftDelete, None)
        .await
        .unwrap();

    assert_eq!(ctx.manager.empty_trash().await.unwrap(), 3);
    assert_eq!(ctx.repo.count("news"), 1);
    assert_eq!(ctx.manager.empty_trash().await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_trash_stays_within_entity_type() {
    let ctx = setup(catalog::news());
    let events = campusdesk::LifecycleManager::new(
        ctx.repo.clone(),
        ctx.manager.media().clone(),
        catalog::event(),
    );
    let news = seed_news(&ctx, 1).await;
    let event = events.create(titled("Open house"), None).await.unwrap();
    ctx.manager.delete(news[0]).await.unwrap();
    events.delete(event.id).await.unwrap();

    assert_eq!(ctx.manager.empty_trash().await.unwrap(), 1);
    assert!(ctx.repo.row(event.id).is_some());
}
