//! Lifecycle counters.
//!
//! Every counter carries an `entity` label so dashboards can split by type.

use metrics::counter;

pub fn track_resource_created(entity: &str) {
    counter!("resources_created_total", "entity" => entity.to_string()).increment(1);
}

pub fn track_resource_trashed(entity: &str, count: u64) {
    counter!("resources_trashed_total", "entity" => entity.to_string()).increment(count);
}

pub fn track_resource_restored(entity: &str, count: u64) {
    counter!("resources_restored_total", "entity" => entity.to_string()).increment(count);
}

pub fn track_resource_purged(entity: &str, count: u64) {
    counter!("resources_purged_total", "entity" => entity.to_string()).increment(count);
}

pub fn track_duplicate_rejected(entity: &str) {
    counter!("media_duplicates_rejected_total", "entity" => entity.to_string()).increment(1);
}

pub fn track_slug_retry(entity: &str) {
    counter!("slug_collision_retries_total", "entity" => entity.to_string()).increment(1);
}

pub fn track_bulk_operation(entity: &str, operation: &'static str, affected: u64) {
    counter!(
        "bulk_operations_total",
        "entity" => entity.to_string(),
        "operation" => operation
    )
    .increment(1);
    counter!(
        "bulk_affected_rows_total",
        "entity" => entity.to_string(),
        "operation" => operation
    )
    .increment(affected);
}
