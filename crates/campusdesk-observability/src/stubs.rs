//! No-op counters when the `observability` feature is disabled.

pub fn track_resource_created(_entity: &str) {}

pub fn track_resource_trashed(_entity: &str, _count: u64) {}

pub fn track_resource_restored(_entity: &str, _count: u64) {}

pub fn track_resource_purged(_entity: &str, _count: u64) {}

pub fn track_duplicate_rejected(_entity: &str) {}

pub fn track_slug_retry(_entity: &str) {}

pub fn track_bulk_operation(_entity: &str, _operation: &'static str, _affected: u64) {}
