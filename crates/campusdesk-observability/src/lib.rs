//! Campusdesk Observability
//!
//! - Console logging for `tracing` events ([`logging`])
//! - Lifecycle counters via the `metrics` facade ([`metrics`])
//!
//! Counters are compiled in with the `observability` feature (default). With
//! the feature off the `track_*` functions are no-ops, so callers never need
//! their own `cfg` guards. Nothing is exported unless the embedding
//! application installs a `metrics` recorder.

pub mod logging;

#[cfg(feature = "observability")]
pub mod metrics;

#[cfg(not(feature = "observability"))]
#[path = "stubs.rs"]
pub mod metrics;

pub use logging::init_logging;
