use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize console logging.
///
/// - **Log Level**: `LOG_LEVEL` environment variable (default: "info"), or a
///   full `RUST_LOG` directive when set
/// - **Filtering**: Noisy dependencies held at warn
/// - **Format**: Compact, with targets and source locations
///
/// Returns `false` when a global subscriber was already installed (tests and
/// embedding applications often set their own), which is not an error.
pub fn init_logging() -> bool {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "campusdesk={level},campusdesk_core={level},campusdesk_db={level},sqlx=warn",
            level = log_level
        ))
    });

    let console_layer = fmt::layer()
        .compact()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_ok()
}
