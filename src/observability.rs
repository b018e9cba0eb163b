use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment configuration
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        }
    }
}

/// Initialize structured logging and tracing. `RUST_LOG` wins over
/// `LOG_LEVEL` when both are set.
pub fn init_logging(config: &ObservabilityConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init();
    }

    info!(
        service = "readlater",
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.log_level,
        log_format = %config.log_format,
        "Logging initialized"
    );
}

/// Structured log line for anything that changes a bookmark upstream
#[macro_export]
macro_rules! log_bookmark_action {
    ($action:expr, $url:expr) => {
        tracing::info!(action = $action, url = %$url, "Bookmark action performed");
    };
}
