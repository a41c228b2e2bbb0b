//! Logging initialization and configuration.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when neither `RUST_LOG` nor a configured level is present.
pub const DEFAULT_FILTER: &str = "shell_bridge=info";

/// Build the filter from `RUST_LOG`, then the configured level, then the default.
///
/// A bare level such as `debug` is scoped to this crate so that hyper and
/// tower stay quiet.
fn build_filter(level: Option<&str>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    match level {
        Some(level) if !level.contains('=') && !level.contains(',') => {
            EnvFilter::try_new(format!("shell_bridge={level}"))
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        }
        Some(directives) => {
            EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        }
        None => EnvFilter::new(DEFAULT_FILTER),
    }
}

/// Initialize the logging system.
///
/// # Panics
///
/// Panics if called more than once, or if another tracing subscriber
/// has already been set.
pub fn init(level: Option<&str>) {
    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(tracing_subscriber::fmt::layer().compact())
        .init();
}

/// Try to initialize the logging system.
///
/// Returns `Err` if logging has already been initialized.
pub fn try_init(level: Option<&str>) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(tracing_subscriber::fmt::layer().compact())
        .try_init()
}
