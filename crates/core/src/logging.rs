//! Structured logging infrastructure for Lifeline.
//!
//! This module provides centralized logging initialization with support
//! for structured JSON output and environment-based configuration.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system with structured output.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If not set, defaults to `info` level.
///
/// # Example
/// ```no_run
/// use lifeline_core::logging;
///
/// logging::init();
/// tracing::info!("Engine started");
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

/// Initialize the logging system with JSON output for production environments.
///
/// This format is suitable for log aggregation systems and structured log analysis.
/// Log level can be configured via the `RUST_LOG` environment variable.
///
/// # Example
/// ```no_run
/// use lifeline_core::logging;
///
/// logging::init_json();
/// tracing::info!(service = "dispatch", "Service started");
/// ```
pub fn init_json() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_target(true).with_thread_ids(true))
        .init();
}

/// Initialize with an explicit filter directive, ignoring the environment.
///
/// Repeated calls are no-ops, which makes this safe from tests that run in
/// one process.
pub fn init_with_filter(directives: &str) {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new(directives))
        .with(fmt::layer().with_target(true))
        .try_init();
}
