/*!
 * Tracing Setup
 * Structured logging for the condition variable and its collaborators
 *
 * Environment variables:
 * - RUST_LOG: Set log level (default: info)
 * - IPC_SYNC_TRACE_JSON: Enable JSON output (default: false)
 */

use tracing::info;
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Environment variable switching the output to JSON
pub const TRACE_JSON_ENV: &str = "IPC_SYNC_TRACE_JSON";

fn json_requested() -> bool {
    std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false)
}

/// Install the global subscriber
///
/// Returns an error if a global subscriber is already set.
pub fn try_init_tracing() -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json_requested() {
        // JSON output for production/parsing
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()?;
        info!("Structured tracing initialized with JSON output");
    } else {
        // Human-readable output for development
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
        info!("Structured tracing initialized");
    }
    Ok(())
}

/// Install the global subscriber, ignoring an already installed one
pub fn init_tracing() {
    if try_init_tracing().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
