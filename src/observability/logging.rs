//! # Logging
//!
//! Tracing subscriber setup. `RUST_LOG` controls the filter, `LOG_FORMAT` the output format.

use tracing::warn;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "function_controller=info";

/// Install the global subscriber
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let result = if json {
        tracing_subscriber::fmt()
            .json()
            .with_current_span(true)
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if let Err(e) = result {
        // A subscriber installed by tests or an embedding binary takes precedence
        warn!("Tracing subscriber init returned error (may already be initialized): {}", e);
    }
}
