//! Tracing/logging initialization.
//!
//! Events are written as JSON lines. `RUST_LOG` takes precedence over the default
//! directive, e.g. `RUST_LOG=stockroom_audit=debug` to follow alert maintenance.

use tracing_subscriber::EnvFilter;

/// Install the JSON subscriber, filtering with `RUST_LOG` or `default_directive`.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_with_default(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .try_init();
}
