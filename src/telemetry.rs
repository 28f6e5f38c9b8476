//! Tracing setup for embedding applications and tests.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber, honoring `RUST_LOG` and defaulting to
/// `info` for the engine crates. Safe to call more than once; later
/// calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,steppilot=debug"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
