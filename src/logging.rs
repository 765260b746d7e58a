//! Logging setup built on `tracing` and `tracing-subscriber`.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialises the global subscriber.
///
/// The level is taken from `RUST_LOG` and defaults to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Test-friendly initialisation: debug level, test writer, and safe to call
/// from several tests.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
