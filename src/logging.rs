//! Logging initialization.
//!
//! The engine itself only emits `tracing` events. Binaries and tests that
//! want to see them install a subscriber through [`init_logging`].

use tracing_subscriber::EnvFilter;

/// Environment variable overriding the default filter directive.
pub const LOG_ENV: &str = "TICKSTATE_LOG";

/// Install a human-readable `tracing` subscriber writing to stderr.
///
/// If `TICKSTATE_LOG` is set it takes precedence over `default_directive`.
/// Uses `try_init()`, so calling this more than once is harmless.
pub fn init_logging(default_directive: &str) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
