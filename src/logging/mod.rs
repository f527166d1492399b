// Logging module for structured logging using the tracing crate

use std::error::Error;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber for structured logging.
///
/// Filtering defaults to `info` and honors `RUST_LOG` when set. Pass
/// `debug = true` (the `--debug` CLI flag) to force the `debug` level
/// regardless of the environment.
///
/// # Errors
///
/// Returns an error if a subscriber has already been installed.
pub fn init_subscriber(debug: bool) -> Result<(), Box<dyn Error>> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| e.into())
}
