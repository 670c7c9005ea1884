//! # Observability
//!
//! Structured logging setup for the CLI and tests, built on the tracing
//! ecosystem. Library code emits `tracing` events; initialization lives here.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `verbose` selects between `debug`
/// and `info`. Safe to call more than once (subsequent calls are no-ops).
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).with_target(false).finish();

    // Ignore the error when a subscriber is already installed (tests).
    let _ = tracing::subscriber::set_global_default(subscriber);
}
