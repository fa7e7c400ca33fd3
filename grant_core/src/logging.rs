//! Logging utilities for grant operations.
//!

// Re-exports for convenience
pub use tracing::metadata::LevelFilter;
pub use tracing::{debug, error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{util::SubscriberInitExt, Layer};

/// Set up basic logging
pub fn setup(level: Option<LevelFilter>) {
    // The user can specify a log level via an env var
    // (such as for testing).
    let env = std::env::var("RUST_LOG").unwrap_or_else(|_| "grant_core=info".into());
    let mut logging_layers = vec![tracing_subscriber::EnvFilter::new(env).boxed()];

    // The input level overrides any env vars.
    let level = level.unwrap_or(LevelFilter::INFO);
    logging_layers.push(tracing_subscriber::fmt::layer().with_filter(level).boxed());

    // try_init so a host that already installed a subscriber keeps it.
    if tracing_subscriber::registry()
        .with(logging_layers)
        .try_init()
        .is_err()
    {
        warn!("a global subscriber was already installed; keeping it");
        return;
    }

    debug!("logging set up");
}
