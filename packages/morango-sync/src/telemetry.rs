//! Structured logging setup.
//!
//! The rest of the crate instruments itself with `tracing` spans/events;
//! this module just wires a subscriber so those events land somewhere.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs a global `tracing` subscriber that reads `RUST_LOG`, defaulting
/// to `info` for this crate and `warn` for everything else.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,morango_sync=debug,morango_core=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
