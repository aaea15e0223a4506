//! Tracing setup for host binaries embedding the bridge

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize a fmt subscriber with env-filter support, defaulting to INFO.
/// Call once at process start.
pub fn init() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}
