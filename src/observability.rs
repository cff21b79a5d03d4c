//! Tracing initialisation for the command line tool.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init_tracing_with_level(level: &str) {
    // RUST_LOG wins over the configured level.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
