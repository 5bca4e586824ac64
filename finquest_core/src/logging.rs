//! tracing subscriber setup for the CLI and the Python module

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered at `level`; `RUST_LOG` wins when set.
///
/// Safe to call more than once, later calls are no-ops.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
