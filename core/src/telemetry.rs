// Logging setup
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used
/// (e.g. `"info,flowgraph_core=debug"`). Calling this more than once is a
/// no-op, so tests and binaries can both call it.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
    if result.is_ok() {
        tracing::debug!(target: "telemetry", "Tracing subscriber installed");
    }
}
