//! Nestor Tools
//!
//! Reference workloads and the `nestor` command-line runner.

pub mod workloads;

use tracing_subscriber::{EnvFilter, fmt};

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
/// Default is `debug` for nestor crates and `info` for others.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nestor_runtime=debug,nestor_tools=debug"));

    fmt().with_env_filter(filter).with_target(false).init();
}
