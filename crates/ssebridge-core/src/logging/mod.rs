//! Diagnostic logging.
//!
//! All diagnostics go to stderr through `tracing`; stdout carries protocol
//! messages only and must never receive log output.
//!
//! - [`init_subscriber`] installs the global stderr subscriber
//! - [`test_utils::capture_logs`] captures events in memory for assertions

pub mod test_utils;

pub use test_utils::{CapturedLogs, capture_logs};

/// Default filter when neither `RUST_LOG` nor settings provide one.
pub const DEFAULT_LEVEL: &str = "info";

/// Initialize the global tracing subscriber with stderr output only.
///
/// `RUST_LOG` takes precedence over `level`. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}
