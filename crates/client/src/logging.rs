//! Logging macros for the feed client.
//!
//! All feed-layer log lines are emitted through `tracing` under a single
//! target so a host can tune connection chatter independently of its own
//! output (`RUST_LOG=notifykit::feed=warn`).

use tracing_subscriber::EnvFilter;

/// Target used by every `log_*!` macro in this crate
pub const TARGET: &str = "notifykit::feed";

/// Filter applied when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "notifykit=debug,notifykit_client=debug";

/// Install a formatted `tracing` subscriber honouring `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .try_init();
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        ::tracing::info!(target: $crate::logging::TARGET, $($arg)*)
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        ::tracing::error!(target: $crate::logging::TARGET, $($arg)*)
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        ::tracing::warn!(target: $crate::logging::TARGET, $($arg)*)
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        ::tracing::debug!(target: $crate::logging::TARGET, $($arg)*)
    };
}
