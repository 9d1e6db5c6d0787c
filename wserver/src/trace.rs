//! Logging for the control server.
//!
//! Backed by `tracing` when the `tracing` feature is on (the default). With
//! the feature off every log macro expands to nothing.

/// Filter used when `RUST_LOG` is unset or invalid.
#[cfg(feature = "tracing")]
const DEFAULT_FILTER: &str = "wserver=info";

/// Installs a stderr subscriber filtered by `RUST_LOG` (default
/// `wserver=info`). Lines carry the uptime, target and thread name, which
/// identifies the acceptor, the interrupt watcher and each connection worker.
///
/// Returns `false` if a global subscriber was already set, so embedders that
/// bring their own subscriber and tests may call it freely.
#[cfg(feature = "tracing")]
pub fn init_tracing() -> bool {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(fmt::time::uptime())
        .with_thread_names(true);

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() -> bool {
    false
}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! discard {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use {
    discard as debug, discard as error, discard as info, discard as trace, discard as warn,
};
