//! Tracing subscriber setup for binaries.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global formatted subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `default_filter`.
/// Calling this twice is a no-op.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let layer = fmt::layer().with_target(true).with_timer(fmt::time::uptime());
    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}
