//! Test-binary logging setup

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directives, e.g. `scope_once=debug`
pub const LOG_ENV: &str = "SCOPE_ONCE_LOG";

/// Install a fmt subscriber writing through the test harness' capture.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::default().add_directive(tracing::Level::WARN.into()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_ansi(false)
        .try_init();
}
