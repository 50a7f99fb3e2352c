//! Shared test utilities for scope-once
//!
//! - SQLite-backed user/group fixture store
//! - Call counters shared between setup closures and assertions
//! - One-time logging setup (`SCOPE_ONCE_LOG=scope_once=debug` to see it)


use once_cell::sync::Lazy;

static LOGGING: Lazy<()> = Lazy::new(scope_once::logging::init_test_logging);

/// Install the test subscriber once per test binary
pub fn init_logging() {
    Lazy::force(&LOGGING);
}
