//! Tracing setup for tests.

use tracing_subscriber::EnvFilter;

/// Initializes a tracing subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; repeated initialization is ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
