//! Tracing setup for tests.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_TEST_FILTER: &str = "invrefresh_core=debug,warn";

/// Installs a test-friendly tracing subscriber.
///
/// Honours `RUST_LOG` and falls back to [`DEFAULT_TEST_FILTER`]. Output goes
/// through the test writer, so it is captured per test. Calling this more
/// than once is harmless.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
