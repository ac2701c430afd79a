//! Shared helpers for integration tests.

use forge_recall::{Harness, HarnessConfig};
use tempfile::TempDir;

/// Install a fmt subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A harness whose cache and testdata roots live in a fresh temp directory.
pub fn temp_harness() -> (TempDir, Harness) {
    init_tracing();
    let dir = TempDir::new().expect("create temp dir");
    let config = HarnessConfig::default()
        .with_cache_root(dir.path().join("cache"))
        .with_testdata_root(dir.path().join("testdata"));
    (dir, Harness::new(config))
}
