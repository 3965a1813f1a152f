// ============================================================================
// Test Support
// ============================================================================
//
// Shared helpers for the in-crate test suites.
//
// ============================================================================

use tracing_subscriber::{fmt, EnvFilter};

/// Install a tracing subscriber for the test binary. Safe to call from
/// every test; only the first call wins. RUST_LOG overrides the default
/// filter when chasing a flaky interleaving:
/// `RUST_LOG=servitor=trace cargo test -- --nocapture`.
pub fn init_tracing() {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
