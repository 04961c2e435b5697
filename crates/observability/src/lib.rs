//! Tracing/logging setup shared by binaries and tests.

/// Subscriber construction (filters, formatting).
pub mod subscriber;

/// Initialize process-wide tracing with JSON output.
///
/// Filter comes from `RUST_LOG`, defaulting to `info`. Safe to call multiple
/// times; subsequent calls are no-ops.
pub fn init() {
    subscriber::init("info");
}

/// Install a human-readable subscriber that writes through the test
/// harness's captured output. Idempotent across tests in one binary.
pub fn init_for_tests() {
    subscriber::init_for_tests("debug");
}
