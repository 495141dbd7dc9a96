//! Process-wide logging setup for drover binaries and tests.

/// Initialize tracing/logging.
///
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration (filters, output format).
pub mod tracing;
