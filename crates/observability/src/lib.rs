//! Tracing/logging setup shared by permgate consumers.

/// Initialize process-wide logging.
///
/// Safe to call multiple times; subsequent calls become no-ops, which also
/// makes it usable from test setups.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, format).
pub mod tracing;
