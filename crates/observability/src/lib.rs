//! Process-wide logging setup for batch callers.

/// Subscriber construction (filters, output format).
pub mod subscriber;

pub use subscriber::{LogFormat, LogSettings};

/// Initialize logging from the environment.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    subscriber::init(&LogSettings::from_env());
}

/// Initialize logging for tests: compact output captured by the test harness.
pub fn init_for_tests() {
    subscriber::init(&LogSettings {
        format: LogFormat::Compact,
        test_writer: true,
        ..LogSettings::default()
    });
}
