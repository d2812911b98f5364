//! Process-wide tracing setup shared by the tally binaries.

/// Initialize process-wide logging with JSON output.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    init_with(LogFormat::Json);
}

/// Like [`init`], with an explicit output format.
pub fn init_with(format: LogFormat) {
    tracing::init(format);
}

/// Tracing subscriber configuration (filters, output format).
pub mod tracing;

pub use tracing::LogFormat;
