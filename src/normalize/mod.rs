/// Datapoint sorting and field defaulting
pub mod series;

/// Threshold-based alert classification
pub mod alert;

/// Display helpers for log messages and byte counts
pub mod text;

/// Query time windows
pub mod window;

pub use alert::{classify_alert, DEFAULT_CPU_THRESHOLD};
pub use series::{sort_and_format, UNIT_BYTES, UNIT_PERCENT};
pub use text::{format_bytes, sanitize_log_message, DEFAULT_MAX_MESSAGE_LENGTH};
pub use window::{TimeWindow, MAX_WINDOW_HOURS, METRIC_PERIOD_SECONDS};
