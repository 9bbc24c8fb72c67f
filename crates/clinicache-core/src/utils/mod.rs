//! Utility functions for formatting and on-disk persistence.

pub mod format;
pub mod fs;

// Re-export commonly used functions at module level
pub use format::{contains_ignore_case, format_appointment_date, format_phone, truncate_string};
pub use fs::write_atomic;
