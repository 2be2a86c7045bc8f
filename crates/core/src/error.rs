use thiserror::Error;

/// Request-level validation failures, raised before any store access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown bucket: {0}")]
    UnknownBucket(String),

    #[error("unknown sort order: {0} (expected asc or desc)")]
    UnknownSortOrder(String),

    #[error("unknown sort field: {0} (expected created or updated)")]
    UnknownSortField(String),

    #[error("list limit must be between 1 and {max}, got {provided}")]
    InvalidLimit { provided: u32, max: u32 },

    #[error("invalid date (expected YYYY-MM-DD): {0}")]
    InvalidDate(String),

    #[error("date range start {start} is after end {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("date range of {days} days exceeds the maximum of {max}")]
    RangeTooLong { days: u32, max: u32 },
}
