//! Shared error types.
//!
//! Errors raised by the value types in [`crate::types`]. Transport and REST
//! failures have their own error enums in [`crate::ws`] and [`crate::rest`].

/// Errors produced while building or parsing attendance values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttendanceError {
    /// Timestamp could not be parsed.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Timestamp is outside the representable range.
    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AttendanceError::InvalidTimestamp("yesterday".to_string());
        assert_eq!(err.to_string(), "invalid timestamp: yesterday");
    }

    #[test]
    fn test_error_out_of_range() {
        let err = AttendanceError::TimestampOutOfRange(i64::MAX);
        assert_eq!(
            err.to_string(),
            format!("timestamp out of range: {}", i64::MAX)
        );
    }
}
