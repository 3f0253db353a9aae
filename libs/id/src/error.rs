//! Error types for record number parsing and validation.

use thiserror::Error;

/// Errors that can occur when strictly parsing a record number.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NumberError {
    /// The number string is empty.
    #[error("record number cannot be empty")]
    Empty,

    /// The number does not start with a known kind prefix.
    #[error("unknown record number prefix in '{actual}'")]
    UnknownPrefix { actual: String },

    /// The number has the wrong prefix for the expected kind.
    #[error("invalid record number prefix: expected '{expected}', got '{actual}'")]
    InvalidPrefix {
        expected: &'static str,
        actual: String,
    },

    /// The year portion is not a 4-digit number.
    #[error("invalid year in record number: '{actual}'")]
    InvalidYear { actual: String },

    /// The number is missing the dash separator.
    #[error("record number missing '-' separator")]
    MissingSeparator,

    /// The sequence suffix is not a positive integer.
    #[error("invalid sequence in record number: '{actual}'")]
    InvalidSequence { actual: String },
}

impl NumberError {
    /// Returns true if this error indicates a prefix mismatch.
    pub fn is_prefix_error(&self) -> bool {
        matches!(
            self,
            NumberError::UnknownPrefix { .. } | NumberError::InvalidPrefix { .. }
        )
    }
}
