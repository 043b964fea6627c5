//! Parse and bounds errors of the core types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Raised when textual input (an `A1` reference, a zone, a color) cannot be read
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Not a cell reference: {0}")]
    InvalidAddress(String),

    #[error("Not a zone: {0}")]
    InvalidRange(String),

    /// Row past the last addressable one
    #[error("Row {0} is beyond the last row ({1})")]
    RowOutOfBounds(u32, u32),

    /// Column past the last addressable one
    #[error("Column {0} is beyond the last column ({1})")]
    ColumnOutOfBounds(u32, u32),

    /// Not 3, 6 or 8 hex digits
    #[error("Not a color: {0}")]
    InvalidColor(String),
}
