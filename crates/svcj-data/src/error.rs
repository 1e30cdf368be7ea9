//! Error types for data operations.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while building panels, series and windows.
#[derive(Debug, Error)]
pub enum DataError {
    /// Window or step parameters are unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Series is shorter than the requested window
    #[error("Insufficient data for {asset}: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Asset identifier
        asset: String,
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// A return value is infinite or NaN where a value is required
    #[error("Non-finite return for {asset} on {date}: {value}")]
    NonFiniteReturn {
        /// Asset identifier
        asset: String,
        /// Date of the offending observation
        date: NaiveDate,
        /// Offending value
        value: f64,
    },

    /// A price is zero or negative and cannot be turned into a log-return
    #[error("Invalid price for {asset} on {date}: {value}")]
    InvalidPrice {
        /// Asset identifier
        asset: String,
        /// Date of the offending observation
        date: NaiveDate,
        /// Offending value
        value: f64,
    },

    /// Dates are not strictly increasing
    #[error("Dates must be strictly increasing: {previous} is followed by {current}")]
    NonIncreasingDates {
        /// Earlier position in the sequence
        previous: NaiveDate,
        /// Later position in the sequence
        current: NaiveDate,
    },

    /// The same asset identifier appears twice
    #[error("Duplicate asset: {0}")]
    DuplicateAsset(String),

    /// A column does not match the length of the date index
    #[error("Shape mismatch for {asset}: expected {expected} rows, got {actual}")]
    ShapeMismatch {
        /// Asset identifier
        asset: String,
        /// Expected number of rows
        expected: usize,
        /// Actual number of rows
        actual: usize,
    },

    /// Asset not present in the panel
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
