//! Error types for candela core values.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A timeframe that cannot be used for candle alignment.
///
/// Raised both when parsing a timeframe string and when an unsupported
/// unit/multiple combination reaches the calendar aligner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid timeframe '{timeframe}': {reason}")]
pub struct InvalidTimeframe {
    /// The offending timeframe as written by the caller.
    pub timeframe: String,
    /// Why it was rejected.
    pub reason: String,
}

impl InvalidTimeframe {
    /// Creates a new invalid timeframe error.
    #[must_use]
    pub fn new(timeframe: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            timeframe: timeframe.into(),
            reason: reason.into(),
        }
    }
}

/// Error for invalid time ranges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeRangeError {
    /// Start is after end.
    #[error("Invalid time range: {start} > {end}")]
    Inverted {
        /// The start instant.
        start: DateTime<Utc>,
        /// The end instant.
        end: DateTime<Utc>,
    },
}

/// Error for symbols that cannot be used as file names.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    /// The symbol is empty.
    #[error("Symbol must not be empty")]
    Empty,

    /// The symbol contains a character outside `[A-Z0-9._-]`.
    #[error("Symbol '{symbol}' contains invalid character '{ch}'")]
    InvalidChar {
        /// The rejected symbol.
        symbol: String,
        /// The first invalid character.
        ch: char,
    },
}
