//! Aggregation and alignment errors.

use candela_types::{InvalidTimeframe, Symbol, Timeframe};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by the calendar aligner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// The timeframe cannot be aligned.
    #[error(transparent)]
    InvalidTimeframe(#[from] InvalidTimeframe),

    /// The period boundary falls outside the representable calendar range.
    #[error("Period for {timestamp} ({timeframe}) is outside the supported calendar range")]
    OutOfRange {
        /// The instant being aligned.
        timestamp: DateTime<Utc>,
        /// The requested timeframe.
        timeframe: Timeframe,
    },
}

/// Errors raised while aggregating ticks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// A tick arrived with a timestamp before the previous tick.
    #[error("Out-of-order tick for {symbol}: {received} arrived after {previous}")]
    OutOfOrderTick {
        /// The symbol being aggregated.
        symbol: Symbol,
        /// Timestamp of the last accepted tick.
        previous: DateTime<Utc>,
        /// Timestamp of the rejected tick.
        received: DateTime<Utc>,
    },

    /// Alignment failed.
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}
