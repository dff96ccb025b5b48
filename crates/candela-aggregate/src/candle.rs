//! OHLC candle data structure.

use candela_types::{Symbol, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A closed OHLC candle.
///
/// `period_start` and `period_end` bound a half-open period produced by the
/// calendar aligner. Candle files are keyed by `period_start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Instrument the candle belongs to.
    pub symbol: Symbol,
    /// Candle timeframe.
    pub timeframe: Timeframe,
    /// First instant of the period.
    pub period_start: DateTime<Utc>,
    /// First instant after the period.
    pub period_end: DateTime<Utc>,
    /// Price of the first tick.
    pub open: f64,
    /// Highest price during the period.
    pub high: f64,
    /// Lowest price during the period.
    pub low: f64,
    /// Price of the last tick.
    pub close: f64,
    /// Summed tick volume.
    pub volume: f64,
    /// Number of ticks in the period.
    pub tick_count: u64,
}

impl Candle {
    /// Returns the price range (high - low).
    #[must_use]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Returns true if the OHLC invariants of a closed candle hold:
    /// `low <= min(open, close)`, `high >= max(open, close)`, at least one
    /// tick and a non-empty period.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
            && self.tick_count >= 1
            && self.period_start < self.period_end
    }
}
