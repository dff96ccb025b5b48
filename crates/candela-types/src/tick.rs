//! Tick data representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single tick: one price observation with its traded (or quoted) volume.
///
/// Ticks are ephemeral. They flow from a tick source into the aggregator and
/// are never persisted individually.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Timestamp of the tick (exchange time, expressed in UTC).
    pub timestamp: DateTime<Utc>,
    /// Price of the tick.
    pub price: f64,
    /// Volume attached to the tick.
    pub volume: f64,
}

impl Tick {
    /// Creates a new tick.
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, price: f64, volume: f64) -> Self {
        Self {
            timestamp,
            price,
            volume,
        }
    }

    /// Creates a tick from a two-sided quote, using the mid price and the
    /// combined volume of both sides.
    #[must_use]
    pub fn from_quote(
        timestamp: DateTime<Utc>,
        ask: f64,
        bid: f64,
        ask_volume: f64,
        bid_volume: f64,
    ) -> Self {
        Self {
            timestamp,
            price: (ask + bid) / 2.0,
            volume: ask_volume + bid_volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_tick_from_quote_mid_price() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let tick = Tick::from_quote(ts, 1.1001, 1.1000, 100.0, 200.0);
        assert!((tick.price - 1.10005).abs() < 1e-10);
        assert!((tick.volume - 300.0).abs() < 1e-10);
    }

    #[test]
    fn test_tick_serde() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let tick = Tick::new(ts, 100.0, 1.0);
        let json = serde_json::to_string(&tick).unwrap();
        let back: Tick = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tick);
    }
}
