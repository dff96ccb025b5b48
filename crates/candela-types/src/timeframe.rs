//! Candle timeframe definitions.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::InvalidTimeframe;

/// Unit of a candle timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Seconds.
    Second,
    /// Minutes.
    Minute,
    /// Hours.
    Hour,
    /// Trading days.
    Day,
    /// Trading weeks.
    Week,
    /// Calendar months.
    Month,
}

impl TimeUnit {
    /// Returns the short prefix used in timeframe identifiers.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Second => "s",
            Self::Minute => "m",
            Self::Hour => "h",
            Self::Day => "d",
            Self::Week => "w",
            Self::Month => "mn",
        }
    }

    /// Returns the unit length in seconds for fixed-size units.
    #[must_use]
    pub const fn seconds(&self) -> Option<i64> {
        match self {
            Self::Second => Some(1),
            Self::Minute => Some(60),
            Self::Hour => Some(3600),
            Self::Day | Self::Week | Self::Month => None,
        }
    }

    /// Returns true for units aligned by the market calendar.
    #[must_use]
    pub const fn is_calendar(&self) -> bool {
        matches!(self, Self::Day | Self::Week | Self::Month)
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "s" | "sec" => Some(Self::Second),
            "m" | "min" => Some(Self::Minute),
            "h" | "hr" => Some(Self::Hour),
            "d" => Some(Self::Day),
            "w" | "wk" => Some(Self::Week),
            "mn" | "mo" => Some(Self::Month),
            _ => None,
        }
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        };
        f.write_str(name)
    }
}

/// Candle timeframe: a unit and a positive multiple of it.
///
/// Fields are public so that callers can describe any combination; the
/// calendar aligner re-checks [`Timeframe::validate`] before using one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe {
    /// Timeframe unit.
    pub unit: TimeUnit,
    /// Number of units per candle.
    pub count: u32,
}

impl Timeframe {
    /// 1-second candles.
    pub const S1: Self = Self::of(TimeUnit::Second, 1);
    /// 1-minute candles.
    pub const M1: Self = Self::of(TimeUnit::Minute, 1);
    /// 5-minute candles.
    pub const M5: Self = Self::of(TimeUnit::Minute, 5);
    /// 15-minute candles.
    pub const M15: Self = Self::of(TimeUnit::Minute, 15);
    /// 30-minute candles.
    pub const M30: Self = Self::of(TimeUnit::Minute, 30);
    /// 1-hour candles.
    pub const H1: Self = Self::of(TimeUnit::Hour, 1);
    /// 4-hour candles.
    pub const H4: Self = Self::of(TimeUnit::Hour, 4);
    /// Daily candles.
    pub const D1: Self = Self::of(TimeUnit::Day, 1);
    /// Weekly candles.
    pub const W1: Self = Self::of(TimeUnit::Week, 1);
    /// Monthly candles.
    pub const MN1: Self = Self::of(TimeUnit::Month, 1);

    const fn of(unit: TimeUnit, count: u32) -> Self {
        Self { unit, count }
    }

    /// Creates a validated timeframe.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTimeframe`] if the combination is unsupported.
    pub fn new(unit: TimeUnit, count: u32) -> Result<Self, InvalidTimeframe> {
        let timeframe = Self { unit, count };
        timeframe.validate()?;
        Ok(timeframe)
    }

    /// Checks that this timeframe can be aligned.
    ///
    /// Sub-daily timeframes need a positive multiple shorter than a day.
    /// Day, week and month timeframes only support a multiple of one.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTimeframe`] describing the unsupported combination.
    pub fn validate(&self) -> Result<(), InvalidTimeframe> {
        if self.count == 0 {
            return Err(InvalidTimeframe::new(
                self.to_string(),
                "multiple must be at least 1",
            ));
        }
        match self.unit.seconds() {
            Some(unit_secs) => {
                if i64::from(self.count) * unit_secs >= 86_400 {
                    return Err(InvalidTimeframe::new(
                        self.to_string(),
                        "sub-daily timeframes must be shorter than one day, use d1",
                    ));
                }
            }
            None => {
                if self.count != 1 {
                    return Err(InvalidTimeframe::new(
                        self.to_string(),
                        format!("{} timeframes only support a multiple of 1", self.unit),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Returns the fixed bucket length for sub-daily timeframes.
    #[must_use]
    pub fn fixed_duration(&self) -> Option<TimeDelta> {
        self.unit
            .seconds()
            .map(|secs| TimeDelta::seconds(secs * i64::from(self.count)))
    }
}

/// Formats the canonical identifier (e.g. `m5`, `h1`, `d1`, `mn1`).
impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.unit.prefix(), self.count)
    }
}

impl FromStr for Timeframe {
    type Err = InvalidTimeframe;

    /// Accepts `m5` style (unit then multiple), `5m` style (multiple then
    /// unit) and the aliases `daily`, `weekly` and `monthly`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "daily" | "day" => return Ok(Self::D1),
            "weekly" | "week" => return Ok(Self::W1),
            "monthly" | "month" => return Ok(Self::MN1),
            "tick" => {
                return Err(InvalidTimeframe::new(
                    s,
                    "tick is not a candle timeframe",
                ));
            }
            _ => {}
        }

        let digits_at = lower.find(|c: char| c.is_ascii_digit());
        let (unit_token, count_token) = match digits_at {
            Some(0) => {
                let split = lower
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(lower.len());
                (&lower[split..], &lower[..split])
            }
            Some(idx) => (&lower[..idx], &lower[idx..]),
            None => (lower.as_str(), "1"),
        };

        let unit = TimeUnit::from_token(unit_token).ok_or_else(|| {
            InvalidTimeframe::new(
                s,
                "unsupported unit, expected one of: s, m, h, d, w, mn",
            )
        })?;
        let count: u32 = count_token
            .parse()
            .map_err(|_| InvalidTimeframe::new(s, "multiple is not a number"))?;

        Self::new(unit, count).map_err(|e| InvalidTimeframe::new(s, e.reason))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = InvalidTimeframe;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("m1".parse::<Timeframe>().unwrap(), Timeframe::M1);
        assert_eq!("1h".parse::<Timeframe>().unwrap(), Timeframe::H1);
        assert_eq!("H4".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert_eq!("15m".parse::<Timeframe>().unwrap(), Timeframe::M15);
        assert_eq!("daily".parse::<Timeframe>().unwrap(), Timeframe::D1);
        assert_eq!("w1".parse::<Timeframe>().unwrap(), Timeframe::W1);
        assert_eq!("mn1".parse::<Timeframe>().unwrap(), Timeframe::MN1);
        assert_eq!("1mo".parse::<Timeframe>().unwrap(), Timeframe::MN1);
    }

    #[test]
    fn test_timeframe_parse_rejects_unsupported() {
        assert!("invalid".parse::<Timeframe>().is_err());
        assert!("tick".parse::<Timeframe>().is_err());
        assert!("x5".parse::<Timeframe>().is_err());
        assert!("m0".parse::<Timeframe>().is_err());
        assert!("d2".parse::<Timeframe>().is_err());
        assert!("h24".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_timeframe_display_round_trips() {
        for tf in [
            Timeframe::S1,
            Timeframe::M5,
            Timeframe::H4,
            Timeframe::D1,
            Timeframe::W1,
            Timeframe::MN1,
        ] {
            assert_eq!(tf.to_string().parse::<Timeframe>().unwrap(), tf);
        }
    }

    #[test]
    fn test_validate_catches_hand_built_timeframes() {
        let bad = Timeframe {
            unit: TimeUnit::Week,
            count: 2,
        };
        let err = bad.validate().unwrap_err();
        assert_eq!(err.timeframe, "w2");
    }

    #[test]
    fn test_fixed_duration() {
        assert_eq!(Timeframe::M5.fixed_duration(), Some(TimeDelta::minutes(5)));
        assert_eq!(Timeframe::H4.fixed_duration(), Some(TimeDelta::hours(4)));
        assert_eq!(Timeframe::D1.fixed_duration(), None);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Timeframe::H1).unwrap();
        assert_eq!(json, "\"h1\"");
        let back: Timeframe = serde_json::from_str("\"30m\"").unwrap();
        assert_eq!(back, Timeframe::M30);
        assert!(serde_json::from_str::<Timeframe>("\"d7\"").is_err());
    }
}
