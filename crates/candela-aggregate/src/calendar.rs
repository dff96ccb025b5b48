//! Calendar-aware candle period alignment.
//!
//! Sub-daily timeframes are epoch-relative fixed buckets. Daily, weekly and
//! monthly timeframes follow the market's trading day: a trading day begins
//! at the daily rollover (exchange time) and is labelled with the date on
//! which it begins. A trading week begins on the first trading day whose
//! label falls on `week_start`, a trading month on the first trading day
//! labelled with the 1st of the month.

use candela_types::{TimeUnit, Timeframe};
use chrono::{
    DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeDelta, TimeZone, Timelike, Utc, Weekday,
};
use serde::{Deserialize, Serialize};

use crate::CalendarError;

/// A half-open candle period `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    /// First instant of the period.
    pub start: DateTime<Utc>,
    /// First instant after the period.
    pub end: DateTime<Utc>,
}

impl Period {
    /// Returns true if the instant falls inside the period.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// Market calendar policy used to align daily and longer candles.
///
/// Exchange time is modelled as a fixed offset from UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketCalendar {
    /// Offset of exchange time from UTC, in minutes.
    pub utc_offset_minutes: i32,
    /// Exchange-time instant at which a new trading day begins.
    pub daily_rollover: NaiveTime,
    /// Weekday on which a trading week begins.
    pub week_start: Weekday,
}

impl Default for MarketCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl MarketCalendar {
    /// UTC calendar: days roll at 00:00 UTC and weeks begin Monday 00:00 UTC,
    /// the convention of the Dukascopy weekly charts.
    #[must_use]
    pub const fn utc() -> Self {
        Self {
            utc_offset_minutes: 0,
            daily_rollover: NaiveTime::MIN,
            week_start: Weekday::Mon,
        }
    }

    /// New York forex calendar: days roll at 17:00 New York (UTC-5, no DST)
    /// and the trading week opens Sunday 17:00.
    #[must_use]
    pub fn forex_new_york() -> Self {
        Self {
            utc_offset_minutes: -5 * 60,
            daily_rollover: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            week_start: Weekday::Sun,
        }
    }

    /// Maps an instant and timeframe to the period containing it.
    ///
    /// The result always satisfies `start <= timestamp < end`.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::InvalidTimeframe`] for an unsupported
    /// timeframe, or [`CalendarError::OutOfRange`] when a boundary cannot be
    /// represented.
    pub fn align(
        &self,
        timestamp: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Period, CalendarError> {
        timeframe.validate()?;

        match timeframe.fixed_duration() {
            Some(size) => align_fixed(timestamp, timeframe, size),
            None => self.align_trading(timestamp, timeframe),
        }
    }

    /// Shift from UTC onto the trading-day clock, where every trading day
    /// starts at midnight.
    fn trading_shift(&self) -> TimeDelta {
        let rollover = TimeDelta::seconds(i64::from(self.daily_rollover.num_seconds_from_midnight()));
        TimeDelta::minutes(i64::from(self.utc_offset_minutes)) - rollover
    }

    fn align_trading(
        &self,
        timestamp: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Period, CalendarError> {
        let out_of_range = || CalendarError::OutOfRange {
            timestamp,
            timeframe,
        };
        let shift = self.trading_shift();
        let trading_day = timestamp
            .checked_add_signed(shift)
            .ok_or_else(out_of_range)?
            .date_naive();

        let (first, next) = match timeframe.unit {
            TimeUnit::Week => {
                let back = (7 + trading_day.weekday().num_days_from_monday()
                    - self.week_start.num_days_from_monday())
                    % 7;
                let first = trading_day
                    .checked_sub_days(Days::new(u64::from(back)))
                    .ok_or_else(out_of_range)?;
                let next = first.checked_add_days(Days::new(7)).ok_or_else(out_of_range)?;
                (first, next)
            }
            TimeUnit::Month => {
                let first = trading_day.with_day(1).ok_or_else(out_of_range)?;
                let next = if first.month() == 12 {
                    NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
                }
                .ok_or_else(out_of_range)?;
                (first, next)
            }
            _ => {
                let next = trading_day
                    .checked_add_days(Days::new(1))
                    .ok_or_else(out_of_range)?;
                (trading_day, next)
            }
        };

        let to_utc = |day: NaiveDate| {
            Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
                .checked_sub_signed(shift)
                .ok_or_else(out_of_range)
        };

        Ok(Period {
            start: to_utc(first)?,
            end: to_utc(next)?,
        })
    }
}

/// Aligns a sub-daily timeframe to epoch-relative buckets.
fn align_fixed(
    timestamp: DateTime<Utc>,
    timeframe: Timeframe,
    size: TimeDelta,
) -> Result<Period, CalendarError> {
    let out_of_range = || CalendarError::OutOfRange {
        timestamp,
        timeframe,
    };
    let size_ms = size.num_milliseconds();
    let start_ms = timestamp.timestamp_millis().div_euclid(size_ms) * size_ms;
    let start = DateTime::from_timestamp_millis(start_ms).ok_or_else(out_of_range)?;
    let end = start.checked_add_signed(size).ok_or_else(out_of_range)?;
    Ok(Period { start, end })
}

/// Aligns an instant using the default [`MarketCalendar::utc`] policy.
///
/// # Errors
///
/// See [`MarketCalendar::align`].
pub fn align(timestamp: DateTime<Utc>, timeframe: Timeframe) -> Result<Period, CalendarError> {
    MarketCalendar::utc().align(timestamp, timeframe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candela_types::InvalidTimeframe;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_align_contains_timestamp_for_all_timeframes() {
        let calendars = [MarketCalendar::utc(), MarketCalendar::forex_new_york()];
        let timeframes = [
            Timeframe::S1,
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
            Timeframe::W1,
            Timeframe::MN1,
        ];
        let mut instant = utc(2023, 12, 29, 0, 0, 0);
        let stop = utc(2024, 3, 5, 0, 0, 0);
        // 7h 13m 17.5s stride so instants land on odd offsets and on boundaries alike.
        let stride = TimeDelta::milliseconds(26_000_500);
        while instant < stop {
            for calendar in &calendars {
                for tf in timeframes {
                    let period = calendar.align(instant, tf).unwrap();
                    assert!(period.start <= instant, "{tf} {instant}");
                    assert!(instant < period.end, "{tf} {instant}");
                }
            }
            instant += stride;
        }
    }

    #[test]
    fn test_hourly_alignment() {
        let period = align(utc(2025, 1, 6, 9, 59, 59), Timeframe::H1).unwrap();
        assert_eq!(period.start, utc(2025, 1, 6, 9, 0, 0));
        assert_eq!(period.end, utc(2025, 1, 6, 10, 0, 0));
    }

    #[test]
    fn test_sub_daily_buckets_are_epoch_relative() {
        let period = align(utc(2024, 1, 15, 14, 37, 45), Timeframe::M15).unwrap();
        assert_eq!(period.start, utc(2024, 1, 15, 14, 30, 0));

        let period = align(utc(2024, 1, 15, 14, 37, 45), Timeframe::H4).unwrap();
        assert_eq!(period.start, utc(2024, 1, 15, 12, 0, 0));
        assert_eq!(period.end, utc(2024, 1, 15, 16, 0, 0));
    }

    #[test]
    fn test_sub_millisecond_timestamp_stays_inside() {
        let instant = utc(2024, 1, 15, 14, 0, 0) + TimeDelta::nanoseconds(999_999);
        let period = align(instant, Timeframe::S1).unwrap();
        assert_eq!(period.start, utc(2024, 1, 15, 14, 0, 0));
        assert!(period.contains(instant));
    }

    #[test]
    fn test_daily_rollover() {
        let calendar = MarketCalendar::forex_new_york();
        // 21:59 UTC = 16:59 New York, still Monday's session (opened Sunday 17:00).
        let period = calendar.align(utc(2024, 1, 8, 21, 59, 0), Timeframe::D1).unwrap();
        assert_eq!(period.start, utc(2024, 1, 7, 22, 0, 0));
        assert_eq!(period.end, utc(2024, 1, 8, 22, 0, 0));

        // 22:00 UTC = 17:00 New York opens the next session.
        let period = calendar.align(utc(2024, 1, 8, 22, 0, 0), Timeframe::D1).unwrap();
        assert_eq!(period.start, utc(2024, 1, 8, 22, 0, 0));
    }

    #[test]
    fn test_weekly_boundary_belongs_to_new_week() {
        // 2025-01-06 is a Monday.
        let boundary = utc(2025, 1, 6, 0, 0, 0);
        let period = align(boundary, Timeframe::W1).unwrap();
        assert_eq!(period.start, boundary);
        assert_eq!(period.end, utc(2025, 1, 13, 0, 0, 0));

        let before = align(boundary - TimeDelta::milliseconds(1), Timeframe::W1).unwrap();
        assert_eq!(before.end, boundary);
        assert_eq!(before.start, utc(2024, 12, 30, 0, 0, 0));
    }

    #[test]
    fn test_weekly_is_not_iso_when_week_starts_sunday() {
        let calendar = MarketCalendar::forex_new_york();
        // Sunday 2024-01-07 17:00 New York = 22:00 UTC opens the week.
        let open = utc(2024, 1, 7, 22, 0, 0);
        let period = calendar.align(open, Timeframe::W1).unwrap();
        assert_eq!(period.start, open);
        assert_eq!(period.end, utc(2024, 1, 14, 22, 0, 0));

        let friday_close = calendar.align(utc(2024, 1, 5, 21, 59, 0), Timeframe::W1).unwrap();
        assert_eq!(friday_close.end, open);
    }

    #[test]
    fn test_monthly_alignment_wraps_year() {
        let period = align(utc(2024, 12, 31, 23, 59, 59), Timeframe::MN1).unwrap();
        assert_eq!(period.start, utc(2024, 12, 1, 0, 0, 0));
        assert_eq!(period.end, utc(2025, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_invalid_timeframe_is_rejected() {
        let bad = Timeframe {
            unit: TimeUnit::Day,
            count: 3,
        };
        let err = align(utc(2024, 1, 1, 0, 0, 0), bad).unwrap_err();
        assert!(matches!(
            err,
            CalendarError::InvalidTimeframe(InvalidTimeframe { .. })
        ));
    }

    #[test]
    fn test_calendar_serde_defaults() {
        let calendar: MarketCalendar = serde_json::from_str("{}").unwrap();
        assert_eq!(calendar, MarketCalendar::utc());

        let calendar: MarketCalendar = serde_json::from_str(
            r#"{"utc_offset_minutes": -300, "daily_rollover": "17:00:00", "week_start": "Sun"}"#,
        )
        .unwrap();
        assert_eq!(calendar, MarketCalendar::forex_new_york());
    }
}
