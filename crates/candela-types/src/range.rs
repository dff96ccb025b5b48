//! Half-open time ranges and hour iteration.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use crate::TimeRangeError;

/// A half-open time interval `[start, end)`.
///
/// Gap fetches are expressed as time ranges: the start is the last committed
/// candle boundary (or the backfill start) and the end is "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    /// Start instant (inclusive).
    pub start: DateTime<Utc>,
    /// End instant (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a new time range, validating that start <= end.
    ///
    /// # Errors
    ///
    /// Returns an error if start > end.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeRangeError> {
        if start > end {
            return Err(TimeRangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Returns true if the range contains no instant.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Returns true if the range contains the given instant.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Returns the length of the range.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Returns an iterator over the start of every UTC hour overlapping the range.
    pub fn hours(&self) -> HourIterator {
        HourIterator::new(self.start, self.end)
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.end.format("%Y-%m-%dT%H:%M:%S%.3fZ")
        )
    }
}

/// Iterator over the hour starts overlapping a time range.
#[derive(Debug, Clone)]
pub struct HourIterator {
    current: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl HourIterator {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        // Truncation cannot fail for an hour below chrono's supported range.
        let current = start
            .duration_trunc(TimeDelta::hours(1))
            .unwrap_or(start);
        Self { current, end }
    }
}

impl Iterator for HourIterator {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.end {
            return None;
        }

        let result = self.current;
        self.current += TimeDelta::hours(1);
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.current >= self.end {
            return (0, Some(0));
        }
        let span = self.end - self.current;
        let mut hours = span.num_hours() as usize;
        if span > TimeDelta::hours(hours as i64) {
            hours += 1;
        }
        (hours, Some(hours))
    }
}

impl ExactSizeIterator for HourIterator {}
