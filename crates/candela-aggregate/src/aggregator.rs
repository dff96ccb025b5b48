//! Streaming tick-to-candle aggregation.

use candela_types::{Symbol, Tick, Timeframe};
use chrono::{DateTime, Utc};

use crate::{AggregateError, Candle, MarketCalendar, Period};

/// Why the caller is asking to close the in-progress candle.
///
/// Running out of ticks is not a reason on its own: the current period may
/// still receive ticks the provider has not published yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// The given instant is known to be complete; the candle closes only if
    /// its period ended at or before it.
    PeriodElapsed(DateTime<Utc>),
    /// The market is closed, no further tick can arrive for the period.
    MarketClosed,
}

/// In-progress candle state.
///
/// Lives only in memory. After a crash it is rebuilt by re-fetching ticks
/// from the last checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialCandle {
    period: Period,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    tick_count: u64,
    last_tick: DateTime<Utc>,
}

impl PartialCandle {
    fn new(period: Period, tick: &Tick) -> Self {
        Self {
            period,
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            volume: tick.volume,
            tick_count: 1,
            last_tick: tick.timestamp,
        }
    }

    fn update(&mut self, tick: &Tick) {
        self.high = self.high.max(tick.price);
        self.low = self.low.min(tick.price);
        self.close = tick.price;
        self.volume += tick.volume;
        self.tick_count += 1;
        self.last_tick = tick.timestamp;
    }

    fn close(self, symbol: &Symbol, timeframe: Timeframe) -> Candle {
        Candle {
            symbol: symbol.clone(),
            timeframe,
            period_start: self.period.start,
            period_end: self.period.end,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            tick_count: self.tick_count,
        }
    }

    /// Returns the period being built.
    #[must_use]
    pub const fn period(&self) -> Period {
        self.period
    }

    /// Returns the number of ticks folded in so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Returns the timestamp of the last tick folded in.
    #[must_use]
    pub const fn last_tick(&self) -> DateTime<Utc> {
        self.last_tick
    }
}

/// Streaming candle aggregator for one symbol and timeframe.
///
/// Candles are emitted only once closed: when a tick at or after the period
/// end arrives, or on an explicit [`flush`](Self::flush) with a reason.
#[derive(Debug, Clone)]
pub struct CandleAggregator {
    symbol: Symbol,
    timeframe: Timeframe,
    calendar: MarketCalendar,
    partial: Option<PartialCandle>,
    last_tick: Option<DateTime<Utc>>,
    resume_point: Option<DateTime<Utc>>,
    skipped: u64,
}

impl CandleAggregator {
    /// Creates a new aggregator with no partial state.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeframe cannot be aligned.
    pub fn new(
        symbol: Symbol,
        timeframe: Timeframe,
        calendar: MarketCalendar,
    ) -> Result<Self, AggregateError> {
        timeframe
            .validate()
            .map_err(|e| AggregateError::Calendar(e.into()))?;
        Ok(Self {
            symbol,
            timeframe,
            calendar,
            partial: None,
            last_tick: None,
            resume_point: None,
            skipped: 0,
        })
    }

    /// Starts from an existing partial candle instead of an empty state.
    #[must_use]
    pub fn with_partial(mut self, partial: Option<PartialCandle>) -> Self {
        self.last_tick = partial.as_ref().map(PartialCandle::last_tick);
        self.partial = partial;
        self
    }

    /// Ignores ticks before `resume_point`, which belong to periods already
    /// committed. Ignored ticks still take part in the ordering check.
    #[must_use]
    pub const fn with_resume_point(mut self, resume_point: Option<DateTime<Utc>>) -> Self {
        self.resume_point = resume_point;
        self
    }

    /// Returns the symbol being aggregated.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Returns the timeframe being aggregated to.
    #[must_use]
    pub const fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Returns the in-progress candle, if any.
    #[must_use]
    pub const fn partial(&self) -> Option<&PartialCandle> {
        self.partial.as_ref()
    }

    /// Returns the number of ticks ignored because of the resume point.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Consumes the aggregator, returning the final partial state.
    #[must_use]
    pub fn into_partial(self) -> Option<PartialCandle> {
        self.partial
    }

    /// Processes a tick, potentially emitting the candle it closes.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::OutOfOrderTick`] if the tick is older than
    /// the previous one; the aggregator state is left untouched.
    pub fn process(&mut self, tick: Tick) -> Result<Option<Candle>, AggregateError> {
        if let Some(previous) = self.last_tick
            && tick.timestamp < previous
        {
            return Err(AggregateError::OutOfOrderTick {
                symbol: self.symbol.clone(),
                previous,
                received: tick.timestamp,
            });
        }

        if self.resume_point.is_some_and(|resume| tick.timestamp < resume) {
            self.last_tick = Some(tick.timestamp);
            self.skipped += 1;
            return Ok(None);
        }

        match self.partial.as_mut() {
            Some(partial) if tick.timestamp < partial.period.end => {
                partial.update(&tick);
                self.last_tick = Some(tick.timestamp);
                Ok(None)
            }
            _ => {
                let period = self.calendar.align(tick.timestamp, self.timeframe)?;
                self.last_tick = Some(tick.timestamp);
                let closed = self
                    .partial
                    .replace(PartialCandle::new(period, &tick))
                    .map(|done| done.close(&self.symbol, self.timeframe));
                Ok(closed)
            }
        }
    }

    /// Closes the in-progress candle if `reason` guarantees it is final.
    ///
    /// Returns `None` and keeps the partial state when the period may still
    /// receive ticks.
    pub fn flush(&mut self, reason: FlushReason) -> Option<Candle> {
        let closable = match (reason, self.partial.as_ref()) {
            (_, None) => false,
            (FlushReason::MarketClosed, Some(_)) => true,
            (FlushReason::PeriodElapsed(now), Some(partial)) => now >= partial.period.end,
        };
        if !closable {
            return None;
        }
        self.partial
            .take()
            .map(|done| done.close(&self.symbol, self.timeframe))
    }

    /// Wraps a tick sequence into a lazy sequence of closed candles.
    ///
    /// The aggregator (and with it the final partial state) is recovered with
    /// [`Candles::into_aggregator`].
    pub fn candles<I>(self, ticks: I) -> Candles<I::IntoIter>
    where
        I: IntoIterator<Item = Tick>,
    {
        Candles {
            aggregator: self,
            ticks: ticks.into_iter(),
            failed: false,
        }
    }
}

/// Lazy iterator of closed candles over a tick iterator.
///
/// Stops after the first error.
#[derive(Debug)]
pub struct Candles<I> {
    aggregator: CandleAggregator,
    ticks: I,
    failed: bool,
}

impl<I> Candles<I> {
    /// Returns the aggregator holding the remaining partial state.
    #[must_use]
    pub fn into_aggregator(self) -> CandleAggregator {
        self.aggregator
    }
}

impl<I: Iterator<Item = Tick>> Iterator for Candles<I> {
    type Item = Result<Candle, AggregateError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        for tick in self.ticks.by_ref() {
            match self.aggregator.process(tick) {
                Ok(Some(candle)) => return Some(Ok(candle)),
                Ok(None) => {}
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
