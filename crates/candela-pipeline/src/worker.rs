//! Per-symbol incremental update.

use std::fmt;
use std::sync::Arc;

use candela_aggregate::{AggregateError, Candle, CandleAggregator, FlushReason, MarketCalendar};
use candela_fetch::{FetchError, TickSource};
use candela_store::{CandleWriter, CheckpointStore, StoreError};
use candela_types::{Symbol, TimeRange, Timeframe};
use chrono::{DateTime, TimeDelta, Utc};
use futures::StreamExt;

use crate::{PipelineConfig, PipelineError};

/// Where a [`SymbolWorker`] is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for the next cycle.
    Idle,
    /// Requesting ticks for the gap since the checkpoint.
    FetchingGap,
    /// Folding ticks into candles.
    Aggregating,
    /// Writing candles, then advancing checkpoints.
    Committing,
    /// The cycle hit an error; nothing past the last durable write counts.
    Failed,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::FetchingGap => "fetching-gap",
            Self::Aggregating => "aggregating",
            Self::Committing => "committing",
            Self::Failed => "failed",
        })
    }
}

/// A series whose checkpoint moved during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// Series timeframe.
    pub timeframe: Timeframe,
    /// Closed candles written.
    pub candles: usize,
    /// New checkpoint.
    pub checkpoint: DateTime<Utc>,
}

/// What one cycle did for one symbol.
#[derive(Debug)]
pub struct CycleReport {
    /// The symbol.
    pub symbol: Symbol,
    /// Range requested from the tick source, if anything was due.
    pub gap: Option<TimeRange>,
    /// Ticks received.
    pub ticks: u64,
    /// Series that advanced.
    pub committed: Vec<Committed>,
    /// Errors contained by the worker.
    pub failures: Vec<PipelineError>,
}

impl CycleReport {
    fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            gap: None,
            ticks: 0,
            committed: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Returns true if no error was contained.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the number of candles written.
    #[must_use]
    pub fn candles(&self) -> usize {
        self.committed.iter().map(|c| c.candles).sum()
    }
}

struct Series {
    timeframe: Timeframe,
    aggregator: CandleAggregator,
    closed: Vec<Candle>,
    failed: bool,
}

/// Brings every timeframe of one symbol up to date.
///
/// A cycle reads the checkpoints, fetches the ticks of the gap once, fans
/// them out to one aggregator per timeframe and commits each timeframe
/// independently: candles first, checkpoint second. Any failure leaves the
/// checkpoint where it was, so the next cycle retries the same gap.
pub struct SymbolWorker {
    symbol: Symbol,
    timeframes: Vec<Timeframe>,
    calendar: MarketCalendar,
    history_start: DateTime<Utc>,
    settle_delay: TimeDelta,
    source: Arc<dyn TickSource>,
    writer: CandleWriter,
    checkpoints: CheckpointStore,
    state: WorkerState,
}

impl fmt::Debug for SymbolWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolWorker")
            .field("symbol", &self.symbol)
            .field("timeframes", &self.timeframes)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SymbolWorker {
    /// Creates the worker owning `symbol`.
    #[must_use]
    pub fn new(config: &PipelineConfig, symbol: Symbol, source: Arc<dyn TickSource>) -> Self {
        let layout = config.layout();
        Self {
            symbol,
            timeframes: config.timeframes.clone(),
            calendar: config.calendar,
            history_start: config.history_start,
            settle_delay: config.settle_delay(),
            source,
            writer: CandleWriter::new(layout.clone()),
            checkpoints: CheckpointStore::new(layout),
            state: WorkerState::Idle,
        }
    }

    /// Returns the symbol owned by this worker.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> WorkerState {
        self.state
    }

    fn transition(&mut self, next: WorkerState) {
        tracing::trace!(symbol = %self.symbol, from = %self.state, to = %next, "worker state");
        self.state = next;
    }

    /// Runs one cycle ending at `now`.
    ///
    /// Never fails: errors are logged, collected in the report and the
    /// worker returns to [`WorkerState::Idle`].
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::new(self.symbol.clone());

        if let Err(error) = self.cycle(now, &mut report).await {
            self.transition(WorkerState::Failed);
            log_failure(&error, report.gap);
            report.failures.push(error);
        } else {
            tracing::info!(
                symbol = %self.symbol,
                ticks = report.ticks,
                candles = report.candles(),
                failures = report.failures.len(),
                "cycle complete"
            );
        }

        self.transition(WorkerState::Idle);
        report
    }

    async fn cycle(
        &mut self,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<(), PipelineError> {
        let cursors = self.load_checkpoints().await?;

        let mut series = Vec::with_capacity(cursors.len());
        let mut gap_start: Option<DateTime<Utc>> = None;
        for (timeframe, cursor) in cursors {
            let checkpoint = match cursor {
                Ok(checkpoint) => checkpoint,
                Err(source) => {
                    let error = PipelineError::WriteFailure {
                        symbol: self.symbol.clone(),
                        timeframe: Some(timeframe),
                        source,
                    };
                    log_failure(&error, None);
                    report.failures.push(error);
                    continue;
                }
            };

            match self.series(timeframe, checkpoint) {
                Ok(s) => {
                    let from = checkpoint.unwrap_or(self.history_start);
                    gap_start = Some(gap_start.map_or(from, |g| g.min(from)));
                    series.push(s);
                }
                Err(error) => {
                    log_failure(&error, None);
                    report.failures.push(error);
                }
            }
        }

        let Some(gap_start) = gap_start.filter(|start| *start < now) else {
            tracing::debug!(symbol = %self.symbol, "nothing to fetch");
            return Ok(());
        };
        let gap = TimeRange::new(gap_start, now).map_err(|e| PipelineError::Executor {
            worker: self.symbol.to_string(),
            reason: e.to_string(),
        })?;
        report.gap = Some(gap);

        self.transition(WorkerState::FetchingGap);
        let symbol = self.symbol.clone();
        let fetch_failure = |source: FetchError| PipelineError::FetchFailure {
            symbol: symbol.clone(),
            gap,
            source,
        };
        let mut ticks = self
            .source
            .fetch_ticks(&symbol, gap)
            .await
            .map_err(fetch_failure)?;

        self.transition(WorkerState::Aggregating);
        while let Some(tick) = ticks.next().await {
            let tick = tick.map_err(fetch_failure)?;
            report.ticks += 1;

            for s in series.iter_mut().filter(|s| !s.failed) {
                match s.aggregator.process(tick) {
                    Ok(Some(candle)) => s.closed.push(candle),
                    Ok(None) => {}
                    Err(AggregateError::OutOfOrderTick {
                        previous, received, ..
                    }) => {
                        return Err(PipelineError::OutOfOrderTick {
                            symbol: symbol.clone(),
                            gap,
                            previous,
                            received,
                        });
                    }
                    Err(AggregateError::Calendar(e)) => {
                        let error = PipelineError::InvalidTimeframe {
                            symbol: symbol.clone(),
                            timeframe: s.timeframe,
                            reason: e.to_string(),
                        };
                        log_failure(&error, Some(gap));
                        report.failures.push(error);
                        s.failed = true;
                    }
                }
            }
        }

        let horizon = now - self.settle_delay;
        for s in series.iter_mut().filter(|s| !s.failed) {
            if let Some(candle) = s.aggregator.flush(FlushReason::PeriodElapsed(horizon)) {
                s.closed.push(candle);
            }
        }

        self.transition(WorkerState::Committing);
        let pending: Vec<(Timeframe, Vec<Candle>)> = series
            .into_iter()
            .filter(|s| !s.failed && !s.closed.is_empty())
            .map(|s| (s.timeframe, s.closed))
            .collect();
        let (committed, failures) = self.commit(pending).await?;
        for error in &failures {
            log_failure(error, Some(gap));
        }
        report.committed.extend(committed);
        report.failures.extend(failures);
        Ok(())
    }

    fn series(
        &self,
        timeframe: Timeframe,
        checkpoint: Option<DateTime<Utc>>,
    ) -> Result<Series, PipelineError> {
        let invalid = |reason: String| PipelineError::InvalidTimeframe {
            symbol: self.symbol.clone(),
            timeframe,
            reason,
        };

        // Series without a checkpoint start at the first whole period.
        let resume = match checkpoint {
            Some(checkpoint) => checkpoint,
            None => {
                let first = self
                    .calendar
                    .align(self.history_start, timeframe)
                    .map_err(|e| invalid(e.to_string()))?;
                if first.start == self.history_start {
                    first.start
                } else {
                    first.end
                }
            }
        };

        let aggregator = CandleAggregator::new(self.symbol.clone(), timeframe, self.calendar)
            .map_err(|e| invalid(e.to_string()))?
            .with_resume_point(Some(resume));
        Ok(Series {
            timeframe,
            aggregator,
            closed: Vec::new(),
            failed: false,
        })
    }

    async fn load_checkpoints(
        &self,
    ) -> Result<Vec<(Timeframe, Result<Option<DateTime<Utc>>, StoreError>)>, PipelineError> {
        let symbol = self.symbol.clone();
        let timeframes = self.timeframes.clone();
        let writer = self.writer.clone();
        let checkpoints = self.checkpoints.clone();

        blocking(&self.symbol, move || {
            let swept = writer.sweep(&symbol)? + checkpoints.sweep(&symbol)?;
            if swept > 0 {
                tracing::info!(%symbol, files = swept, "removed stale temporary files");
            }
            Ok(timeframes
                .into_iter()
                .map(|tf| (tf, checkpoints.read(&symbol, tf)))
                .collect())
        })
        .await?
        .map_err(|source| PipelineError::WriteFailure {
            symbol: self.symbol.clone(),
            timeframe: None,
            source,
        })
    }

    async fn commit(
        &self,
        pending: Vec<(Timeframe, Vec<Candle>)>,
    ) -> Result<(Vec<Committed>, Vec<PipelineError>), PipelineError> {
        let symbol = self.symbol.clone();
        let writer = self.writer.clone();
        let checkpoints = self.checkpoints.clone();

        blocking(&self.symbol, move || {
            let mut committed = Vec::new();
            let mut failures = Vec::new();
            for (timeframe, candles) in pending {
                let Some(checkpoint) = candles.last().map(|c| c.period_end) else {
                    continue;
                };
                let result = writer
                    .upsert_candles(&symbol, timeframe, &candles)
                    .and_then(|_| checkpoints.commit(&symbol, timeframe, checkpoint));
                match result {
                    Ok(()) => committed.push(Committed {
                        timeframe,
                        candles: candles.len(),
                        checkpoint,
                    }),
                    Err(source) => failures.push(PipelineError::WriteFailure {
                        symbol: symbol.clone(),
                        timeframe: Some(timeframe),
                        source,
                    }),
                }
            }
            (committed, failures)
        })
        .await
    }
}

async fn blocking<T, F>(symbol: &Symbol, f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Executor {
            worker: symbol.to_string(),
            reason: e.to_string(),
        })
}

fn log_failure(error: &PipelineError, gap: Option<TimeRange>) {
    let symbol = error.symbol().map_or_else(|| "-".to_string(), ToString::to_string);
    let timeframe = match error {
        PipelineError::InvalidTimeframe { timeframe, .. } => Some(*timeframe),
        PipelineError::WriteFailure { timeframe, .. } => *timeframe,
        _ => None,
    }
    .map_or_else(|| "*".to_string(), |t| t.to_string());
    let gap = gap.map_or_else(|| "-".to_string(), |g| g.to_string());

    tracing::warn!(
        %symbol,
        %timeframe,
        %gap,
        kind = %error.kind(),
        %error,
        "cycle failure, will retry next cycle"
    );
}
