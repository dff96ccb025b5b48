//! Pipeline error taxonomy.

use std::fmt;

use candela_fetch::FetchError;
use candela_store::StoreError;
use candela_types::{Symbol, TimeRange, Timeframe};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unsupported timeframe; affects that timeframe only.
    InvalidTimeframe,
    /// The tick source broke its ordering contract; the cycle is discarded.
    OutOfOrderTick,
    /// Disk or permission failure; the checkpoint stays where it was.
    WriteFailure,
    /// Network or provider failure; the same gap is retried next cycle.
    FetchFailure,
    /// Invalid configuration detected at startup.
    Config,
    /// A worker task or process could not run.
    Executor,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidTimeframe => "invalid-timeframe",
            Self::OutOfOrderTick => "out-of-order-tick",
            Self::WriteFailure => "write-failure",
            Self::FetchFailure => "fetch-failure",
            Self::Config => "config",
            Self::Executor => "executor",
        })
    }
}

/// Errors raised by the pipeline.
///
/// Only [`PipelineError::Config`] is fatal to the process. Everything else is
/// contained at the symbol worker and retried on the next cycle.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A timeframe cannot be aligned.
    #[error("Invalid timeframe {timeframe} for {symbol}: {reason}")]
    InvalidTimeframe {
        /// Symbol being processed.
        symbol: Symbol,
        /// The timeframe.
        timeframe: Timeframe,
        /// Why it was rejected.
        reason: String,
    },

    /// The tick source returned a tick older than its predecessor.
    #[error("Out-of-order tick for {symbol} in gap {gap}: {received} after {previous}")]
    OutOfOrderTick {
        /// Symbol being processed.
        symbol: Symbol,
        /// Gap being fetched.
        gap: TimeRange,
        /// Last accepted tick.
        previous: DateTime<Utc>,
        /// Rejected tick.
        received: DateTime<Utc>,
    },

    /// Candles or checkpoint could not be persisted.
    #[error("Write failure for {symbol} {}: {source}", .timeframe.map_or_else(|| "*".to_string(), |t| t.to_string()))]
    WriteFailure {
        /// Symbol being processed.
        symbol: Symbol,
        /// Affected timeframe, if the failure is specific to one.
        timeframe: Option<Timeframe>,
        /// Underlying store error.
        source: StoreError,
    },

    /// The tick source failed before the gap was fully delivered.
    #[error("Fetch failure for {symbol} in gap {gap}: {source}")]
    FetchFailure {
        /// Symbol being processed.
        symbol: Symbol,
        /// Gap being fetched.
        gap: TimeRange,
        /// Underlying fetch error.
        source: FetchError,
    },

    /// The configuration is unusable.
    #[error("Invalid configuration: {reason}")]
    Config {
        /// What is wrong.
        reason: String,
    },

    /// A worker task or process failed to run to completion.
    #[error("Worker {worker} failed: {reason}")]
    Executor {
        /// Worker description, such as a shard.
        worker: String,
        /// What went wrong.
        reason: String,
    },
}

impl PipelineError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTimeframe { .. } => ErrorKind::InvalidTimeframe,
            Self::OutOfOrderTick { .. } => ErrorKind::OutOfOrderTick,
            Self::WriteFailure { .. } => ErrorKind::WriteFailure,
            Self::FetchFailure { .. } => ErrorKind::FetchFailure,
            Self::Config { .. } => ErrorKind::Config,
            Self::Executor { .. } => ErrorKind::Executor,
        }
    }

    /// Returns true if the process must stop.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns the symbol the error is about, if any.
    #[must_use]
    pub const fn symbol(&self) -> Option<&Symbol> {
        match self {
            Self::InvalidTimeframe { symbol, .. }
            | Self::OutOfOrderTick { symbol, .. }
            | Self::WriteFailure { symbol, .. }
            | Self::FetchFailure { symbol, .. } => Some(symbol),
            Self::Config { .. } | Self::Executor { .. } => None,
        }
    }
}
