//! Store errors.

use candela_types::{Symbol, Timeframe};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the candle and checkpoint stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Candle file could not be read or written as CSV.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Candle file path.
        path: PathBuf,
        /// Underlying error.
        source: csv::Error,
    },

    /// Checkpoint record could not be read or written.
    #[error("Checkpoint error in {path}: {source}")]
    Json {
        /// Checkpoint file path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// A persisted file has content that is not valid.
    #[error("Corrupt file {path}: {reason}")]
    Corrupt {
        /// Offending file.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// A checkpoint commit would move the cursor backwards.
    #[error("Checkpoint for {symbol} {timeframe} is at {current}, refusing to move it back to {requested}")]
    Regression {
        /// Series symbol.
        symbol: Symbol,
        /// Series timeframe.
        timeframe: Timeframe,
        /// Current checkpoint.
        current: DateTime<Utc>,
        /// Requested checkpoint.
        requested: DateTime<Utc>,
    },

    /// Parquet export failed.
    #[error("Parquet error for {path}: {reason}")]
    Parquet {
        /// Output file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the file the error relates to.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Io { path, .. }
            | Self::Csv { path, .. }
            | Self::Json { path, .. }
            | Self::Corrupt { path, .. }
            | Self::Parquet { path, .. } => Some(path),
            Self::Regression { .. } => None,
        }
    }
}
