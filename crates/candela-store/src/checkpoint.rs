//! Per-series extraction cursors.

use std::fs;
use std::io::Write;

use candela_types::{Symbol, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{StagedFile, StoreError, StoreLayout, sweep_temp_files};

/// Durable cursor of one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Series symbol.
    pub symbol: Symbol,
    /// Series timeframe.
    pub timeframe: Timeframe,
    /// `period_end` of the last candle durably written for the series.
    pub last_committed_period_end: DateTime<Utc>,
    /// Wall-clock time of the commit.
    pub committed_at: DateTime<Utc>,
}

/// Reads and advances checkpoints.
///
/// Each checkpoint is a small JSON file stored apart from the candles, so it
/// can be read without parsing the candle file. Checkpoints never move
/// backwards and are only removed by [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    layout: StoreLayout,
}

impl CheckpointStore {
    /// Creates a checkpoint store for a target directory.
    #[must_use]
    pub const fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Loads the full checkpoint record of a series.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read or parsed,
    /// or if it belongs to another series.
    pub fn load(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
    ) -> Result<Option<Checkpoint>, StoreError> {
        let path = self.layout.checkpoint_path(symbol, timeframe);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        let checkpoint: Checkpoint = serde_json::from_slice(&content)
            .map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?;
        if &checkpoint.symbol != symbol || checkpoint.timeframe != timeframe {
            return Err(StoreError::Corrupt {
                path,
                reason: format!(
                    "record belongs to {} {}",
                    checkpoint.symbol, checkpoint.timeframe
                ),
            });
        }
        Ok(Some(checkpoint))
    }

    /// Returns the last committed `period_end` of a series.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub fn read(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .load(symbol, timeframe)?
            .map(|c| c.last_committed_period_end))
    }

    /// Advances the checkpoint of a series.
    ///
    /// Committing the current value again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Regression`] if `period_end` is before the
    /// current checkpoint, or an I/O error if the record cannot be written.
    pub fn commit(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        period_end: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match self.read(symbol, timeframe)? {
            Some(current) if period_end < current => {
                return Err(StoreError::Regression {
                    symbol: symbol.clone(),
                    timeframe,
                    current,
                    requested: period_end,
                });
            }
            Some(current) if period_end == current => return Ok(()),
            _ => {}
        }

        let checkpoint = Checkpoint {
            symbol: symbol.clone(),
            timeframe,
            last_committed_period_end: period_end,
            committed_at: Utc::now(),
        };
        let path = self.layout.checkpoint_path(symbol, timeframe);
        StagedFile::create(&path, |w| {
            serde_json::to_writer_pretty(&mut *w, &checkpoint).map_err(|source| {
                StoreError::Json {
                    path: path.clone(),
                    source,
                }
            })?;
            w.write_all(b"\n").map_err(|e| StoreError::io(&path, e))
        })?
        .publish()?;

        tracing::debug!(%symbol, %timeframe, %period_end, "checkpoint advanced");
        Ok(())
    }

    /// Deletes the checkpoint of a series. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be removed.
    pub fn reset(&self, symbol: &Symbol, timeframe: Timeframe) -> Result<bool, StoreError> {
        let path = self.layout.checkpoint_path(symbol, timeframe);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(%symbol, %timeframe, "checkpoint reset");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Removes temporary files left by an interrupted commit for `symbol`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be cleaned.
    pub fn sweep(&self, symbol: &Symbol) -> Result<usize, StoreError> {
        sweep_temp_files(&self.layout.checkpoint_dir(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> CheckpointStore {
        CheckpointStore::new(StoreLayout::new(dir.path()))
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_missing_checkpoint() {
        let dir = TempDir::new().unwrap();
        let symbol = Symbol::new("EURUSD").unwrap();
        assert_eq!(store(&dir).read(&symbol, Timeframe::H1).unwrap(), None);
    }

    #[test]
    fn test_commit_and_read() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let symbol = Symbol::new("EURUSD").unwrap();

        store.commit(&symbol, Timeframe::H1, at(10)).unwrap();
        assert_eq!(store.read(&symbol, Timeframe::H1).unwrap(), Some(at(10)));
        assert_eq!(store.read(&symbol, Timeframe::M5).unwrap(), None);

        store.commit(&symbol, Timeframe::H1, at(12)).unwrap();
        let record = store.load(&symbol, Timeframe::H1).unwrap().unwrap();
        assert_eq!(record.last_committed_period_end, at(12));
        assert_eq!(record.symbol, symbol);
    }

    #[test]
    fn test_commit_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let symbol = Symbol::new("EURUSD").unwrap();

        store.commit(&symbol, Timeframe::H1, at(12)).unwrap();
        store.commit(&symbol, Timeframe::H1, at(12)).unwrap();
        let err = store.commit(&symbol, Timeframe::H1, at(11)).unwrap_err();
        assert!(matches!(err, StoreError::Regression { .. }));
        assert_eq!(store.read(&symbol, Timeframe::H1).unwrap(), Some(at(12)));
    }

    #[test]
    fn test_reset() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let symbol = Symbol::new("EURUSD").unwrap();

        store.commit(&symbol, Timeframe::H1, at(12)).unwrap();
        assert!(store.reset(&symbol, Timeframe::H1).unwrap());
        assert!(!store.reset(&symbol, Timeframe::H1).unwrap());
        store.commit(&symbol, Timeframe::H1, at(3)).unwrap();
        assert_eq!(store.read(&symbol, Timeframe::H1).unwrap(), Some(at(3)));
    }

    #[test]
    fn test_corrupt_record() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let symbol = Symbol::new("EURUSD").unwrap();
        let path = StoreLayout::new(dir.path()).checkpoint_path(&symbol, Timeframe::H1);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            store.read(&symbol, Timeframe::H1),
            Err(StoreError::Json { .. })
        ));
    }
}
