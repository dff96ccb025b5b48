//! Atomic candle file upserts.

use std::collections::BTreeMap;
use std::path::PathBuf;

use candela_aggregate::Candle;
use candela_types::{Symbol, Timeframe};
use chrono::{DateTime, Utc};

use crate::codec::{read_candle_file, write_candles};
use crate::{StagedFile, StoreError, StoreLayout, sweep_temp_files};

/// Outcome of one upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Candle file that was replaced.
    pub path: PathBuf,
    /// Candles whose `period_start` was not in the file.
    pub inserted: usize,
    /// Candles that replaced an existing row.
    pub replaced: usize,
    /// Candles in the file afterwards.
    pub total: usize,
    /// `period_end` of the last candle in the file afterwards.
    pub last_period_end: Option<DateTime<Utc>>,
}

/// Writes candle files so that readers only ever see complete files.
///
/// An upsert reads the current file, merges the new candles by
/// `period_start` (new rows win), writes the merged set to a temporary file
/// in the same directory, syncs it and renames it over the target.
///
/// The writer assumes it is the only writer of a series; mutual exclusion is
/// the scheduler's job.
#[derive(Debug, Clone)]
pub struct CandleWriter {
    layout: StoreLayout,
}

impl CandleWriter {
    /// Creates a writer for a target directory.
    #[must_use]
    pub const fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Returns the store layout.
    #[must_use]
    pub const fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Reads every candle of a series.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn read(&self, symbol: &Symbol, timeframe: Timeframe) -> Result<Vec<Candle>, StoreError> {
        read_candle_file(&self.layout.candle_path(symbol, timeframe), symbol, timeframe)
    }

    /// Merges candles into the series file and stages the result without
    /// publishing it.
    ///
    /// # Errors
    ///
    /// Returns an error if a candle belongs to another series, if the
    /// existing file is unreadable or if the temporary file cannot be
    /// written.
    pub fn stage(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        candles: &[Candle],
    ) -> Result<(StagedFile, UpsertSummary), StoreError> {
        let path = self.layout.candle_path(symbol, timeframe);

        if let Some(stray) = candles
            .iter()
            .find(|c| &c.symbol != symbol || c.timeframe != timeframe)
        {
            return Err(StoreError::Corrupt {
                path,
                reason: format!(
                    "candle for {} {} cannot be written to this file",
                    stray.symbol, stray.timeframe
                ),
            });
        }

        let mut merged: BTreeMap<DateTime<Utc>, Candle> = read_candle_file(&path, symbol, timeframe)?
            .into_iter()
            .map(|c| (c.period_start, c))
            .collect();

        let mut inserted = 0;
        let mut replaced = 0;
        for candle in candles {
            match merged.insert(candle.period_start, candle.clone()) {
                Some(_) => replaced += 1,
                None => inserted += 1,
            }
        }

        let staged = StagedFile::create(&path, |w| write_candles(w, merged.values(), &path))?;
        let summary = UpsertSummary {
            path,
            inserted,
            replaced,
            total: merged.len(),
            last_period_end: merged.values().next_back().map(|c| c.period_end),
        };
        Ok((staged, summary))
    }

    /// Merges candles into the series file and atomically replaces it.
    ///
    /// An empty candle slice leaves the file untouched.
    ///
    /// # Errors
    ///
    /// Returns an error on any failure; the file is then unchanged.
    pub fn upsert_candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        candles: &[Candle],
    ) -> Result<UpsertSummary, StoreError> {
        if candles.is_empty() {
            let existing = self.read(symbol, timeframe)?;
            return Ok(UpsertSummary {
                path: self.layout.candle_path(symbol, timeframe),
                inserted: 0,
                replaced: 0,
                total: existing.len(),
                last_period_end: existing.last().map(|c| c.period_end),
            });
        }

        let (staged, summary) = self.stage(symbol, timeframe, candles)?;
        staged.publish()?;
        tracing::debug!(
            %symbol,
            %timeframe,
            inserted = summary.inserted,
            replaced = summary.replaced,
            total = summary.total,
            "upserted candles"
        );
        Ok(summary)
    }

    /// Removes temporary files left by an interrupted writer of `symbol`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be cleaned.
    pub fn sweep(&self, symbol: &Symbol) -> Result<usize, StoreError> {
        sweep_temp_files(&self.layout.candle_dir(symbol))
    }

    /// Deletes the candle file of a series. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self, symbol: &Symbol, timeframe: Timeframe) -> Result<bool, StoreError> {
        let path = self.layout.candle_path(symbol, timeframe);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}
