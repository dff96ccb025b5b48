//! Partitioned Parquet export of committed candles.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int32Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use candela_aggregate::Candle;
use candela_types::{Symbol, Timeframe};
use chrono::{DateTime, Datelike, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};

use crate::codec::read_candle_file;
use crate::{CheckpointStore, StagedFile, StoreError, StoreLayout};

/// Parquet compression codec for exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportCompression {
    /// Zstandard.
    #[default]
    Zstd,
    /// Snappy.
    Snappy,
    /// No compression.
    Uncompressed,
}

impl ExportCompression {
    fn codec(self) -> Compression {
        match self {
            Self::Zstd => Compression::ZSTD(ZstdLevel::default()),
            Self::Snappy => Compression::SNAPPY,
            Self::Uncompressed => Compression::UNCOMPRESSED,
        }
    }
}

impl fmt::Display for ExportCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Zstd => "zstd",
            Self::Snappy => "snappy",
            Self::Uncompressed => "uncompressed",
        })
    }
}

impl FromStr for ExportCompression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zstd" => Ok(Self::Zstd),
            "snappy" => Ok(Self::Snappy),
            "none" | "uncompressed" => Ok(Self::Uncompressed),
            other => Err(format!("unknown compression '{other}'")),
        }
    }
}

/// What to export and where.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Dataset root directory.
    pub output: PathBuf,
    /// Symbols to export; empty means every symbol in the store.
    pub symbols: Vec<Symbol>,
    /// Timeframes to export; empty means every timeframe in the store.
    pub timeframes: Vec<Timeframe>,
    /// Keep candles with `period_start >= after`.
    pub after: Option<DateTime<Utc>>,
    /// Keep candles with `period_start < until`.
    pub until: Option<DateTime<Utc>>,
    /// Parquet codec.
    pub compression: ExportCompression,
    /// Drop the last committed candle of every series.
    pub omit_last_candle: bool,
}

impl ExportOptions {
    /// Exports everything into `output` with default settings.
    #[must_use]
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            symbols: Vec::new(),
            timeframes: Vec::new(),
            after: None,
            until: None,
            compression: ExportCompression::default(),
            omit_last_candle: false,
        }
    }

    fn selects(&self, symbol: &Symbol, timeframe: Timeframe) -> bool {
        (self.symbols.is_empty() || self.symbols.contains(symbol))
            && (self.timeframes.is_empty() || self.timeframes.contains(&timeframe))
    }

    fn keeps(&self, candle: &Candle) -> bool {
        self.after.is_none_or(|after| candle.period_start >= after)
            && self.until.is_none_or(|until| candle.period_start < until)
    }
}

/// Outcome of an export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Parquet files written.
    pub files: Vec<PathBuf>,
    /// Series read.
    pub series: usize,
    /// Rows written.
    pub rows: usize,
}

/// Writes committed candles as a Parquet dataset partitioned as
/// `symbol=<S>/year=<Y>/part_<uuid>.parquet`.
///
/// Only candles covered by the series checkpoint are exported.
#[derive(Debug, Clone)]
pub struct ParquetExporter {
    layout: StoreLayout,
    checkpoints: CheckpointStore,
}

impl ParquetExporter {
    /// Creates an exporter reading from a target directory.
    #[must_use]
    pub fn new(layout: StoreLayout) -> Self {
        let checkpoints = CheckpointStore::new(layout.clone());
        Self {
            layout,
            checkpoints,
        }
    }

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("symbol", DataType::Utf8, false),
            Field::new("timeframe", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
            Field::new(
                "time",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
            Field::new("open", DataType::Float64, false),
            Field::new("high", DataType::Float64, false),
            Field::new("low", DataType::Float64, false),
            Field::new("close", DataType::Float64, false),
            Field::new("volume", DataType::Float64, false),
        ])
    }

    fn to_batch(candles: &[Candle], path: &Path) -> Result<RecordBatch, StoreError> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                candles.iter().map(|c| c.symbol.to_string()),
            )),
            Arc::new(StringArray::from_iter_values(
                candles.iter().map(|c| c.timeframe.to_string()),
            )),
            Arc::new(Int32Array::from_iter_values(
                candles.iter().map(|c| c.period_start.year()),
            )),
            Arc::new(
                TimestampMicrosecondArray::from_iter_values(
                    candles.iter().map(|c| c.period_start.timestamp_micros()),
                )
                .with_timezone("UTC"),
            ),
            Arc::new(Float64Array::from_iter_values(candles.iter().map(|c| c.open))),
            Arc::new(Float64Array::from_iter_values(candles.iter().map(|c| c.high))),
            Arc::new(Float64Array::from_iter_values(candles.iter().map(|c| c.low))),
            Arc::new(Float64Array::from_iter_values(candles.iter().map(|c| c.close))),
            Arc::new(Float64Array::from_iter_values(candles.iter().map(|c| c.volume))),
        ];
        RecordBatch::try_new(Arc::new(Self::schema()), columns).map_err(|e| {
            StoreError::Parquet {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })
    }

    fn committed(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        options: &ExportOptions,
    ) -> Result<Vec<Candle>, StoreError> {
        let Some(checkpoint) = self.checkpoints.read(symbol, timeframe)? else {
            return Ok(Vec::new());
        };
        let path = self.layout.candle_path(symbol, timeframe);
        let mut candles: Vec<Candle> = read_candle_file(&path, symbol, timeframe)?
            .into_iter()
            .filter(|c| c.period_end <= checkpoint)
            .collect();
        if options.omit_last_candle {
            candles.pop();
        }
        candles.retain(|c| options.keeps(c));
        Ok(candles)
    }

    fn write_part(
        path: &Path,
        candles: &[Candle],
        compression: ExportCompression,
    ) -> Result<(), StoreError> {
        let batch = Self::to_batch(candles, path)?;
        let props = WriterProperties::builder()
            .set_compression(compression.codec())
            .build();
        let parquet_err = |e: parquet::errors::ParquetError| StoreError::Parquet {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        StagedFile::create(path, |w| {
            let mut writer =
                ArrowWriter::try_new(w, batch.schema(), Some(props)).map_err(parquet_err)?;
            writer.write(&batch).map_err(parquet_err)?;
            writer.close().map_err(parquet_err)?;
            Ok(())
        })?
        .publish()?;
        Ok(())
    }

    /// Runs an export.
    ///
    /// # Errors
    ///
    /// Returns an error if a candle file or checkpoint cannot be read or a
    /// Parquet file cannot be written. Files written before the failure stay
    /// in place.
    pub fn export(&self, options: &ExportOptions) -> Result<ExportSummary, StoreError> {
        let mut summary = ExportSummary::default();
        let mut partitions: BTreeMap<(Symbol, i32), Vec<Candle>> = BTreeMap::new();

        for (symbol, timeframe) in self.layout.series()? {
            if !options.selects(&symbol, timeframe) {
                continue;
            }
            summary.series += 1;
            for candle in self.committed(&symbol, timeframe, options)? {
                partitions
                    .entry((symbol.clone(), candle.period_start.year()))
                    .or_default()
                    .push(candle);
            }
        }

        for ((symbol, year), candles) in partitions {
            let dir = options
                .output
                .join(format!("symbol={symbol}"))
                .join(format!("year={year}"));
            let path = dir.join(format!("part_{}.parquet", uuid::Uuid::new_v4()));
            Self::write_part(&path, &candles, options.compression)?;
            tracing::debug!(path = %path.display(), rows = candles.len(), "wrote partition");
            summary.rows += candles.len();
            summary.files.push(path);
        }

        tracing::info!(
            files = summary.files.len(),
            rows = summary.rows,
            output = %options.output.display(),
            "export finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CandleWriter;
    use chrono::{TimeDelta, TimeZone};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    fn candles(symbol: &Symbol, start: DateTime<Utc>, count: i64) -> Vec<Candle> {
        (0..count)
            .map(|i| Candle {
                symbol: symbol.clone(),
                timeframe: Timeframe::D1,
                period_start: start + TimeDelta::days(i),
                period_end: start + TimeDelta::days(i + 1),
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 10.0,
                tick_count: 5,
            })
            .collect()
    }

    fn row_count(path: &Path) -> usize {
        let file = std::fs::File::open(path).unwrap();
        ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap()
            .map(|b| b.unwrap().num_rows())
            .sum()
    }

    fn seeded_store(dir: &TempDir) -> (StoreLayout, Symbol) {
        let layout = StoreLayout::new(dir.path().join("target"));
        let symbol = Symbol::new("EURUSD").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 12, 29, 0, 0, 0).unwrap();
        let all = candles(&symbol, start, 6);

        CandleWriter::new(layout.clone())
            .upsert_candles(&symbol, Timeframe::D1, &all)
            .unwrap();
        // The last candle is written but not committed.
        CheckpointStore::new(layout.clone())
            .commit(&symbol, Timeframe::D1, all[4].period_end)
            .unwrap();
        (layout, symbol)
    }

    #[test]
    fn test_export_partitions_by_year() {
        let dir = TempDir::new().unwrap();
        let (layout, _) = seeded_store(&dir);
        let output = dir.path().join("dataset");

        let summary = ParquetExporter::new(layout)
            .export(&ExportOptions::new(&output))
            .unwrap();

        assert_eq!(summary.series, 1);
        assert_eq!(summary.rows, 5);
        assert_eq!(summary.files.len(), 2);

        let rows_2024: usize = summary
            .files
            .iter()
            .filter(|p| p.starts_with(output.join("symbol=EURUSD/year=2024")))
            .map(|p| row_count(p))
            .sum();
        assert_eq!(rows_2024, 3);
        for file in &summary.files {
            let name = file.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("part_") && name.ends_with(".parquet"));
        }
    }

    #[test]
    fn test_export_filters() {
        let dir = TempDir::new().unwrap();
        let (layout, symbol) = seeded_store(&dir);

        let mut options = ExportOptions::new(dir.path().join("dataset"));
        options.after = Some(Utc.with_ymd_and_hms(2024, 12, 30, 0, 0, 0).unwrap());
        options.until = Some(Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap());
        options.omit_last_candle = true;
        options.symbols = vec![symbol];
        options.compression = ExportCompression::Snappy;

        let summary = ParquetExporter::new(layout).export(&options).unwrap();
        assert_eq!(summary.rows, 3);
    }

    #[test]
    fn test_export_skips_uncommitted_series() {
        let dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(dir.path().join("target"));
        let symbol = Symbol::new("GBPUSD").unwrap();
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        CandleWriter::new(layout.clone())
            .upsert_candles(&symbol, Timeframe::D1, &candles(&symbol, start, 2))
            .unwrap();

        let summary = ParquetExporter::new(layout)
            .export(&ExportOptions::new(dir.path().join("dataset")))
            .unwrap();
        assert_eq!(summary.rows, 0);
        assert!(summary.files.is_empty());
    }

    #[test]
    fn test_compression_parse() {
        assert_eq!("ZSTD".parse::<ExportCompression>().unwrap(), ExportCompression::Zstd);
        assert_eq!(
            "none".parse::<ExportCompression>().unwrap(),
            ExportCompression::Uncompressed
        );
        assert!("lz4".parse::<ExportCompression>().is_err());
        assert_eq!(ExportCompression::default().to_string(), "zstd");
    }
}
