//! Parquet export command.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use candela_lib::{Symbol, Timeframe};
use chrono::{DateTime, Utc};

use crate::settings::Settings;

/// Export command arguments.
pub(crate) struct ExportArgs {
    pub(crate) output: PathBuf,
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) timeframes: Vec<Timeframe>,
    pub(crate) after: Option<DateTime<Utc>>,
    pub(crate) until: Option<DateTime<Utc>>,
    pub(crate) compression: String,
    pub(crate) omit_last: bool,
}

/// Writes committed candles to a Parquet dataset.
#[cfg(feature = "parquet")]
pub(crate) fn export(settings: &Settings, args: ExportArgs) -> Result<ExitCode> {
    use anyhow::{Context, anyhow};
    use candela_lib::{ExportCompression, ExportOptions, ParquetExporter};

    let config = settings.load()?;
    let compression: ExportCompression = args.compression.parse().map_err(|e| anyhow!("{e}"))?;

    let mut options = ExportOptions::new(&args.output);
    options.symbols = args.symbols;
    options.timeframes = args.timeframes;
    options.after = args.after;
    options.until = args.until;
    options.compression = compression;
    options.omit_last_candle = args.omit_last;

    let summary = ParquetExporter::new(config.layout())
        .export(&options)
        .with_context(|| format!("Failed to export to {}", args.output.display()))?;

    println!(
        "Exported {} rows from {} series into {} files under {}",
        summary.rows,
        summary.series,
        summary.files.len(),
        args.output.display()
    );
    Ok(ExitCode::SUCCESS)
}

/// Writes committed candles to a Parquet dataset.
#[cfg(not(feature = "parquet"))]
pub(crate) fn export(_settings: &Settings, _args: ExportArgs) -> Result<ExitCode> {
    anyhow::bail!("Parquet support not compiled in")
}
