//! Candle file format.
//!
//! Candle files are plain CSV with a header row, one candle per line,
//! ordered by `period_start`:
//!
//! ```text
//! period_start,period_end,open,high,low,close,volume,tick_count
//! 2025-01-06T09:00:00Z,2025-01-06T10:00:00Z,100.0,102.0,100.0,101.0,3.0,3
//! ```
//!
//! Field order and presence are part of the file format. Symbol and
//! timeframe are implied by the file location.

use std::io::{Read, Write};
use std::path::Path;

use candela_aggregate::Candle;
use candela_types::{Symbol, Timeframe};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Column names, in file order.
pub const HEADER: [&str; 8] = [
    "period_start",
    "period_end",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "tick_count",
];

#[derive(Debug, Serialize, Deserialize)]
struct CandleRow {
    period_start: String,
    period_end: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    tick_count: u64,
}

impl From<&Candle> for CandleRow {
    fn from(candle: &Candle) -> Self {
        Self {
            period_start: format_timestamp(candle.period_start),
            period_end: format_timestamp(candle.period_end),
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            tick_count: candle.tick_count,
        }
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
}

/// Writes candles with a header row.
///
/// # Errors
///
/// Returns an error if writing fails; `path` is only used for reporting.
pub fn write_candles<'a, W: Write>(
    writer: W,
    candles: impl IntoIterator<Item = &'a Candle>,
    path: &Path,
) -> Result<(), StoreError> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut out = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(writer);
    for candle in candles {
        out.serialize(CandleRow::from(candle)).map_err(csv_err)?;
    }
    out.flush().map_err(|e| StoreError::io(path, e))
}

/// Reads candles of one series, checking the header and field values.
///
/// # Errors
///
/// Returns an error if the data is not a valid candle file.
pub fn read_candles<R: Read>(
    reader: R,
    symbol: &Symbol,
    timeframe: Timeframe,
    path: &Path,
) -> Result<Vec<Candle>, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };
    let mut input = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers = input.headers().map_err(|source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    if !headers.is_empty() && headers.iter().ne(HEADER) {
        return Err(corrupt(format!("unexpected header {headers:?}")));
    }

    let mut candles = Vec::new();
    for row in input.deserialize::<CandleRow>() {
        let row = row.map_err(|source| StoreError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        candles.push(Candle {
            symbol: symbol.clone(),
            timeframe,
            period_start: parse_timestamp(&row.period_start).map_err(corrupt)?,
            period_end: parse_timestamp(&row.period_end).map_err(corrupt)?,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            tick_count: row.tick_count,
        });
    }
    Ok(candles)
}

/// Reads the candle file at `path`; a missing file holds no candles.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn read_candle_file(
    path: &Path,
    symbol: &Symbol,
    timeframe: Timeframe,
) -> Result<Vec<Candle>, StoreError> {
    match std::fs::File::open(path) {
        Ok(file) => read_candles(std::io::BufReader::new(file), symbol, timeframe, path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(hour: u32) -> Candle {
        Candle {
            symbol: Symbol::new("EURUSD").unwrap(),
            timeframe: Timeframe::H1,
            period_start: Utc.with_ymd_and_hms(2025, 1, 6, hour, 0, 0).unwrap(),
            period_end: Utc.with_ymd_and_hms(2025, 1, 6, hour + 1, 0, 0).unwrap(),
            open: 100.0,
            high: 102.0,
            low: 100.0,
            close: 101.0,
            volume: 3.0,
            tick_count: 3,
        }
    }

    #[test]
    fn test_write_format() {
        let mut out = Vec::new();
        write_candles(&mut out, &[candle(9)], Path::new("mem")).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), HEADER.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "2025-01-06T09:00:00Z,2025-01-06T10:00:00Z,100.0,102.0,100.0,101.0,3.0,3"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_read_written_candles() {
        let candles = vec![candle(9), candle(10)];
        let mut out = Vec::new();
        write_candles(&mut out, &candles, Path::new("mem")).unwrap();

        let symbol = Symbol::new("EURUSD").unwrap();
        let back = read_candles(out.as_slice(), &symbol, Timeframe::H1, Path::new("mem")).unwrap();
        assert_eq!(back, candles);
    }

    #[test]
    fn test_read_rejects_bad_header() {
        let data = "start,end\n1,2\n";
        let symbol = Symbol::new("EURUSD").unwrap();
        let err = read_candles(data.as_bytes(), &symbol, Timeframe::H1, Path::new("mem"));
        assert!(matches!(err, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_read_rejects_bad_timestamp() {
        let data = format!("{}\nyesterday,2025-01-06T10:00:00Z,1,1,1,1,1,1\n", HEADER.join(","));
        let symbol = Symbol::new("EURUSD").unwrap();
        let err = read_candles(data.as_bytes(), &symbol, Timeframe::H1, Path::new("mem"));
        assert!(matches!(err, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_read_empty_input() {
        let symbol = Symbol::new("EURUSD").unwrap();
        let back = read_candles(&b""[..], &symbol, Timeframe::H1, Path::new("mem")).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let symbol = Symbol::new("EURUSD").unwrap();
        let back = read_candle_file(Path::new("/nonexistent/h1.csv"), &symbol, Timeframe::H1)
            .unwrap();
        assert!(back.is_empty());
    }
}
