//! Dukascopy hourly tick files.
//!
//! Each hour of ticks is published as an LZMA-compressed `bi5` file of
//! fixed 20-byte big-endian records:
//!
//! | bytes | type  | field                           |
//! |-------|-------|---------------------------------|
//! | 0-3   | `u32` | milliseconds since hour start   |
//! | 4-7   | `u32` | ask price, scaled               |
//! | 8-11  | `u32` | bid price, scaled               |
//! | 12-15 | `f32` | ask volume                      |
//! | 16-19 | `f32` | bid volume                      |

use byteorder::{BigEndian, ByteOrder};
use candela_types::Tick;
use chrono::{DateTime, Datelike, TimeDelta, Timelike, Utc};
use std::io::{BufReader, Cursor};

/// Base URL of the Dukascopy datafeed.
pub const BASE_URL: &str = "https://datafeed.dukascopy.com/datafeed";

/// Size of one tick record in bytes.
pub const RECORD_SIZE: usize = 20;

/// Builds the URL of one hour of ticks.
///
/// Months are zero-based in the datafeed layout.
///
/// ```
/// use candela_fetch::bi5::tick_url;
/// use chrono::{TimeZone, Utc};
///
/// let hour = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
/// assert_eq!(
///     tick_url("https://datafeed.dukascopy.com/datafeed", "EURUSD", hour),
///     "https://datafeed.dukascopy.com/datafeed/EURUSD/2024/00/15/12h_ticks.bi5"
/// );
/// ```
#[must_use]
pub fn tick_url(base_url: &str, instrument: &str, hour: DateTime<Utc>) -> String {
    format!(
        "{}/{}/{}/{:02}/{:02}/{:02}h_ticks.bi5",
        base_url.trim_end_matches('/'),
        instrument.to_uppercase(),
        hour.year(),
        hour.month0(),
        hour.day(),
        hour.hour()
    )
}

/// Decompresses a `bi5` file. An empty body decodes to no records.
///
/// # Errors
///
/// Returns a description of the LZMA failure.
pub fn decompress(compressed: &[u8]) -> Result<Vec<u8>, String> {
    if compressed.is_empty() {
        return Ok(Vec::new());
    }
    let mut decompressed = Vec::new();
    let mut reader = BufReader::new(Cursor::new(compressed));
    lzma_rs::lzma_decompress(&mut reader, &mut decompressed).map_err(|e| e.to_string())?;
    Ok(decompressed)
}

/// Decodes decompressed records into ticks.
///
/// Prices are divided by `decimal_factor`; the tick price is the bid/ask
/// mid and the volume is ask plus bid volume.
///
/// # Errors
///
/// Returns a description of the problem if the data is not a whole number
/// of records.
pub fn decode(data: &[u8], hour: DateTime<Utc>, decimal_factor: f64) -> Result<Vec<Tick>, String> {
    if data.len() % RECORD_SIZE != 0 {
        return Err(format!(
            "{} bytes is not a multiple of the {RECORD_SIZE}-byte record size",
            data.len()
        ));
    }

    Ok(data
        .chunks_exact(RECORD_SIZE)
        .map(|record| {
            let offset = BigEndian::read_u32(&record[0..4]);
            let ask = f64::from(BigEndian::read_u32(&record[4..8])) / decimal_factor;
            let bid = f64::from(BigEndian::read_u32(&record[8..12])) / decimal_factor;
            let ask_volume = f64::from(BigEndian::read_f32(&record[12..16]));
            let bid_volume = f64::from(BigEndian::read_f32(&record[16..20]));
            let timestamp = hour + TimeDelta::milliseconds(i64::from(offset));
            Tick::from_quote(timestamp, ask, bid, ask_volume, bid_volume)
        })
        .collect())
}
