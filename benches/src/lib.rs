//! Benchmark fixtures for candela.

use candela_lib::{Symbol, SymbolError, Tick};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

/// Start of every synthetic tick series: Monday 2025-01-06 00:00 UTC.
pub fn series_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Returns the symbol used by the benchmarks.
///
/// # Errors
///
/// Never fails for the built-in name.
pub fn bench_symbol() -> Result<Symbol, SymbolError> {
    Symbol::new("EURUSD")
}

/// Generates `count` ordered ticks, `step_ms` apart, following a bounded
/// random walk around 1.1.
pub fn synthetic_ticks(count: usize, step_ms: i64) -> Vec<Tick> {
    let start = series_start();
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut price = 1.1_f64;

    (0..count)
        .map(|i| {
            // xorshift64
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let step = ((state % 21) as f64 - 10.0) * 0.000_01;
            price = (price + step).clamp(1.0, 1.2);

            let offset = TimeDelta::milliseconds(step_ms.saturating_mul(i as i64));
            Tick::new(start + offset, price, 1.0 + (state % 5) as f64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_ticks_are_ordered() {
        let ticks = synthetic_ticks(1_000, 250);
        assert_eq!(ticks.len(), 1_000);
        assert!(ticks.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(ticks.iter().all(|t| (1.0..=1.2).contains(&t.price)));
    }
}
