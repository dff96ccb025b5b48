//! Checkpoint reset command.

use std::process::ExitCode;

use anyhow::{Context, Result};
use candela_lib::{CandleWriter, CheckpointStore, Symbol, Timeframe};

use crate::settings::Settings;

/// Removes the checkpoint of one or every configured timeframe of `symbol`.
///
/// The next cycle rebuilds the series from `history_start`.
pub(crate) fn reset(
    settings: &Settings,
    symbol: &Symbol,
    timeframe: Option<Timeframe>,
    candles: bool,
) -> Result<ExitCode> {
    let config = settings.load()?;
    let layout = config.layout();
    let checkpoints = CheckpointStore::new(layout.clone());
    let writer = CandleWriter::new(layout);

    let timeframes = timeframe.map_or_else(|| config.timeframes.clone(), |tf| vec![tf]);
    for tf in timeframes {
        let removed = checkpoints
            .reset(symbol, tf)
            .with_context(|| format!("Failed to reset checkpoint for {symbol} {tf}"))?;
        println!(
            "{symbol} {tf}: checkpoint {}",
            if removed { "removed" } else { "not found" }
        );

        if candles {
            let removed = writer
                .remove(symbol, tf)
                .with_context(|| format!("Failed to remove candles for {symbol} {tf}"))?;
            if removed {
                println!("{symbol} {tf}: candle file removed");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
