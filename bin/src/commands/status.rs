//! Series status command.

use std::collections::BTreeSet;
use std::process::ExitCode;

use anyhow::{Context, Result};
use candela_lib::{CandleWriter, CheckpointStore, Symbol};

use crate::settings::Settings;

/// Lists every configured or stored series with its checkpoint and size.
pub(crate) fn status(settings: &Settings, only: Option<&Symbol>) -> Result<ExitCode> {
    let config = settings.load()?;
    let layout = config.layout();
    let checkpoints = CheckpointStore::new(layout.clone());
    let writer = CandleWriter::new(layout.clone());

    let mut series: BTreeSet<_> = layout
        .series()
        .with_context(|| format!("Failed to scan {}", layout.root().display()))?
        .into_iter()
        .collect();
    for symbol in &config.symbols {
        for tf in &config.timeframes {
            series.insert((symbol.clone(), *tf));
        }
    }

    println!("Target: {}", layout.root().display());
    println!(
        "{:<12} {:<6} {:<22} {:>10}",
        "SYMBOL", "TF", "CHECKPOINT", "CANDLES"
    );

    for (symbol, tf) in series.iter().filter(|(s, _)| only.is_none_or(|o| o == s)) {
        let checkpoint = match checkpoints.load(symbol, *tf) {
            Ok(Some(c)) => c.last_committed_period_end.format("%Y-%m-%d %H:%M:%S").to_string(),
            Ok(None) => "-".to_string(),
            Err(e) => format!("error: {e}"),
        };
        let candles = match writer.read(symbol, *tf) {
            Ok(candles) => candles.len().to_string(),
            Err(_) => "corrupt".to_string(),
        };
        let configured = config.symbols.contains(symbol) && config.timeframes.contains(tf);
        println!(
            "{:<12} {:<6} {:<22} {:>10}{}",
            symbol.as_str(),
            tf.to_string(),
            checkpoint,
            candles,
            if configured { "" } else { "  (not configured)" }
        );
    }
    Ok(ExitCode::SUCCESS)
}
