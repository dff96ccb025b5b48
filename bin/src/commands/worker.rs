//! Hidden worker entry point.
//!
//! `run` and `once` spawn `candela --worker-run k/N` once per shard. The
//! worker runs one cycle for its symbols and reports through its exit code.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use candela_lib::{
    CYCLE_END_ENV, DukascopySource, Shard, TickSource, run_shard, worker_exit_code,
};
use chrono::{DateTime, Utc};

use crate::settings::Settings;

/// Runs one cycle for the symbols of `shard`.
pub(crate) async fn worker_run(settings: &Settings, shard: Shard) -> Result<ExitCode> {
    let config = settings.load()?;
    let now = match std::env::var(CYCLE_END_ENV) {
        Ok(raw) => DateTime::parse_from_rfc3339(&raw)
            .with_context(|| format!("Invalid {CYCLE_END_ENV}: {raw}"))?
            .to_utc(),
        Err(_) => Utc::now(),
    };

    let source: Arc<dyn TickSource> =
        Arc::new(DukascopySource::new(config.source.clone()).context("Failed to create tick source")?);
    let reports = run_shard(&config, source, shard, now).await;

    let code = worker_exit_code(&reports);
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}
