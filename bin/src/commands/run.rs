//! Scheduler commands.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use candela_lib::{
    CycleSummary, DukascopySource, EXIT_PARTIAL, ProcessExecutor, Scheduler, ShardExecutor,
    TaskExecutor,
};

use crate::settings::Settings;

/// Runs cycles on the configured interval until Ctrl-C.
pub(crate) async fn run(settings: &Settings) -> Result<ExitCode> {
    let config = Arc::new(settings.load_validated()?);
    let executor = ProcessExecutor::new(settings.worker_args())?;
    let scheduler = Scheduler::new(Arc::clone(&config), Arc::new(executor))?;

    tracing::info!(
        symbols = config.symbols.len(),
        timeframes = config.timeframes.len(),
        workers = scheduler.shards().len(),
        interval_secs = config.update_interval,
        target = %config.target_dir.display(),
        "scheduler started"
    );

    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;
    Ok(ExitCode::SUCCESS)
}

/// Runs exactly one cycle.
pub(crate) async fn once(settings: &Settings, inline: bool) -> Result<ExitCode> {
    let config = Arc::new(settings.load_validated()?);

    let executor: Arc<dyn ShardExecutor> = if inline {
        let source = DukascopySource::new(config.source.clone())
            .context("Failed to create tick source")?;
        Arc::new(TaskExecutor::new(Arc::clone(&config), Arc::new(source)))
    } else {
        Arc::new(ProcessExecutor::new(settings.worker_args())?)
    };

    let summary = Scheduler::new(config, executor)?.run_cycle().await;
    print_summary(&summary);

    if summary.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(u8::try_from(EXIT_PARTIAL).unwrap_or(1)))
    }
}

fn print_summary(summary: &CycleSummary) {
    for outcome in &summary.outcomes {
        for report in &outcome.reports {
            let status = if report.is_success() { "ok" } else { "FAILED" };
            println!(
                "{:<12} {:<6} ticks={:<9} candles={}",
                report.symbol,
                status,
                report.ticks,
                report.candles()
            );
            for failure in &report.failures {
                println!("    {failure}");
            }
        }
        if outcome.reports.is_empty() {
            let status = if outcome.complete { "ok" } else { "partial" };
            println!("shard {:<6} {status}", outcome.shard);
        }
    }
    if summary.failed_workers > 0 {
        println!("{} worker(s) failed to run", summary.failed_workers);
    }
    println!("cycle took {:.1}s", summary.elapsed.as_secs_f64());
}
