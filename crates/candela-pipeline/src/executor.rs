//! Where a shard's cycle runs.

use std::sync::Arc;

use async_trait::async_trait;
use candela_fetch::TickSource;
use chrono::{DateTime, Utc};

use crate::{CycleReport, PipelineConfig, PipelineError, Shard, run_shard};

/// Result of one shard's cycle.
#[derive(Debug)]
pub struct ShardOutcome {
    /// The shard.
    pub shard: Shard,
    /// True if every owned symbol completed without a contained failure.
    pub complete: bool,
    /// Per-symbol reports, when the shard ran in this process.
    pub reports: Vec<CycleReport>,
}

/// Runs one shard's cycle to completion.
///
/// Implementations must not return before the shard's workers are done, so
/// the scheduler can guarantee a symbol is never processed by two cycles at
/// once.
#[async_trait]
pub trait ShardExecutor: Send + Sync {
    /// Runs every symbol of `shard` for the cycle ending at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Executor`] if the worker could not run at all.
    async fn execute(&self, shard: Shard, now: DateTime<Utc>)
    -> Result<ShardOutcome, PipelineError>;
}

/// Runs shards as tokio tasks in the current process.
///
/// Isolation is per task instead of per process; a panicking worker is
/// reported as an executor failure.
#[derive(Clone)]
pub struct TaskExecutor {
    config: Arc<PipelineConfig>,
    source: Arc<dyn TickSource>,
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TaskExecutor {
    /// Creates an executor fetching from `source`.
    #[must_use]
    pub fn new(config: Arc<PipelineConfig>, source: Arc<dyn TickSource>) -> Self {
        Self { config, source }
    }
}

#[async_trait]
impl ShardExecutor for TaskExecutor {
    async fn execute(
        &self,
        shard: Shard,
        now: DateTime<Utc>,
    ) -> Result<ShardOutcome, PipelineError> {
        let config = Arc::clone(&self.config);
        let source = Arc::clone(&self.source);

        let reports = tokio::spawn(async move { run_shard(&config, source, shard, now).await })
            .await
            .map_err(|e| PipelineError::Executor {
                worker: shard.to_string(),
                reason: e.to_string(),
            })?;

        Ok(ShardOutcome {
            shard,
            complete: reports.iter().all(CycleReport::is_success),
            reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candela_fetch::MemorySource;
    use candela_types::{Symbol, Tick, Timeframe};
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_task_executor_reports_per_symbol() {
        let dir = TempDir::new().unwrap();
        let start = Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0).unwrap();
        let eurusd = Symbol::new("EURUSD").unwrap();
        let gbpusd = Symbol::new("GBPUSD").unwrap();
        let mut config = PipelineConfig::new(
            vec![eurusd.clone(), gbpusd.clone()],
            vec![Timeframe::H1],
            start,
            dir.path(),
        );
        config.settle_delay = 0;

        let source = Arc::new(MemorySource::new());
        source.push_ticks(
            &eurusd,
            [
                Tick::new(start, 1.1, 1.0),
                Tick::new(start + chrono::TimeDelta::minutes(90), 1.2, 1.0),
            ],
        );
        source.set_failing(&gbpusd, true);

        let executor = TaskExecutor::new(Arc::new(config), source);
        let outcome = executor
            .execute(Shard::new(0, 1).unwrap(), start + chrono::TimeDelta::hours(2))
            .await
            .unwrap();

        assert!(!outcome.complete);
        assert_eq!(outcome.reports.len(), 2);
        assert!(outcome.reports[0].is_success());
        assert_eq!(outcome.reports[0].candles(), 2);
        assert!(!outcome.reports[1].is_success());
    }
}
