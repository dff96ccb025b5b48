//! Periodic cycle scheduling.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::time::MissedTickBehavior;

use crate::{Clock, PipelineConfig, PipelineError, Shard, ShardExecutor, ShardOutcome, SystemClock};

/// What one scheduled cycle did.
#[derive(Debug)]
pub struct CycleSummary {
    /// Shards that ran.
    pub outcomes: Vec<ShardOutcome>,
    /// Shards whose worker could not run.
    pub failed_workers: usize,
    /// Wall time taken.
    pub elapsed: Duration,
}

impl CycleSummary {
    /// Returns true if every shard ran and every symbol succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_workers == 0 && self.outcomes.iter().all(|o| o.complete)
    }
}

/// Re-runs every symbol on a fixed interval.
///
/// Symbols are split into one [`Shard`] per worker and each shard is handed
/// to the executor. A cycle ends when every shard has returned, and the next
/// one never starts before that: a cycle that overruns the interval causes
/// the overdue ticks to be skipped, never queued.
pub struct Scheduler {
    config: Arc<PipelineConfig>,
    executor: Arc<dyn ShardExecutor>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid or the
    /// target directory is unusable. No worker runs in that case.
    pub fn new(
        config: Arc<PipelineConfig>,
        executor: Arc<dyn ShardExecutor>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            executor,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the clock used for cycle end times.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the shards of one cycle.
    #[must_use]
    pub fn shards(&self) -> Vec<Shard> {
        Shard::all(self.config.effective_workers()).collect()
    }

    /// Runs one cycle over every shard concurrently.
    pub async fn run_cycle(&self) -> CycleSummary {
        let started = Instant::now();
        let now = self.clock.now();
        let shards = self.shards();
        tracing::info!(%now, shards = shards.len(), "cycle started");

        let results = join_all(shards.iter().map(|&shard| self.executor.execute(shard, now))).await;

        let mut outcomes = Vec::with_capacity(results.len());
        let mut failed_workers = 0;
        for result in results {
            match result {
                Ok(outcome) => {
                    if !outcome.complete {
                        tracing::warn!(shard = %outcome.shard, "shard finished with failures");
                    }
                    outcomes.push(outcome);
                }
                Err(error) => {
                    failed_workers += 1;
                    tracing::error!(%error, "worker failed");
                }
            }
        }

        let summary = CycleSummary {
            outcomes,
            failed_workers,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            elapsed_ms = summary.elapsed.as_millis(),
            complete = summary.is_complete(),
            "cycle finished"
        );
        summary
    }

    /// Runs cycles until `shutdown` completes.
    ///
    /// A cycle in progress when `shutdown` completes is dropped; its workers
    /// are stopped and their uncommitted work is redone next time.
    pub async fn run<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        let period = self.config.update_interval();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut cycles = 0;
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = interval.tick() => {}
            }

            let started = tokio::time::Instant::now();
            tokio::select! {
                () = &mut shutdown => break,
                _ = self.run_cycle() => {}
            }
            cycles += 1;

            let elapsed = started.elapsed();
            if elapsed > period {
                tracing::warn!(
                    elapsed_secs = elapsed.as_secs(),
                    interval_secs = period.as_secs(),
                    "cycle overran the update interval, skipping overdue cycles"
                );
            }
        }

        tracing::info!(cycles, "scheduler stopped");
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use async_trait::async_trait;
    use candela_types::{Symbol, Timeframe};
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        busy: Duration,
        running: AtomicUsize,
        max_running: AtomicUsize,
        calls: Mutex<Vec<(Shard, DateTime<Utc>)>>,
        failing: Option<usize>,
    }

    #[async_trait]
    impl ShardExecutor for Recorder {
        async fn execute(
            &self,
            shard: Shard,
            now: DateTime<Utc>,
        ) -> Result<ShardOutcome, PipelineError> {
            self.calls.lock().unwrap().push((shard, now));
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(self.busy).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            if self.failing == Some(shard.index) {
                return Err(PipelineError::Executor {
                    worker: shard.to_string(),
                    reason: "boom".to_string(),
                });
            }
            Ok(ShardOutcome {
                shard,
                complete: true,
                reports: Vec::new(),
            })
        }
    }

    fn config(dir: &TempDir, symbols: &[&str], workers: usize) -> Arc<PipelineConfig> {
        let mut config = PipelineConfig::new(
            symbols.iter().map(|s| Symbol::new(s).unwrap()).collect(),
            vec![Timeframe::M1],
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            dir.path(),
        );
        config.workers = workers;
        Arc::new(config)
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, &[], 2);
        let err = Scheduler::new(config, Arc::new(Recorder::default())).unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_cycle_covers_every_shard_with_one_now() {
        let dir = TempDir::new().unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 6, 3, 0, 0).unwrap();
        let recorder = Arc::new(Recorder {
            failing: Some(1),
            ..Recorder::default()
        });
        let scheduler = Scheduler::new(
            config(&dir, &["EURUSD", "GBPUSD", "USDJPY"], 8),
            recorder.clone(),
        )
        .unwrap()
        .with_clock(Arc::new(ManualClock::new(now)));

        assert_eq!(scheduler.shards().len(), 3);
        let summary = scheduler.run_cycle().await;

        assert_eq!(summary.outcomes.len(), 2);
        assert_eq!(summary.failed_workers, 1);
        assert!(!summary.is_complete());

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|(_, t)| *t == now));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_fires_on_interval() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let scheduler =
            Scheduler::new(config(&dir, &["EURUSD"], 1), recorder.clone()).unwrap();

        let cycles = scheduler
            .run(tokio::time::sleep(Duration::from_secs(150)))
            .await;

        // Ticks at 0s, 60s and 120s.
        assert_eq!(cycles, 3);
        assert_eq!(recorder.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_never_overlaps() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder {
            busy: Duration::from_secs(90),
            ..Recorder::default()
        });
        let scheduler =
            Scheduler::new(config(&dir, &["EURUSD", "GBPUSD"], 1), recorder.clone()).unwrap();

        scheduler
            .run(tokio::time::sleep(Duration::from_secs(250)))
            .await;

        assert_eq!(recorder.max_running.load(Ordering::SeqCst), 1);
        let calls = recorder.calls.lock().unwrap().len();
        assert!((2..=3).contains(&calls), "{calls} cycles started");
    }
}
