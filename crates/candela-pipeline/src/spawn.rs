//! Worker process spawning.
//!
//! Each shard runs in its own child process: the current executable invoked
//! again with [`WORKER_RUN_ARG`] and the shard. The filesystem is the only
//! state shared with the parent.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::process::Command;

use crate::{CycleReport, PipelineError, Shard, ShardExecutor, ShardOutcome};

/// Command line argument selecting worker mode, followed by `k/N`.
pub const WORKER_RUN_ARG: &str = "--worker-run";

/// Environment variable carrying the cycle end time to a worker process.
pub const CYCLE_END_ENV: &str = "CANDELA_CYCLE_END";

/// Worker exit code when at least one symbol failed and will be retried.
pub const EXIT_PARTIAL: i32 = 3;

/// Returns the exit code a worker process should report for `reports`.
#[must_use]
pub fn worker_exit_code(reports: &[CycleReport]) -> i32 {
    if reports.iter().all(CycleReport::is_success) {
        0
    } else {
        EXIT_PARTIAL
    }
}

/// Runs shards as child processes.
///
/// Children are killed if the parent drops their cycle, e.g. on shutdown;
/// an interrupted worker is indistinguishable from a crashed one and is
/// recovered the same way.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    executable: PathBuf,
    args: Vec<OsString>,
}

impl ProcessExecutor {
    /// Creates an executor re-running the current executable with `args`
    /// in front of the worker arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the current executable path cannot be determined.
    pub fn new(args: Vec<OsString>) -> Result<Self, PipelineError> {
        let executable = std::env::current_exe().map_err(|e| PipelineError::Executor {
            worker: "spawner".to_string(),
            reason: format!("cannot determine current executable: {e}"),
        })?;
        Ok(Self::with_executable(executable, args))
    }

    /// Creates an executor running a specific executable.
    #[must_use]
    pub const fn with_executable(executable: PathBuf, args: Vec<OsString>) -> Self {
        Self { executable, args }
    }

    /// Returns the executable path.
    #[must_use]
    pub const fn executable(&self) -> &PathBuf {
        &self.executable
    }

    fn command(&self, shard: Shard, now: DateTime<Utc>) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .args(&self.args)
            .arg(WORKER_RUN_ARG)
            .arg(shard.to_string())
            .env(CYCLE_END_ENV, now.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl ShardExecutor for ProcessExecutor {
    async fn execute(
        &self,
        shard: Shard,
        now: DateTime<Utc>,
    ) -> Result<ShardOutcome, PipelineError> {
        let failed = |reason: String| PipelineError::Executor {
            worker: shard.to_string(),
            reason,
        };

        let mut child = self
            .command(shard, now)
            .spawn()
            .map_err(|e| failed(format!("cannot spawn {}: {e}", self.executable.display())))?;
        tracing::debug!(%shard, pid = child.id(), "worker process started");

        let status = child
            .wait()
            .await
            .map_err(|e| failed(format!("cannot wait for worker: {e}")))?;

        let complete = match status.code() {
            Some(0) => true,
            Some(EXIT_PARTIAL) => false,
            _ => return Err(failed(format!("worker exited with {status}"))),
        };
        Ok(ShardOutcome {
            shard,
            complete,
            reports: Vec::new(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 3, 0, 0).unwrap()
    }

    fn shell(script: &str) -> ProcessExecutor {
        ProcessExecutor::with_executable(
            PathBuf::from("/bin/sh"),
            vec!["-c".into(), script.into()],
        )
    }

    #[test]
    fn test_exit_code() {
        assert_eq!(worker_exit_code(&[]), 0);
    }

    #[tokio::test]
    async fn test_successful_worker() {
        let outcome = shell("exit 0")
            .execute(Shard::new(1, 2).unwrap(), now())
            .await
            .unwrap();
        assert!(outcome.complete);
        assert_eq!(outcome.shard.to_string(), "1/2");
    }

    #[tokio::test]
    async fn test_partial_worker() {
        let outcome = shell("exit 3")
            .execute(Shard::new(0, 1).unwrap(), now())
            .await
            .unwrap();
        assert!(!outcome.complete);
    }

    #[tokio::test]
    async fn test_crashed_worker() {
        let err = shell("exit 101")
            .execute(Shard::new(0, 1).unwrap(), now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Executor);
    }

    #[tokio::test]
    async fn test_worker_receives_shard_and_cycle_end() {
        // $0 is the worker flag, $1 the shard.
        let script = r#"[ "$0" = "--worker-run" ] && [ "$1" = "2/3" ] && [ "$CANDELA_CYCLE_END" = "2025-01-06T03:00:00Z" ]"#;
        let outcome = shell(script)
            .execute(Shard::new(2, 3).unwrap(), now())
            .await
            .unwrap();
        assert!(outcome.complete);
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let executor = ProcessExecutor::with_executable(
            PathBuf::from("/nonexistent/candela"),
            Vec::new(),
        );
        assert!(executor.execute(Shard::new(0, 1).unwrap(), now()).await.is_err());
    }
}
