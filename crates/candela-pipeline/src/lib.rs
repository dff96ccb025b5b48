#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candela/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod clock;
mod config;
mod error;
mod executor;
mod scheduler;
mod shard;
mod spawn;
mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError};
pub use executor::{ShardExecutor, ShardOutcome, TaskExecutor};
pub use scheduler::{CycleSummary, Scheduler};
pub use shard::{Shard, run_shard};
pub use spawn::{CYCLE_END_ENV, EXIT_PARTIAL, ProcessExecutor, WORKER_RUN_ARG, worker_exit_code};
pub use worker::{Committed, CycleReport, SymbolWorker, WorkerState};
