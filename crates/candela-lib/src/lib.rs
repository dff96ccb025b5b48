#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candela/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub use candela_types::*;

pub use candela_aggregate::{
    AggregateError, CalendarError, Candle, CandleAggregator, Candles, FlushReason,
    MarketCalendar, PartialCandle, Period, align,
};

#[cfg(feature = "fetch")]
pub use candela_fetch::{
    ClientConfig, DownloadClient, DukascopyConfig, DukascopySource, FetchError, MemorySource,
    TickSource, TickStream,
};

#[cfg(feature = "store")]
pub use candela_store::{
    CandleWriter, Checkpoint, CheckpointStore, SeriesKey, StagedFile, StoreError, StoreLayout,
    UpsertSummary, sweep_temp_files,
};

#[cfg(feature = "parquet")]
pub use candela_store::{ExportCompression, ExportOptions, ExportSummary, ParquetExporter};

#[cfg(feature = "pipeline")]
pub use candela_pipeline::{
    CYCLE_END_ENV, Clock, Committed, CycleReport, CycleSummary, EXIT_PARTIAL, ErrorKind,
    ManualClock, PipelineConfig, PipelineError, ProcessExecutor, Scheduler, Shard,
    ShardExecutor, ShardOutcome, SymbolWorker, SystemClock, TaskExecutor, WORKER_RUN_ARG,
    WorkerState, run_shard, worker_exit_code,
};

/// Prelude module for convenient imports.
///
/// ```
/// use candela_lib::prelude::*;
/// ```
pub mod prelude {
    pub use candela_types::{Symbol, Tick, TimeRange, TimeUnit, Timeframe};

    pub use candela_aggregate::{Candle, CandleAggregator, FlushReason, MarketCalendar};

    #[cfg(feature = "fetch")]
    pub use candela_fetch::{DukascopySource, MemorySource, TickSource};

    #[cfg(feature = "store")]
    pub use candela_store::{CandleWriter, CheckpointStore, StoreLayout};

    #[cfg(feature = "parquet")]
    pub use candela_store::{ExportOptions, ParquetExporter};

    #[cfg(feature = "pipeline")]
    pub use candela_pipeline::{
        PipelineConfig, PipelineError, ProcessExecutor, Scheduler, SymbolWorker, TaskExecutor,
    };
}
