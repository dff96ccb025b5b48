//! Filesystem persistence for the candela pipeline.
//!
//! This crate provides the durable state of the pipeline:
//!
//! - [`StoreLayout`] - Where candle files and checkpoints live
//! - [`CandleWriter`] - Atomic, idempotent candle upserts
//! - [`CheckpointStore`] - Per-series extraction cursors
//! - [`ParquetExporter`] - Partitioned Parquet export of committed candles

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candela/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod atomic;
mod checkpoint;
pub mod codec;
mod error;
mod layout;
mod writer;

#[cfg(feature = "parquet")]
mod export;

pub use atomic::{StagedFile, sweep_temp_files};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use error::StoreError;
pub use layout::{SeriesKey, StoreLayout};
pub use writer::{CandleWriter, UpsertSummary};

#[cfg(feature = "parquet")]
pub use export::{ExportCompression, ExportOptions, ExportSummary, ParquetExporter};
