//! Tick sources for the candela pipeline.
//!
//! This crate provides the fetch capability consumed by the symbol workers:
//!
//! - [`TickSource`] - Produces an ordered tick stream for a symbol and range
//! - [`MemorySource`] - In-memory source that records requested ranges
//! - [`DukascopySource`] - Dukascopy datafeed client
//! - [`bi5`] - Dukascopy hourly file codec and URL layout

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candela/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bi5;
mod client;
mod dukascopy;
mod error;
mod memory;
mod source;

pub use client::{ClientConfig, DownloadClient};
pub use dukascopy::{DEFAULT_PUBLICATION_LAG_SECS, DukascopyConfig, DukascopySource};
pub use error::FetchError;
pub use memory::MemorySource;
pub use source::{TickSource, TickStream};
