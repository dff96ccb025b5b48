//! Core types for the candela tick-to-candle pipeline.
//!
//! This crate provides the fundamental data structures used throughout candela:
//!
//! - [`Tick`] - A single trade/quote observation with price and volume
//! - [`Symbol`] - A validated, filesystem-safe instrument identifier
//! - [`Timeframe`] - Candle timeframe (unit and multiple)
//! - [`TimeRange`] - Half-open time interval used for gap fetches

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candela/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod range;
mod symbol;
mod tick;
mod timeframe;

pub use error::{InvalidTimeframe, SymbolError, TimeRangeError};
pub use range::{HourIterator, TimeRange};
pub use symbol::Symbol;
pub use tick::Tick;
pub use timeframe::{TimeUnit, Timeframe};
