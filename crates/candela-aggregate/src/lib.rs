//! Calendar-aligned OHLC candle aggregation for candela.
//!
//! This crate provides tick-to-candle aggregation:
//!
//! - [`MarketCalendar`] - Period alignment policy (rollover, week start)
//! - [`Period`] - Half-open candle period
//! - [`Candle`] - Closed OHLC candle
//! - [`CandleAggregator`] - Streaming tick aggregator with resumable partial state

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candela/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod aggregator;
mod calendar;
mod candle;
mod error;

pub use aggregator::{CandleAggregator, Candles, FlushReason, PartialCandle};
pub use calendar::{MarketCalendar, Period, align};
pub use candle::Candle;
pub use error::{AggregateError, CalendarError};
