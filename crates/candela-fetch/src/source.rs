//! The fetch capability.

use async_trait::async_trait;
use candela_types::{Symbol, Tick, TimeRange};
use futures::stream::BoxStream;

use crate::FetchError;

/// A lazy, finite stream of ticks.
///
/// An `Err` item ends the usable part of the stream: the ticks before it are
/// valid, but the range was not delivered in full.
pub type TickStream = BoxStream<'static, Result<Tick, FetchError>>;

/// Produces ticks for a symbol over a half-open time range.
///
/// Implementations yield ticks with `range.start <= timestamp < range.end`
/// in non-decreasing timestamp order. Calling again with an adjusted range
/// after a failure is always allowed.
#[async_trait]
pub trait TickSource: Send + Sync {
    /// Starts fetching ticks for `symbol` over `range`.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch cannot be started at all. Failures while
    /// streaming are reported as stream items.
    async fn fetch_ticks(&self, symbol: &Symbol, range: TimeRange)
    -> Result<TickStream, FetchError>;
}

#[async_trait]
impl<T: TickSource + ?Sized> TickSource for std::sync::Arc<T> {
    async fn fetch_ticks(
        &self,
        symbol: &Symbol,
        range: TimeRange,
    ) -> Result<TickStream, FetchError> {
        (**self).fetch_ticks(symbol, range).await
    }
}
