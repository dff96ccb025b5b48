//! In-memory tick source.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use candela_types::{Symbol, Tick, TimeRange};
use futures::stream::{self, StreamExt};

use crate::{FetchError, TickSource, TickStream};

#[derive(Debug, Default)]
struct Inner {
    ticks: HashMap<Symbol, Vec<Tick>>,
    failing: HashSet<Symbol>,
    fail_after: HashMap<Symbol, usize>,
    requests: Vec<(Symbol, TimeRange)>,
}

/// A [`TickSource`] serving ticks from memory.
///
/// Ticks are served in insertion order, so tests can inject out-of-order
/// data. Every call is recorded and can be inspected with
/// [`requests`](Self::requests).
#[derive(Debug, Default)]
pub struct MemorySource {
    inner: Mutex<Inner>,
}

impl MemorySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends ticks for a symbol.
    pub fn push_ticks(&self, symbol: &Symbol, ticks: impl IntoIterator<Item = Tick>) {
        self.lock()
            .ticks
            .entry(symbol.clone())
            .or_default()
            .extend(ticks);
    }

    /// Makes every fetch for `symbol` fail (or succeed again).
    pub fn set_failing(&self, symbol: &Symbol, failing: bool) {
        let mut inner = self.lock();
        if failing {
            inner.failing.insert(symbol.clone());
        } else {
            inner.failing.remove(symbol);
        }
    }

    /// Makes fetches for `symbol` fail mid-stream after `count` ticks.
    pub fn fail_after(&self, symbol: &Symbol, count: Option<usize>) {
        let mut inner = self.lock();
        match count {
            Some(count) => inner.fail_after.insert(symbol.clone(), count),
            None => inner.fail_after.remove(symbol),
        };
    }

    /// Returns every range requested so far, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<(Symbol, TimeRange)> {
        self.lock().requests.clone()
    }

    /// Returns the ranges requested for one symbol.
    #[must_use]
    pub fn requests_for(&self, symbol: &Symbol) -> Vec<TimeRange> {
        self.lock()
            .requests
            .iter()
            .filter(|(s, _)| s == symbol)
            .map(|(_, r)| *r)
            .collect()
    }
}

#[async_trait]
impl TickSource for MemorySource {
    async fn fetch_ticks(
        &self,
        symbol: &Symbol,
        range: TimeRange,
    ) -> Result<TickStream, FetchError> {
        let mut inner = self.lock();
        inner.requests.push((symbol.clone(), range));

        if inner.failing.contains(symbol) {
            return Err(FetchError::Unavailable {
                symbol: symbol.clone(),
                reason: "source marked as failing".to_string(),
            });
        }

        let selected: Vec<Result<Tick, FetchError>> = inner
            .ticks
            .get(symbol)
            .map(|ticks| {
                ticks
                    .iter()
                    .filter(|t| range.contains(t.timestamp))
                    .map(|t| Ok(*t))
                    .collect()
            })
            .unwrap_or_default();

        let items = match inner.fail_after.get(symbol) {
            Some(&count) if count < selected.len() => {
                let mut items: Vec<_> = selected.into_iter().take(count).collect();
                items.push(Err(FetchError::Unavailable {
                    symbol: symbol.clone(),
                    reason: format!("stream interrupted after {count} ticks"),
                }));
                items
            }
            _ => selected,
        };

        Ok(stream::iter(items).boxed())
    }
}
