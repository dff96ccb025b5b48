//! Static symbol-to-worker assignment.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use candela_fetch::TickSource;
use candela_types::Symbol;
use chrono::{DateTime, Utc};

use crate::{CycleReport, PipelineConfig, PipelineError, SymbolWorker};

/// One slice of the configured symbol list.
///
/// Symbol `i` (in configuration order) belongs to shard `i % count`. Every
/// symbol has exactly one owner, so no two workers ever write the same
/// series. Written as `index/count`, e.g. `0/4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Shard {
    /// Zero-based shard number.
    pub index: usize,
    /// Total number of shards.
    pub count: usize,
}

impl Shard {
    /// Creates a shard.
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless `index < count`.
    pub fn new(index: usize, count: usize) -> Result<Self, PipelineError> {
        if index >= count {
            return Err(PipelineError::config(format!(
                "shard {index}/{count} is out of range"
            )));
        }
        Ok(Self { index, count })
    }

    /// Returns every shard of a `count`-way split.
    pub fn all(count: usize) -> impl Iterator<Item = Self> {
        (0..count).map(move |index| Self { index, count })
    }

    /// Returns the symbols owned by this shard.
    #[must_use]
    pub fn symbols<'a>(&self, symbols: &'a [Symbol]) -> Vec<&'a Symbol> {
        symbols
            .iter()
            .enumerate()
            .filter(|(i, _)| i % self.count == self.index)
            .map(|(_, s)| s)
            .collect()
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.count)
    }
}

impl FromStr for Shard {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PipelineError::config(format!("invalid shard '{s}', expected k/N"));
        let (index, count) = s.split_once('/').ok_or_else(invalid)?;
        let index = index.trim().parse().map_err(|_| invalid())?;
        let count = count.trim().parse().map_err(|_| invalid())?;
        Self::new(index, count)
    }
}

/// Runs one cycle for every symbol of `shard`, one symbol at a time.
///
/// This is the body of a worker, whether it runs as a task or as a child
/// process.
pub async fn run_shard(
    config: &PipelineConfig,
    source: Arc<dyn TickSource>,
    shard: Shard,
    now: DateTime<Utc>,
) -> Vec<CycleReport> {
    let symbols = shard.symbols(&config.symbols);
    tracing::debug!(%shard, symbols = symbols.len(), %now, "shard cycle");

    let mut reports = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let mut worker = SymbolWorker::new(config, symbol.clone(), Arc::clone(&source));
        reports.push(worker.run_cycle(now).await);
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(|n| Symbol::new(n).unwrap()).collect()
    }

    #[test]
    fn test_parse_and_display() {
        let shard: Shard = "1/4".parse().unwrap();
        assert_eq!(shard, Shard { index: 1, count: 4 });
        assert_eq!(shard.to_string(), "1/4");

        assert!("4/4".parse::<Shard>().is_err());
        assert!("1".parse::<Shard>().is_err());
        assert!("a/b".parse::<Shard>().is_err());
        assert!("0/0".parse::<Shard>().is_err());
    }

    #[test]
    fn test_every_symbol_has_one_owner() {
        let all = symbols(&["EURUSD", "GBPUSD", "USDJPY", "AUDUSD", "USDCHF"]);
        let mut owned: Vec<&Symbol> = Shard::all(3).flat_map(|s| s.symbols(&all)).collect();
        owned.sort();
        let mut expected: Vec<&Symbol> = all.iter().collect();
        expected.sort();
        assert_eq!(owned, expected);

        let first = Shard::new(0, 3).unwrap();
        assert_eq!(first.symbols(&all), vec![&all[0], &all[3]]);
    }

    #[test]
    fn test_single_shard_owns_everything() {
        let all = symbols(&["EURUSD", "GBPUSD"]);
        assert_eq!(Shard::new(0, 1).unwrap().symbols(&all).len(), 2);
    }
}
