//! Pipeline configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use candela_aggregate::MarketCalendar;
use candela_fetch::{DEFAULT_PUBLICATION_LAG_SECS, DukascopyConfig};
use candela_store::StoreLayout;
use candela_types::{Symbol, Timeframe};
use chrono::{DateTime, TimeDelta, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::PipelineError;

const MAX_SETTLE_DELAY_SECS: i64 = 366 * 86_400;

const fn default_update_interval() -> u64 {
    60
}

const fn default_workers() -> usize {
    4
}

const fn default_settle_delay() -> u64 {
    DEFAULT_PUBLICATION_LAG_SECS
}

/// Immutable pipeline configuration, shared by the scheduler and every
/// worker.
///
/// ```yaml
/// symbols: [EURUSD, USDJPY]
/// timeframes: [m1, h1, d1]
/// update_interval: 60
/// history_start: 2025-01-01T00:00:00Z
/// target_dir: /var/lib/candela
/// workers: 2
/// calendar:
///   utc_offset_minutes: 0
///   daily_rollover: "00:00:00"
///   week_start: Mon
/// source:
///   concurrency: 8
///   decimal_factors: { USDJPY: 1000 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Instruments to maintain.
    pub symbols: Vec<Symbol>,
    /// Candle timeframes maintained for every symbol.
    pub timeframes: Vec<Timeframe>,
    /// Seconds between cycle starts.
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
    /// Where the backfill starts for series without a checkpoint.
    pub history_start: DateTime<Utc>,
    /// Target directory holding candle files and checkpoints.
    pub target_dir: PathBuf,
    /// Number of worker processes.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Period alignment policy for daily and longer candles.
    #[serde(default)]
    pub calendar: MarketCalendar,
    /// Seconds the provider may lag behind real time; a period only closes
    /// once it ended at least this long ago. Never shorter than the source's
    /// publication lag.
    #[serde(default = "default_settle_delay")]
    pub settle_delay: u64,
    /// Tick provider settings.
    #[serde(default)]
    pub source: DukascopyConfig,
}

impl PipelineConfig {
    /// Creates a configuration with default intervals, calendar and source.
    #[must_use]
    pub fn new(
        symbols: Vec<Symbol>,
        timeframes: Vec<Timeframe>,
        history_start: DateTime<Utc>,
        target_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            symbols,
            timeframes,
            update_interval: default_update_interval(),
            history_start,
            target_dir: target_dir.into(),
            workers: default_workers(),
            calendar: MarketCalendar::default(),
            settle_delay: default_settle_delay(),
            source: DukascopyConfig::default(),
        }
    }

    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the document does not describe a
    /// configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self, PipelineError> {
        serde_yaml::from_str(yaml).map_err(|e| PipelineError::config(e.to_string()))
    }

    /// Loads a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&yaml)
            .map_err(|e| PipelineError::config(format!("{}: {e}", path.display())))
    }

    /// Returns the default configuration file location:
    ///
    /// - Linux: `~/.config/candela/config.yaml`
    /// - macOS: `~/Library/Application Support/candela/config.yaml`
    /// - Windows: `C:\Users\<User>\AppData\Roaming\candela\config\config.yaml`
    ///
    /// Falls back to `./candela.yaml` if no home directory is known.
    #[must_use]
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("", "", "candela").map_or_else(
            || PathBuf::from("candela.yaml"),
            |dirs| dirs.config_dir().join("config.yaml"),
        )
    }

    /// Checks the configuration and prepares the target directory.
    ///
    /// Failing here is the only way the pipeline stops before scheduling
    /// workers.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.symbols.is_empty() {
            return Err(PipelineError::config("no symbols configured"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.symbols.iter().find(|s| !seen.insert(*s)) {
            return Err(PipelineError::config(format!("symbol {dup} listed twice")));
        }

        if self.timeframes.is_empty() {
            return Err(PipelineError::config("no timeframes configured"));
        }
        let mut seen = HashSet::new();
        for timeframe in &self.timeframes {
            timeframe
                .validate()
                .map_err(|e| PipelineError::config(e.to_string()))?;
            if !seen.insert(timeframe) {
                return Err(PipelineError::config(format!(
                    "timeframe {timeframe} listed twice"
                )));
            }
        }

        if self.workers == 0 {
            return Err(PipelineError::config("workers must be at least 1"));
        }
        if self.update_interval == 0 {
            return Err(PipelineError::config("update_interval must be at least 1 second"));
        }
        if self.source.client.concurrency == 0 {
            return Err(PipelineError::config("source concurrency must be at least 1"));
        }
        if self.settle_delay < self.source.publication_lag_secs {
            return Err(PipelineError::config(format!(
                "settle_delay ({}s) is shorter than the source publication lag ({}s)",
                self.settle_delay, self.source.publication_lag_secs
            )));
        }

        self.layout().ensure_writable().map_err(|e| {
            PipelineError::config(format!(
                "target directory {} is not writable: {e}",
                self.target_dir.display()
            ))
        })
    }

    /// Returns the target directory layout.
    #[must_use]
    pub fn layout(&self) -> StoreLayout {
        StoreLayout::new(&self.target_dir)
    }

    /// Returns the time between cycle starts.
    #[must_use]
    pub const fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval)
    }

    /// Returns the provider settle delay, capped at one year.
    #[must_use]
    pub fn settle_delay(&self) -> TimeDelta {
        let secs = i64::try_from(self.settle_delay).unwrap_or(i64::MAX);
        TimeDelta::seconds(secs.min(MAX_SETTLE_DELAY_SECS))
    }

    /// Returns the number of worker processes actually needed.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(1, self.symbols.len().max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone, Weekday};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> PipelineConfig {
        PipelineConfig::new(
            vec![Symbol::new("EURUSD").unwrap(), Symbol::new("GBPUSD").unwrap()],
            vec![Timeframe::M5, Timeframe::H1],
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            dir.path().join("target"),
        )
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
symbols: [eurusd, USDJPY]
timeframes: [m1, h4, d1, w1, mn1]
update_interval: 30
history_start: 2025-01-01T00:00:00Z
target_dir: /tmp/candela
workers: 2
calendar:
  utc_offset_minutes: -300
  daily_rollover: '17:00:00'
  week_start: Sun
settle_delay: 7200
source:
  concurrency: 2
  publication_lag_secs: 1800
  decimal_factors:
    USDJPY: 1000
";
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.symbols[0].as_str(), "EURUSD");
        assert_eq!(config.timeframes.len(), 5);
        assert_eq!(config.timeframes[4], Timeframe::MN1);
        assert_eq!(config.update_interval(), Duration::from_secs(30));
        assert_eq!(config.calendar.week_start, Weekday::Sun);
        assert_eq!(
            config.calendar.daily_rollover,
            NaiveTime::from_hms_opt(17, 0, 0).unwrap()
        );
        assert_eq!(config.settle_delay(), TimeDelta::hours(2));
        assert_eq!(config.source.publication_lag(), TimeDelta::minutes(30));
        assert_eq!(config.source.client.concurrency, 2);
    }

    #[test]
    fn test_yaml_defaults() {
        let yaml = r"
symbols: [EURUSD]
timeframes: [h1]
history_start: 2025-01-01T00:00:00Z
target_dir: data
";
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.update_interval, 60);
        assert_eq!(config.workers, 4);
        assert_eq!(config.calendar, MarketCalendar::utc());
        assert_eq!(config.settle_delay, 3_600);
        assert_eq!(config.settle_delay, config.source.publication_lag_secs);
    }

    #[test]
    fn test_yaml_rejects_bad_timeframe_and_unknown_keys() {
        let bad_timeframe = r"
symbols: [EURUSD]
timeframes: [tick]
history_start: 2025-01-01T00:00:00Z
target_dir: data
";
        assert!(PipelineConfig::from_yaml(bad_timeframe).is_err());

        let unknown = r"
symbols: [EURUSD]
timeframes: [h1]
history_start: 2025-01-01T00:00:00Z
target_dir: data
wokers: 3
";
        assert!(PipelineConfig::from_yaml(unknown).is_err());
    }

    #[test]
    fn test_validate_accepts_good_config() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        config.validate().unwrap();
        assert!(dir.path().join("target/candles").is_dir());
    }

    #[test]
    fn test_validate_rejects() {
        let dir = TempDir::new().unwrap();

        let mut empty = config(&dir);
        empty.symbols.clear();
        assert!(empty.validate().unwrap_err().is_fatal());

        let mut duplicate = config(&dir);
        duplicate.symbols.push(Symbol::new("eurusd").unwrap());
        assert!(duplicate.validate().is_err());

        let mut no_workers = config(&dir);
        no_workers.workers = 0;
        assert!(no_workers.validate().is_err());

        let mut bad_tf = config(&dir);
        bad_tf.timeframes.push(Timeframe {
            unit: candela_types::TimeUnit::Day,
            count: 2,
        });
        assert!(bad_tf.validate().is_err());

        let mut unsettled = config(&dir);
        unsettled.settle_delay = 600;
        assert!(unsettled.validate().is_err());
        unsettled.source.publication_lag_secs = 600;
        unsettled.validate().unwrap();

        let file = dir.path().join("file");
        std::fs::write(&file, "x").unwrap();
        let mut unwritable = config(&dir);
        unwritable.target_dir = file;
        assert!(unwritable.validate().is_err());
    }

    #[test]
    fn test_effective_workers() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.workers = 8;
        assert_eq!(config.effective_workers(), 2);
        config.workers = 1;
        assert_eq!(config.effective_workers(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let err = PipelineConfig::load(Path::new("/nonexistent/candela.yaml")).unwrap_err();
        assert!(err.is_fatal());
    }
}
