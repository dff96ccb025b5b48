//! Dukascopy datafeed tick source.

use std::collections::BTreeMap;

use async_trait::async_trait;
use candela_types::{Symbol, Tick, TimeRange};
use chrono::{DateTime, TimeDelta, Utc};
use futures::future;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::{ClientConfig, DownloadClient, FetchError, TickSource, TickStream, bi5};

/// Default publication lag of the hourly files.
pub const DEFAULT_PUBLICATION_LAG_SECS: u64 = 3_600;

/// Settings of the Dukascopy tick source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DukascopyConfig {
    /// Datafeed base URL.
    pub base_url: String,
    /// HTTP client settings.
    #[serde(flatten)]
    pub client: ClientConfig,
    /// Price scale used when a symbol has no entry in `decimal_factors`.
    pub default_decimal_factor: f64,
    /// Per-symbol price scale, e.g. `USDJPY: 1000`.
    pub decimal_factors: BTreeMap<Symbol, f64>,
    /// Seconds after an hour ends during which a missing file means "not
    /// published yet" rather than "no ticks".
    pub publication_lag_secs: u64,
}

impl Default for DukascopyConfig {
    fn default() -> Self {
        Self {
            base_url: bi5::BASE_URL.to_string(),
            client: ClientConfig::default(),
            default_decimal_factor: 100_000.0,
            decimal_factors: BTreeMap::new(),
            publication_lag_secs: DEFAULT_PUBLICATION_LAG_SECS,
        }
    }
}

impl DukascopyConfig {
    /// Returns the price scale for a symbol.
    #[must_use]
    pub fn decimal_factor(&self, symbol: &Symbol) -> f64 {
        self.decimal_factors
            .get(symbol)
            .copied()
            .unwrap_or(self.default_decimal_factor)
    }

    /// Returns the publication lag, capped at one week.
    #[must_use]
    pub fn publication_lag(&self) -> TimeDelta {
        let secs = i64::try_from(self.publication_lag_secs).unwrap_or(i64::MAX);
        TimeDelta::seconds(secs.min(7 * 86_400))
    }
}

/// Returns true if a missing file for `hour` may still be published.
fn awaiting_publication(hour: DateTime<Utc>, now: DateTime<Utc>, lag: TimeDelta) -> bool {
    hour + TimeDelta::hours(1) + lag > now
}

/// [`TickSource`] backed by the Dukascopy hourly tick files.
///
/// Hours are downloaded concurrently but yielded strictly in hour order, so
/// the resulting stream is ordered. A missing file for an hour that ended
/// within the publication lag ends the stream before that hour: the ticks
/// are unconfirmed, not absent.
#[derive(Debug, Clone)]
pub struct DukascopySource {
    client: DownloadClient,
    config: DukascopyConfig,
}

impl DukascopySource {
    /// Creates a source from its settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: DukascopyConfig) -> Result<Self, FetchError> {
        let client = DownloadClient::new(config.client.clone())?;
        Ok(Self { client, config })
    }

    /// Returns the source settings.
    #[must_use]
    pub const fn config(&self) -> &DukascopyConfig {
        &self.config
    }
}

/// Downloads and decodes one hour. `Ok(None)` means the hour is not
/// published yet.
async fn fetch_hour(
    client: DownloadClient,
    url: String,
    hour: DateTime<Utc>,
    decimal_factor: f64,
    pending_after: DateTime<Utc>,
) -> Result<Option<Vec<Tick>>, FetchError> {
    let Some(compressed) = client.download(&url).await? else {
        if hour >= pending_after {
            tracing::debug!(%url, %hour, "hour not published yet");
            return Ok(None);
        }
        tracing::trace!(%url, "no ticks for hour");
        return Ok(Some(Vec::new()));
    };

    let decoded = tokio::task::spawn_blocking(move || {
        bi5::decompress(&compressed).and_then(|raw| bi5::decode(&raw, hour, decimal_factor))
    })
    .await
    .map_err(|e| e.to_string())
    .and_then(|r| r);

    decoded
        .map(Some)
        .map_err(|reason| FetchError::Decode { url, reason })
}

#[async_trait]
impl TickSource for DukascopySource {
    async fn fetch_ticks(
        &self,
        symbol: &Symbol,
        range: TimeRange,
    ) -> Result<TickStream, FetchError> {
        let client = self.client.clone();
        let base_url = self.config.base_url.clone();
        let instrument = symbol.to_string();
        let decimal_factor = self.config.decimal_factor(symbol);
        let concurrency = self.config.client.concurrency.max(1);
        let lag = self.config.publication_lag();
        let now = Utc::now();
        let pending_after = range
            .hours()
            .into_iter()
            .find(|hour| awaiting_publication(*hour, now, lag))
            .unwrap_or(range.end);

        tracing::debug!(%symbol, %range, hours = range.hours().len(), "fetching ticks");

        let ticks = stream::iter(range.hours())
            .map(move |hour| {
                let url = bi5::tick_url(&base_url, &instrument, hour);
                fetch_hour(client.clone(), url, hour, decimal_factor, pending_after)
            })
            .buffered(concurrency)
            .take_while(|batch| future::ready(!matches!(batch, Ok(None))))
            .flat_map(move |batch| match batch {
                Ok(ticks) => stream::iter(
                    ticks
                        .unwrap_or_default()
                        .into_iter()
                        .filter(move |t| range.contains(t.timestamp))
                        .map(Ok),
                )
                .left_stream(),
                Err(e) => stream::once(async move { Err(e) }).right_stream(),
            });

        Ok(ticks.boxed())
    }
}
