//! HTTP client for downloading provider files.

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::FetchError;

/// Configuration for the download client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Maximum concurrent downloads per fetch.
    pub concurrency: usize,
    /// Request timeout, in seconds.
    pub timeout_secs: u64,
    /// Maximum retry attempts for failed requests.
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay between retries, in milliseconds.
    pub max_delay_ms: u64,
    /// User agent string.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            timeout_secs: 60,
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            user_agent: format!("candela/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client with connection pooling and retry logic.
#[derive(Debug, Clone)]
pub struct DownloadClient {
    client: Client,
    config: ClientConfig,
}

impl DownloadClient {
    /// Creates a new download client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.concurrency)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client, config })
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Downloads a single file.
    ///
    /// Returns `Ok(None)` if the file does not exist (404), which the
    /// provider uses for hours without ticks.
    ///
    /// # Errors
    ///
    /// Returns an error if the download fails after all retries.
    pub async fn download(&self, url: &str) -> Result<Option<Bytes>, FetchError> {
        let mut attempts = 0;

        loop {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::NOT_FOUND {
                        return Ok(None);
                    }

                    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        if attempts < self.config.max_retries {
                            attempts += 1;
                            let delay = self.backoff_delay(attempts);
                            tracing::debug!(url, %status, attempts, ?delay, "retrying download");
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        return Err(FetchError::Server {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }

                    if !status.is_success() {
                        return Err(FetchError::Server {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }

                    return response.bytes().await.map(Some).map_err(|source| {
                        FetchError::Http {
                            url: url.to_string(),
                            source,
                        }
                    });
                }
                Err(e) if is_retryable(&e) && attempts < self.config.max_retries => {
                    attempts += 1;
                    let delay = self.backoff_delay(attempts);
                    tracing::debug!(url, error = %e, attempts, ?delay, "retrying download");
                    tokio::time::sleep(delay).await;
                }
                Err(source) => {
                    return Err(FetchError::Http {
                        url: url.to_string(),
                        source,
                    });
                }
            }
        }
    }

    /// Exponential backoff with a small deterministic jitter, capped at
    /// `max_delay_ms` and never below 100ms.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp_delay = self
            .config
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(10));
        let capped = exp_delay.min(self.config.max_delay_ms);

        let jitter_range = capped / 4;
        let jitter = if jitter_range > 0 {
            (u64::from(attempt) * 17) % (jitter_range * 2)
        } else {
            0
        };

        let delay = (capped + jitter).saturating_sub(jitter_range).max(100);
        Duration::from_millis(delay)
    }
}

fn is_retryable(error: &reqwest::Error) -> bool {
    if error.is_builder() {
        return false;
    }
    error.is_timeout() || error.is_connect() || error.is_request()
}
