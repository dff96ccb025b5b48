//! Fetch errors.

use candela_types::Symbol;
use thiserror::Error;

/// Errors raised while fetching ticks.
///
/// Every variant means the requested range was not fully delivered; callers
/// must not advance past data they could not confirm receiving.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP error for {url}: {source}")]
    Http {
        /// Requested URL.
        url: String,
        /// Underlying error.
        source: reqwest::Error,
    },

    /// Server returned an error status after all retries.
    #[error("Server error {status} for {url}")]
    Server {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// A downloaded file could not be decoded.
    #[error("Failed to decode {url}: {reason}")]
    Decode {
        /// Requested URL.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// The source cannot serve the symbol.
    #[error("Tick source unavailable for {symbol}: {reason}")]
    Unavailable {
        /// The symbol requested.
        symbol: Symbol,
        /// What went wrong.
        reason: String,
    },

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
