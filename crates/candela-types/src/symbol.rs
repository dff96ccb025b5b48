//! Instrument symbols.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::SymbolError;

/// A validated instrument identifier (e.g. `EURUSD`, `BTCUSD`, `US500.IDX`).
///
/// Symbols are normalized to upper case and restricted to `[A-Z0-9._-]`
/// because they name directories and files inside the target directory.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Creates a symbol, normalizing it to upper case.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol is empty or not filesystem safe.
    pub fn new(raw: &str) -> Result<Self, SymbolError> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(SymbolError::Empty);
        }
        if let Some(ch) = normalized
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(SymbolError::InvalidChar {
                symbol: normalized,
                ch,
            });
        }
        if normalized.starts_with('.') {
            return Err(SymbolError::InvalidChar {
                symbol: normalized,
                ch: '.',
            });
        }
        Ok(Self(normalized))
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}
