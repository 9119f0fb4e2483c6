//! Error types shared across the crate.

use thiserror::Error;

/// Everything that can go wrong between the exchange and the sensors.
///
/// The enum is `Clone` so that a single refresh outcome can be handed to every
/// caller that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A configured market string could not be split into base and quote.
    #[error("failed to parse '{input}' as a market symbol (expected BASE/QUOTE or BASE_QUOTE)")]
    MalformedSymbol { input: String },

    /// The exchange metadata has no record for this market.
    #[error("no market metadata found for {symbol}")]
    MetadataNotFound { symbol: String },

    /// A private endpoint was used without API credentials.
    #[error("API key and secret are required for {operation}")]
    CredentialsRequired { operation: String },

    /// Transport or decoding failure talking to the exchange.
    #[error("request to {endpoint} failed: {message}")]
    Fetch { endpoint: String, message: String },

    /// The exchange answered with a non-zero response code.
    #[error("exchange rejected {method} (code {code}): {message}")]
    Exchange {
        method: String,
        code: i64,
        message: String,
    },

    /// No ticker has been cached for the market yet.
    #[error("no last price available for {symbol}")]
    PriceUnavailable { symbol: String },

    /// The fill poll gave up before the order closed.
    #[error("order {order_id} still not closed after {attempts} polls")]
    OrderFillTimeout { order_id: String, attempts: u32 },

    /// Caller-supplied input is out of range.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Settings could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn fetch(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Returns true for failures of a remote call, as opposed to local misuse.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Exchange { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|url| url.path().to_string())
            .unwrap_or_else(|| "exchange".to_string());
        Self::fetch(endpoint, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::fetch("response body", err)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_symbol_display() {
        let err = Error::MalformedSymbol {
            input: "BTCUSD".to_string(),
        };
        assert!(err.to_string().contains("'BTCUSD'"));
    }

    #[test]
    fn test_is_remote() {
        assert!(Error::fetch("/public/get-ticker", "timeout").is_remote());
        assert!(Error::Exchange {
            method: "private/create-order".to_string(),
            code: 306,
            message: "INSUFFICIENT_AVAILABLE_BALANCE".to_string(),
        }
        .is_remote());
        assert!(!Error::PriceUnavailable {
            symbol: "BTC/USD".to_string()
        }
        .is_remote());
    }
}
