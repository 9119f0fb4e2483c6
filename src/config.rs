use crate::api::{Credentials, CRYPTOCOM_API_BASE};
use crate::error::Result;
use crate::models::MarketSymbol;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tokio::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "cryptocom.toml";
pub const ENV_PREFIX: &str = "CRYPTOCOM";

/// One configured market: `"BTC/USD"` or `{ symbol = "BTC/USD" }`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TickerEntry {
    Symbol(String),
    Table { symbol: String },
}

impl TickerEntry {
    pub fn as_str(&self) -> &str {
        match self {
            TickerEntry::Symbol(symbol) | TickerEntry::Table { symbol } => symbol,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: Option<String>,
    pub secret: Option<String>,
    pub tickers: Vec<TickerEntry>,
    pub base_url: String,
    pub rate_limit_ms: u64,
    pub fill_poll_ms: u64,
    pub max_fill_polls: Option<u32>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            secret: None,
            tickers: Vec::new(),
            base_url: CRYPTOCOM_API_BASE.to_string(),
            rate_limit_ms: 200,
            fill_poll_ms: 300,
            max_fill_polls: None,
            log_filter: "cryptocom=info".to_string(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("tickers", &self.tickers)
            .field("base_url", &self.base_url)
            .field("rate_limit_ms", &self.rate_limit_ms)
            .field("fill_poll_ms", &self.fill_poll_ms)
            .field("max_fill_polls", &self.max_fill_polls)
            .field("log_filter", &self.log_filter)
            .finish()
    }
}

impl Settings {
    /// Defaults, then the TOML file, then `CRYPTOCOM_*` environment variables
    ///
    /// An explicit `path` must exist; the default `cryptocom.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("tickers"),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Configured markets; malformed entries are skipped with a warning
    pub fn symbols(&self) -> Vec<MarketSymbol> {
        self.tickers
            .iter()
            .filter_map(|entry| match MarketSymbol::parse(entry.as_str()) {
                Ok(symbol) => Some(symbol),
                Err(e) => {
                    tracing::warn!("Skipping ticker: {}", e);
                    None
                }
            })
            .collect()
    }

    /// API credentials when both the key and the secret are set
    pub fn credentials(&self) -> Option<Credentials> {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

        match (non_empty(&self.api_key), non_empty(&self.secret)) {
            (Some(api_key), Some(secret)) => Some(Credentials::new(api_key, secret)),
            (None, None) => None,
            _ => {
                tracing::warn!("Only one of api_key and secret is set, running without credentials");
                None
            }
        }
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn fill_poll_interval(&self) -> Duration {
        Duration::from_millis(self.fill_poll_ms)
    }
}
