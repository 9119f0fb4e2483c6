use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A trading pair such as `BTC/USD`
///
/// Immutable once parsed; cheap to clone and share between sensors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarketSymbol {
    base: String,
    quote: String,
}

impl MarketSymbol {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Parse `BASE/QUOTE` or `BASE_QUOTE`, splitting on the first separator found.
    ///
    /// Case is kept as given; the exchange expects uppercase codes.
    pub fn parse(input: &str) -> Result<Self> {
        let malformed = || Error::MalformedSymbol {
            input: input.to_string(),
        };

        let (base, quote) = input
            .trim()
            .split_once(|c: char| c == '/' || c == '_')
            .ok_or_else(malformed)?;

        if base.is_empty() || quote.is_empty() {
            return Err(malformed());
        }

        Ok(Self::new(base, quote))
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Lowercase `base_quote`, used for sensor ids and registry keys
    pub fn key(&self) -> String {
        format!("{}_{}", self.base, self.quote).to_lowercase()
    }

    /// `BASE/QUOTE`, the form tickers and market metadata are keyed by
    pub fn wire_form(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    pub fn display_unit(&self) -> &str {
        match self.quote.as_str() {
            "USD" => "$",
            "EUR" => "€",
            other => other,
        }
    }
}

impl FromStr for MarketSymbol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MarketSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}
