use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub mod symbol;

pub use symbol::MarketSymbol;

/// Per-market metadata from the exchange's instrument list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketInfo {
    pub symbol: String, // wire form, e.g. "BTC/USD"
    pub base: String,
    pub quote: String,
    pub price_step: f64,    // smallest price increment, e.g. 0.01
    pub quantity_step: f64, // smallest order size increment
}

/// Latest trade snapshot for one market
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticker {
    pub symbol: String,
    pub last: f64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Ticker {
    pub fn new(symbol: impl Into<String>, last: f64) -> Self {
        Self {
            symbol: symbol.into(),
            last,
            bid: None,
            ask: None,
            high: None,
            low: None,
            volume: None,
            timestamp: None,
        }
    }
}

/// Tickers keyed by wire form
pub type Tickers = HashMap<String, Ticker>;

/// OHLCV candlestick
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candle bucket width
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Timeframe {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    FourHours,
    OneDay,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::ThirtyMinutes => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
            Timeframe::OneDay => "1D",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account balances per currency
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Balance {
    pub free: HashMap<String, f64>,
    pub total: HashMap<String, f64>,
}

/// Which side of the balance to read
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BalanceKind {
    Free,
    Total,
}

impl Balance {
    pub fn amounts(&self, kind: BalanceKind) -> &HashMap<String, f64> {
        match kind {
            BalanceKind::Free => &self.free,
            BalanceKind::Total => &self.total,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Order lifecycle state as reported by the exchange
///
/// Only `Closed` is final as far as the fill poll is concerned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    Closed,
    Canceled,
    Rejected,
    Expired,
    Other(String),
}

impl OrderStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, OrderStatus::Closed)
    }
}

/// Exchange order
///
/// Never mutated locally; a newer view comes from re-fetching it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub client_oid: Option<String>,
    pub symbol: String,
    pub side: OrderSide,
    pub status: OrderStatus,
    pub filled: f64,
    pub price: Option<f64>, // average fill price once trades happened
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_amounts() {
        let mut balance = Balance::default();
        balance.free.insert("USD".to_string(), 100.0);
        balance.total.insert("USD".to_string(), 150.0);

        assert_eq!(balance.amounts(BalanceKind::Free)["USD"], 100.0);
        assert_eq!(balance.amounts(BalanceKind::Total)["USD"], 150.0);
    }

    #[test]
    fn test_only_closed_is_final() {
        assert!(OrderStatus::Closed.is_closed());
        assert!(!OrderStatus::Open.is_closed());
        assert!(!OrderStatus::Canceled.is_closed());
        assert!(!OrderStatus::Other("PENDING".to_string()).is_closed());
    }

    #[test]
    fn test_timeframe_labels() {
        assert_eq!(Timeframe::OneHour.as_str(), "1h");
        assert_eq!(Timeframe::OneDay.to_string(), "1D");
    }
}
