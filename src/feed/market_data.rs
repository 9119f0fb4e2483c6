use super::coordinator::{FetchFuture, RefreshCoordinator};
use super::precision;
use crate::api::Exchange;
use crate::error::{Error, Result};
use crate::models::{Balance, Candle, MarketInfo, MarketSymbol, Tickers, Timeframe};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::time::Duration;

pub const TICKERS_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const CANDLESTICKS_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const BALANCE_INTERVAL: Duration = Duration::from_secs(11 * 60);
pub const CANDLE_TIMEFRAME: Timeframe = Timeframe::OneHour;

pub type TickersCoordinator = RefreshCoordinator<Tickers>;
pub type CandlesticksCoordinator = RefreshCoordinator<Vec<Candle>>;
pub type BalanceCoordinator = RefreshCoordinator<Balance>;

/// Entry point for everything that reads exchange data
///
/// Owns the exchange handle and the market metadata; hands out shared
/// coordinators to sensors and to the order workflow.
pub struct MarketData {
    exchange: Arc<dyn Exchange>,
    markets: RwLock<Vec<MarketInfo>>,
    tickers: Arc<TickersCoordinator>,
    balance: Option<Arc<BalanceCoordinator>>,
    candlesticks: Mutex<HashMap<String, Arc<CandlesticksCoordinator>>>,
}

impl MarketData {
    /// The balance coordinator only exists when the exchange has credentials.
    pub fn new(exchange: Arc<dyn Exchange>) -> Self {
        let tickers = {
            let exchange = exchange.clone();
            RefreshCoordinator::new("tickers", TICKERS_INTERVAL, move || {
                let exchange = exchange.clone();
                Box::pin(async move { exchange.fetch_tickers().await }) as FetchFuture<Tickers>
            })
        };

        let balance = if exchange.has_credentials() {
            let exchange = exchange.clone();
            Some(Arc::new(RefreshCoordinator::new(
                "balance",
                BALANCE_INTERVAL,
                move || {
                    let exchange = exchange.clone();
                    Box::pin(async move { exchange.fetch_balance().await })
                        as FetchFuture<Balance>
                },
            )))
        } else {
            tracing::info!("No API credentials configured, balance and trading are disabled");
            None
        };

        Self {
            exchange,
            markets: RwLock::new(Vec::new()),
            tickers: Arc::new(tickers),
            balance,
            candlesticks: Mutex::new(HashMap::new()),
        }
    }

    /// Load market metadata; precision lookups fall back to defaults until this ran.
    pub async fn initialize(&self) -> Result<()> {
        let markets = self.exchange.fetch_markets().await?;
        tracing::info!("Found {} markets on crypto.com exchange", markets.len());

        *self.markets.write().unwrap_or_else(PoisonError::into_inner) = markets;
        Ok(())
    }

    pub fn exchange(&self) -> &Arc<dyn Exchange> {
        &self.exchange
    }

    pub fn price_step(&self, symbol: &MarketSymbol) -> f64 {
        let markets = self.markets.read().unwrap_or_else(PoisonError::into_inner);
        precision::price_step(symbol, &markets)
    }

    /// `value` formatted to the market's price precision
    pub fn rounded_price(&self, value: f64, symbol: &MarketSymbol) -> String {
        precision::format_with_step(value, self.price_step(symbol))
    }

    /// `price` snapped to the nearest step the market accepts
    pub fn price_to_precision(&self, price: f64, symbol: &MarketSymbol) -> f64 {
        precision::round_to_step(price, self.price_step(symbol))
    }

    /// `amount` floored to the market's quantity step so it never exceeds what was funded
    ///
    /// Unknown markets leave the amount as is and let the exchange judge it.
    pub fn amount_to_precision(&self, amount: f64, symbol: &MarketSymbol) -> f64 {
        let markets = self.markets.read().unwrap_or_else(PoisonError::into_inner);

        match precision::lookup_quantity_step(symbol, &markets) {
            Ok(step) => precision::floor_to_step(amount, step),
            Err(e) => {
                tracing::warn!("{}, sending unrounded amount", e);
                amount
            }
        }
    }

    pub fn tickers_coordinator(&self) -> Arc<TickersCoordinator> {
        self.tickers.clone()
    }

    pub fn balance_coordinator(&self) -> Option<Arc<BalanceCoordinator>> {
        self.balance.clone()
    }

    /// Hourly candle coordinator for `symbol`, created on first request
    pub fn candlestick_coordinator(&self, symbol: &MarketSymbol) -> Arc<CandlesticksCoordinator> {
        let mut registry = self
            .candlesticks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        registry
            .entry(symbol.key())
            .or_insert_with(|| {
                tracing::debug!(symbol = %symbol, "Creating candlestick coordinator");
                let exchange = self.exchange.clone();
                let symbol = symbol.clone();
                Arc::new(RefreshCoordinator::new(
                    format!("candlesticks {}", symbol),
                    CANDLESTICKS_INTERVAL,
                    move || {
                        let exchange = exchange.clone();
                        let symbol = symbol.clone();
                        Box::pin(async move { exchange.fetch_ohlcv(&symbol, CANDLE_TIMEFRAME).await })
                            as FetchFuture<Vec<Candle>>
                    },
                ))
            })
            .clone()
    }

    pub fn candlestick_coordinators(&self) -> Vec<Arc<CandlesticksCoordinator>> {
        self.candlesticks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Cached last price; never fetches
    pub fn last_price(&self, symbol: &MarketSymbol) -> Option<f64> {
        self.tickers
            .current_data()?
            .get(&symbol.wire_form())
            .map(|ticker| ticker.last)
    }

    /// Free amount of `currency` after a forced balance refresh
    ///
    /// A currency missing from the account reads as zero.
    pub async fn free_balance(&self, currency: &str) -> Result<f64> {
        let coordinator = self
            .balance
            .as_ref()
            .ok_or_else(|| Error::CredentialsRequired {
                operation: "balance queries".to_string(),
            })?;

        coordinator.force_refresh().await?;

        Ok(coordinator
            .current_data()
            .and_then(|balance| balance.free.get(currency).copied())
            .unwrap_or(0.0))
    }
}
