// In-memory exchange shared by the integration tests
#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use cryptocom::api::Exchange;
use cryptocom::error::{Error, Result};
use cryptocom::models::{
    Balance, Candle, MarketInfo, MarketSymbol, Order, OrderSide, OrderStatus, Ticker, Tickers,
    Timeframe,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSell {
    pub symbol: String,
    pub amount: f64,
    pub price: f64,
    pub client_oid: Option<String>,
}

#[derive(Default)]
pub struct MockExchange {
    credentials: bool,
    markets: Vec<MarketInfo>,
    tickers: Tickers,
    candles: HashMap<String, Vec<Candle>>,
    balance: Balance,
    order_updates: Mutex<VecDeque<Order>>,
    fail_sell: bool,
    calls: Mutex<HashMap<&'static str, usize>>,
    buys: Mutex<Vec<(String, f64)>>,
    sells: Mutex<Vec<PlacedSell>>,
}

impl MockExchange {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn with_credentials() -> Self {
        Self {
            credentials: true,
            ..Self::default()
        }
    }

    pub fn market(mut self, symbol: &str, price_step: f64) -> Self {
        let symbol = MarketSymbol::parse(symbol).unwrap();
        self.markets.push(MarketInfo {
            symbol: symbol.wire_form(),
            base: symbol.base().to_string(),
            quote: symbol.quote().to_string(),
            price_step,
            quantity_step: 0.0001,
        });
        self
    }

    pub fn ticker(mut self, symbol: &str, last: f64) -> Self {
        self.tickers.insert(symbol.to_string(), Ticker::new(symbol, last));
        self
    }

    /// Hourly candles with the given closes, oldest first
    pub fn candles(mut self, symbol: &str, closes: &[f64]) -> Self {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle {
                timestamp: start + Duration::hours(i as i64),
                open: *close,
                high: close + 1.0,
                low: close - 1.0,
                close: *close,
                volume: 1.0,
            })
            .collect();
        self.candles.insert(symbol.to_string(), candles);
        self
    }

    pub fn holding(mut self, currency: &str, free: f64, total: f64) -> Self {
        self.balance.free.insert(currency.to_string(), free);
        self.balance.total.insert(currency.to_string(), total);
        self
    }

    /// Views of the buy order returned by successive `fetch_order` calls
    pub fn order_updates(self, updates: Vec<Order>) -> Self {
        *self.order_updates.lock().unwrap() = updates.into();
        self
    }

    pub fn failing_sell(mut self) -> Self {
        self.fail_sell = true;
        self
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub fn buys(&self) -> Vec<(String, f64)> {
        self.buys.lock().unwrap().clone()
    }

    pub fn sells(&self) -> Vec<PlacedSell> {
        self.sells.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str) {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;
    }

    fn require_credentials(&self, operation: &str) -> Result<()> {
        if self.credentials {
            Ok(())
        } else {
            Err(Error::CredentialsRequired {
                operation: operation.to_string(),
            })
        }
    }
}

pub fn buy_order(status: OrderStatus, filled: f64, price: Option<f64>) -> Order {
    Order {
        id: "buy-1".to_string(),
        client_oid: None,
        symbol: "BTC/USD".to_string(),
        side: OrderSide::Buy,
        status,
        filled,
        price,
    }
}

#[async_trait::async_trait]
impl Exchange for MockExchange {
    async fn fetch_markets(&self) -> Result<Vec<MarketInfo>> {
        self.record("fetch_markets");
        Ok(self.markets.clone())
    }

    async fn fetch_ticker(&self, symbol: &MarketSymbol) -> Result<Ticker> {
        self.record("fetch_ticker");
        self.tickers
            .get(&symbol.wire_form())
            .cloned()
            .ok_or_else(|| Error::PriceUnavailable {
                symbol: symbol.wire_form(),
            })
    }

    async fn fetch_tickers(&self) -> Result<Tickers> {
        self.record("fetch_tickers");
        Ok(self.tickers.clone())
    }

    async fn fetch_ohlcv(&self, symbol: &MarketSymbol, timeframe: Timeframe) -> Result<Vec<Candle>> {
        self.record("fetch_ohlcv");
        assert_eq!(timeframe, Timeframe::OneHour);
        Ok(self.candles.get(&symbol.wire_form()).cloned().unwrap_or_default())
    }

    async fn fetch_balance(&self) -> Result<Balance> {
        self.record("fetch_balance");
        self.require_credentials("fetch_balance")?;
        Ok(self.balance.clone())
    }

    async fn create_market_buy_order(&self, symbol: &MarketSymbol, amount: f64) -> Result<Order> {
        self.record("create_market_buy_order");
        self.require_credentials("create_order")?;
        self.buys.lock().unwrap().push((symbol.wire_form(), amount));
        Ok(buy_order(OrderStatus::Open, 0.0, None))
    }

    async fn create_limit_sell_order(
        &self,
        symbol: &MarketSymbol,
        amount: f64,
        price: f64,
        client_oid: Option<&str>,
    ) -> Result<Order> {
        self.record("create_limit_sell_order");
        self.require_credentials("create_order")?;

        if self.fail_sell {
            return Err(Error::Exchange {
                method: "private/create-order".to_string(),
                code: 306,
                message: "INSUFFICIENT_AVAILABLE_BALANCE".to_string(),
            });
        }

        self.sells.lock().unwrap().push(PlacedSell {
            symbol: symbol.wire_form(),
            amount,
            price,
            client_oid: client_oid.map(str::to_string),
        });

        Ok(Order {
            id: "sell-1".to_string(),
            client_oid: client_oid.map(str::to_string),
            symbol: symbol.wire_form(),
            side: OrderSide::Sell,
            status: OrderStatus::Open,
            filled: 0.0,
            price: Some(price),
        })
    }

    async fn fetch_order(&self, id: &str) -> Result<Order> {
        self.record("fetch_order");
        self.order_updates
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::fetch("private/get-order-detail", format!("unknown order {}", id)))
    }

    fn has_credentials(&self) -> bool {
        self.credentials
    }
}
