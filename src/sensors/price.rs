use super::{currency_icon, Sensor};
use crate::feed::{CandlesticksCoordinator, MarketData};
use crate::indicators::sma_of_closes;
use crate::models::MarketSymbol;
use std::sync::Arc;
use tokio::sync::watch;

/// Last traded price of one market
pub struct LastPriceSensor {
    market_data: Arc<MarketData>,
    symbol: MarketSymbol,
}

impl LastPriceSensor {
    pub fn new(market_data: Arc<MarketData>, symbol: MarketSymbol) -> Self {
        Self { market_data, symbol }
    }
}

impl Sensor for LastPriceSensor {
    fn unique_id(&self) -> String {
        format!("{}_last_price", self.symbol.key())
    }

    fn name(&self) -> String {
        self.unique_id()
    }

    fn unit(&self) -> String {
        self.symbol.display_unit().to_string()
    }

    fn icon(&self) -> &'static str {
        currency_icon(self.symbol.base())
    }

    fn native_value(&self) -> Option<String> {
        match self.market_data.last_price(&self.symbol) {
            Some(price) => Some(self.market_data.rounded_price(price, &self.symbol)),
            None => {
                tracing::warn!(symbol = %self.symbol, "No ticker data for symbol");
                None
            }
        }
    }

    fn updates(&self) -> watch::Receiver<u64> {
        self.market_data.tickers_coordinator().subscribe()
    }
}

/// Simple moving average of the hourly closes
pub struct SimpleMovingAverageSensor {
    market_data: Arc<MarketData>,
    candlesticks: Arc<CandlesticksCoordinator>,
    symbol: MarketSymbol,
    period: usize,
}

impl SimpleMovingAverageSensor {
    pub fn new(market_data: Arc<MarketData>, symbol: MarketSymbol, period: usize) -> Self {
        let candlesticks = market_data.candlestick_coordinator(&symbol);

        Self {
            market_data,
            candlesticks,
            symbol,
            period,
        }
    }
}

impl Sensor for SimpleMovingAverageSensor {
    fn unique_id(&self) -> String {
        format!("{}_sma_{}_1h", self.symbol.key(), self.period)
    }

    fn name(&self) -> String {
        self.unique_id()
    }

    fn unit(&self) -> String {
        self.symbol.display_unit().to_string()
    }

    fn icon(&self) -> &'static str {
        currency_icon(self.symbol.base())
    }

    fn native_value(&self) -> Option<String> {
        let candles = self.candlesticks.current_data()?;
        let sma = sma_of_closes(&candles, self.period)?;

        Some(self.market_data.rounded_price(sma, &self.symbol))
    }

    fn updates(&self) -> watch::Receiver<u64> {
        self.candlesticks.subscribe()
    }
}
