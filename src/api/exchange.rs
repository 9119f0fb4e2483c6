use crate::error::Result;
use crate::models::{Balance, Candle, MarketInfo, MarketSymbol, Order, Ticker, Tickers, Timeframe};

/// Capabilities the core needs from an exchange
///
/// Every call is remote, fallible and subject to the implementation's rate limit.
#[async_trait::async_trait]
pub trait Exchange: Send + Sync {
    async fn fetch_markets(&self) -> Result<Vec<MarketInfo>>;

    async fn fetch_ticker(&self, symbol: &MarketSymbol) -> Result<Ticker>;

    /// All tickers, keyed by wire form (`BTC/USD`)
    async fn fetch_tickers(&self) -> Result<Tickers>;

    /// Candles ordered oldest first
    async fn fetch_ohlcv(&self, symbol: &MarketSymbol, timeframe: Timeframe)
        -> Result<Vec<Candle>>;

    async fn fetch_balance(&self) -> Result<Balance>;

    async fn create_market_buy_order(&self, symbol: &MarketSymbol, amount: f64) -> Result<Order>;

    async fn create_limit_sell_order(
        &self,
        symbol: &MarketSymbol,
        amount: f64,
        price: f64,
        client_oid: Option<&str>,
    ) -> Result<Order>;

    async fn fetch_order(&self, id: &str) -> Result<Order>;

    /// Whether private (balance/trading) endpoints are usable
    fn has_credentials(&self) -> bool;
}
