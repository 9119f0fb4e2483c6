// Market data polling, caching and display precision
pub mod coordinator;
pub mod market_data;
pub mod precision;

pub use coordinator::{FetchFuture, RefreshCoordinator, RefreshState};
pub use market_data::{
    BalanceCoordinator, CandlesticksCoordinator, MarketData, TickersCoordinator,
    BALANCE_INTERVAL, CANDLESTICKS_INTERVAL, CANDLE_TIMEFRAME, TICKERS_INTERVAL,
};
pub use precision::{
    floor_to_step, format_with_step, price_step, round_to_step, DEFAULT_PRICE_STEP,
};
