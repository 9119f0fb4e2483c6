// Order placement workflows
pub mod buy_and_sell;

pub use buy_and_sell::{BuyAndSellOutcome, BuyAndSellRequest, BuyAndSellService, FILL_POLL_INTERVAL};
