// Display values derived from the shared market data
pub mod balance;
pub mod price;

pub use balance::VirtualBalanceSensor;
pub use price::{LastPriceSensor, SimpleMovingAverageSensor};

use crate::feed::MarketData;
use crate::models::{BalanceKind, MarketSymbol};
use std::sync::Arc;
use tokio::sync::watch;

/// SMA windows published per symbol, in 1h candles
pub const SMA_PERIODS: [usize; 4] = [25, 50, 100, 200];

/// One published value
///
/// `native_value` only reads cached data; refreshing is the coordinators' job.
pub trait Sensor: Send + Sync {
    fn unique_id(&self) -> String;
    fn name(&self) -> String;
    fn unit(&self) -> String;
    fn icon(&self) -> &'static str;
    fn native_value(&self) -> Option<String>;

    /// Ticks whenever the data behind this sensor was refreshed
    fn updates(&self) -> watch::Receiver<u64>;
}

/// Icon for a market, picked by its base currency
pub fn currency_icon(currency: &str) -> &'static str {
    match currency {
        "EUR" => "mdi:currency-eur",
        "USD" => "mdi:currency-usd",
        "BTC" => "mdi:currency-btc",
        _ => "mdi:cash",
    }
}

/// Every sensor for the configured symbols
///
/// Balance sensors are only built when the account is reachable.
pub fn build_sensors(market_data: &Arc<MarketData>, symbols: &[MarketSymbol]) -> Vec<Box<dyn Sensor>> {
    let mut sensors: Vec<Box<dyn Sensor>> = Vec::new();

    for symbol in symbols {
        sensors.push(Box::new(LastPriceSensor::new(market_data.clone(), symbol.clone())));

        for period in SMA_PERIODS {
            sensors.push(Box::new(SimpleMovingAverageSensor::new(
                market_data.clone(),
                symbol.clone(),
                period,
            )));
        }
    }

    if market_data.balance_coordinator().is_some() {
        for kind in [BalanceKind::Total, BalanceKind::Free] {
            sensors.push(Box::new(VirtualBalanceSensor::new(market_data.clone(), kind)));
        }
    }

    sensors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_icon() {
        assert_eq!(currency_icon("BTC"), "mdi:currency-btc");
        assert_eq!(currency_icon("EUR"), "mdi:currency-eur");
        assert_eq!(currency_icon("USD"), "mdi:currency-usd");
        assert_eq!(currency_icon("CRO"), "mdi:cash");
    }
}
