use super::Sensor;
use crate::feed::MarketData;
use crate::indicators::calculate_virtual_balance;
use crate::models::BalanceKind;
use std::sync::Arc;
use tokio::sync::watch;

/// Account value in USD, from either the total or the free balance
pub struct VirtualBalanceSensor {
    market_data: Arc<MarketData>,
    kind: BalanceKind,
}

impl VirtualBalanceSensor {
    pub fn new(market_data: Arc<MarketData>, kind: BalanceKind) -> Self {
        Self { market_data, kind }
    }
}

impl Sensor for VirtualBalanceSensor {
    fn unique_id(&self) -> String {
        self.name().to_lowercase().replace(' ', "_")
    }

    fn name(&self) -> String {
        match self.kind {
            BalanceKind::Total => "Crypto.com Virtual Balance",
            BalanceKind::Free => "Crypto.com Free Balance",
        }
        .to_string()
    }

    fn unit(&self) -> String {
        "$".to_string()
    }

    fn icon(&self) -> &'static str {
        "mdi:currency-usd"
    }

    fn native_value(&self) -> Option<String> {
        let tickers = self.market_data.tickers_coordinator().current_data()?;
        let balance = self.market_data.balance_coordinator()?.current_data()?;

        let value = calculate_virtual_balance(balance.amounts(self.kind), &tickers);
        Some(format!("{:.2}", value))
    }

    fn updates(&self) -> watch::Receiver<u64> {
        match self.market_data.balance_coordinator() {
            Some(balance) => balance.subscribe(),
            // never ticks without an account
            None => watch::channel(0).1,
        }
    }
}
