use crate::models::Tickers;
use std::collections::HashMap;

/// Currency everything is valued in
pub const VALUATION_CURRENCY: &str = "USD";

/// Value of a set of holdings in USD
///
/// Starts from the USD amount and adds every other currency at its `XXX/USD` last
/// price. Currencies without a USD ticker contribute nothing.
pub fn calculate_virtual_balance(amounts: &HashMap<String, f64>, tickers: &Tickers) -> f64 {
    let mut total = amounts.get(VALUATION_CURRENCY).copied().unwrap_or(0.0);

    for (currency, amount) in amounts {
        if currency == VALUATION_CURRENCY {
            continue;
        }

        let pair = format!("{}/{}", currency, VALUATION_CURRENCY);
        match tickers.get(&pair) {
            Some(ticker) => total += ticker.last * amount,
            None => tracing::debug!("No {} ticker, leaving {} out of the balance", pair, currency),
        }
    }

    total
}
