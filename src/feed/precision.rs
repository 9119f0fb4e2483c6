use crate::error::{Error, Result};
use crate::models::{MarketInfo, MarketSymbol};

/// Step used when a market is missing from the exchange metadata
pub const DEFAULT_PRICE_STEP: f64 = 0.01;

/// Strict lookup of the price step for `symbol`
pub fn lookup_price_step(symbol: &MarketSymbol, markets: &[MarketInfo]) -> Result<f64> {
    let wire = symbol.wire_form();

    markets
        .iter()
        .find(|market| market.symbol == wire)
        .map(|market| market.price_step)
        .ok_or(Error::MetadataNotFound { symbol: wire })
}

/// Price step for `symbol`, falling back to [`DEFAULT_PRICE_STEP`] when unknown
pub fn price_step(symbol: &MarketSymbol, markets: &[MarketInfo]) -> f64 {
    lookup_price_step(symbol, markets).unwrap_or_else(|e| {
        tracing::warn!("{}, using default precision {}", e, DEFAULT_PRICE_STEP);
        DEFAULT_PRICE_STEP
    })
}

/// Strict lookup of the quantity step for `symbol`
pub fn lookup_quantity_step(symbol: &MarketSymbol, markets: &[MarketInfo]) -> Result<f64> {
    let wire = symbol.wire_form();

    markets
        .iter()
        .find(|market| market.symbol == wire)
        .map(|market| market.quantity_step)
        .ok_or(Error::MetadataNotFound { symbol: wire })
}

/// Number of decimals a step allows: 0.01 -> 2, 1 -> 0
///
/// Steps coarser than 1 clamp to zero decimals.
pub fn decimals_for_step(step: f64) -> usize {
    (1.0 / step).log10().round().max(0.0) as usize
}

/// Format `value` with exactly as many decimals as `step` allows
///
/// `step` must be positive.
pub fn format_with_step(value: f64, step: f64) -> String {
    format!("{:.*}", decimals_for_step(step), value)
}

/// Nearest multiple of `step`; a non-positive step leaves `value` untouched
pub fn round_to_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    trim_to_decimals((value / step).round() * step, step)
}

/// Largest multiple of `step` not above `value`
pub fn floor_to_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    // tolerate representation error such as 0.0248 / 0.0001 = 247.99999999999997
    trim_to_decimals((value / step + 1e-9).floor() * step, step)
}

// 248.0 * 0.0001 = 0.024800000000000003 would otherwise reach the wire
fn trim_to_decimals(value: f64, step: f64) -> f64 {
    let factor = 10f64.powi(decimals_for_step(step) as i32);
    (value * factor).round() / factor
}
