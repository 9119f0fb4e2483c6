use crate::models::Candle;

/// Calculate Simple Moving Average (SMA) over the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// SMA of the closing prices of the most recent `period` candles
///
/// `None` until at least `period` candles are available; never a partial average.
pub fn sma_of_closes(candles: &[Candle], period: usize) -> Option<f64> {
    let closes: Vec<f64> = candles.iter().map(|candle| candle.close).collect();
    calculate_sma(&closes, period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn candles(closes: &[f64]) -> Vec<Candle> {
        let start = Utc::now();
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle {
                timestamp: start + Duration::hours(i as i64),
                open: close - 1.0,
                high: close + 2.0,
                low: close - 2.0,
                close: *close,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn test_sma() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        let sma = calculate_sma(&prices, 5);
        assert_eq!(sma, Some(104.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = vec![100.0, 102.0];
        let sma = calculate_sma(&prices, 5);
        assert!(sma.is_none());
    }

    #[test]
    fn test_sma_zero_period() {
        assert!(calculate_sma(&[1.0, 2.0], 0).is_none());
    }

    #[test]
    fn test_sma_of_closes_uses_most_recent_candles() {
        let data = candles(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        // last 2 closes: 4, 5
        assert_eq!(sma_of_closes(&data, 2), Some(4.5));
        // close, not low or high
        assert_eq!(sma_of_closes(&data, 5), Some(3.0));
    }

    #[test]
    fn test_sma_of_closes_needs_full_window() {
        let data = candles(&[1.0, 2.0, 3.0]);
        assert_eq!(sma_of_closes(&data, 4), None);
    }
}
