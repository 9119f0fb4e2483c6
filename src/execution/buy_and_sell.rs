use crate::error::{Error, Result};
use crate::feed::MarketData;
use crate::indicators::VALUATION_CURRENCY;
use crate::models::{MarketSymbol, Order};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::Duration;

pub const FILL_POLL_INTERVAL: Duration = Duration::from_millis(300);
const CLIENT_OID_PREFIX: &str = "mbals";
/// Longest `client_oid` the exchange accepts
pub const CLIENT_OID_MAX_LEN: usize = 36;

/// Validated input for one market-buy-then-limit-sell run
#[derive(Debug, Clone, PartialEq)]
pub struct BuyAndSellRequest {
    symbol: MarketSymbol,
    buy_percentage: f64,
    sell_profit: f64,
}

impl BuyAndSellRequest {
    /// Both percentages must lie in `0..=100`.
    pub fn new(symbol: MarketSymbol, buy_percentage: f64, sell_profit: f64) -> Result<Self> {
        check_percentage("buy percentage", buy_percentage)?;
        check_percentage("sell profit", sell_profit)?;

        Ok(Self {
            symbol,
            buy_percentage,
            sell_profit,
        })
    }

    pub fn symbol(&self) -> &MarketSymbol {
        &self.symbol
    }

    pub fn buy_percentage(&self) -> f64 {
        self.buy_percentage
    }

    pub fn sell_profit(&self) -> f64 {
        self.sell_profit
    }

    /// Share of the free balance to spend
    pub fn buy_budget(&self, free_balance: f64) -> f64 {
        free_balance * (self.buy_percentage / 100.0)
    }

    /// Limit price carrying the profit markup over the fill price
    pub fn sell_price(&self, fill_price: f64) -> f64 {
        fill_price * (1.0 + self.sell_profit / 100.0)
    }

    /// Tag for the sell order: both percentages plus the submission time
    ///
    /// Percentages keep at most two decimals so the id stays within
    /// [`CLIENT_OID_MAX_LEN`].
    pub fn client_oid(&self, submitted_at: DateTime<Utc>) -> String {
        format!(
            "{}-B{}-P{}-{}",
            CLIENT_OID_PREFIX,
            compact_percentage(self.buy_percentage),
            compact_percentage(self.sell_profit),
            submitted_at.timestamp_micros()
        )
    }
}

/// `12.50` -> `125`, `50` -> `50`, `33.3333` -> `3333`
fn compact_percentage(value: f64) -> String {
    format!("{:.2}", value)
        .trim_end_matches('0')
        .trim_end_matches('.')
        .replace('.', "")
}

fn check_percentage(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!(
            "{} must be between 0 and 100, got {}",
            name, value
        )))
    }
}

/// What a completed run did
#[derive(Debug, Clone, PartialEq)]
pub struct BuyAndSellOutcome {
    pub buy_amount: f64,
    pub buy_order: Order,
    pub sell_price: f64,
    pub sell_order: Order,
}

/// Market buy, wait for the fill, then a limit sell at a profit target
///
/// Steps run strictly in order and any failure aborts the rest. There is no
/// compensating action: a failed sell after a filled buy leaves the position open.
pub struct BuyAndSellService {
    market_data: Arc<MarketData>,
    poll_interval: Duration,
    max_fill_polls: Option<u32>,
}

impl BuyAndSellService {
    pub fn new(market_data: Arc<MarketData>) -> Self {
        Self {
            market_data,
            poll_interval: FILL_POLL_INTERVAL,
            max_fill_polls: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Give up waiting for the buy fill after `max_fill_polls` polls.
    ///
    /// `None` (the default) waits until the exchange closes the order.
    pub fn with_max_fill_polls(mut self, max_fill_polls: Option<u32>) -> Self {
        self.max_fill_polls = max_fill_polls;
        self
    }

    pub async fn execute(&self, request: &BuyAndSellRequest) -> Result<BuyAndSellOutcome> {
        let symbol = request.symbol();

        let free_usd = self.market_data.free_balance(VALUATION_CURRENCY).await?;
        let buy_budget = request.buy_budget(free_usd);

        let last_price = self
            .market_data
            .last_price(symbol)
            .filter(|price| *price > 0.0)
            .ok_or_else(|| Error::PriceUnavailable {
                symbol: symbol.wire_form(),
            })?;
        let buy_amount = self
            .market_data
            .amount_to_precision(buy_budget / last_price, symbol);
        if buy_amount <= 0.0 {
            return Err(Error::InvalidRequest(format!(
                "{} USD buys less than the smallest {} order",
                buy_budget, symbol
            )));
        }

        tracing::info!(
            symbol = %symbol,
            free_usd,
            "Creating market buy order for {} coins",
            buy_amount
        );
        let exchange = self.market_data.exchange();
        let buy_order = exchange.create_market_buy_order(symbol, buy_amount).await?;
        let buy_order = self.wait_until_closed(buy_order).await?;

        let (sell_price, sell_order) = match self.place_sell(request, &buy_order).await {
            Ok(placed) => placed,
            Err(e) => {
                tracing::error!(
                    symbol = %symbol,
                    order_id = %buy_order.id,
                    "Buy order filled but the limit sell failed, position is unhedged: {}",
                    e
                );
                return Err(e);
            }
        };

        if let Some(balance) = self.market_data.balance_coordinator() {
            if let Err(e) = balance.force_refresh().await {
                tracing::warn!("Balance refresh after trade failed: {}", e);
            }
        }

        Ok(BuyAndSellOutcome {
            buy_amount,
            buy_order,
            sell_price,
            sell_order,
        })
    }

    async fn place_sell(
        &self,
        request: &BuyAndSellRequest,
        buy_order: &Order,
    ) -> Result<(f64, Order)> {
        let fill_price = buy_order.price.ok_or_else(|| {
            Error::fetch(
                "private/get-order-detail",
                format!("order {} closed without a fill price", buy_order.id),
            )
        })?;

        let symbol = request.symbol();
        let sell_amount = self.market_data.amount_to_precision(buy_order.filled, symbol);
        let sell_price = self
            .market_data
            .price_to_precision(request.sell_price(fill_price), symbol);
        let client_oid = request.client_oid(Utc::now());

        tracing::info!(
            symbol = %symbol,
            client_oid = %client_oid,
            "Creating limit sell order for {} coins at {}",
            sell_amount,
            sell_price
        );
        let sell_order = self
            .market_data
            .exchange()
            .create_limit_sell_order(symbol, sell_amount, sell_price, Some(&client_oid))
            .await?;

        Ok((sell_price, sell_order))
    }

    /// Re-fetch the order every poll interval until the exchange reports it closed
    async fn wait_until_closed(&self, mut order: Order) -> Result<Order> {
        let mut polls = 0u32;

        while !order.status.is_closed() {
            if let Some(max) = self.max_fill_polls {
                if polls >= max {
                    return Err(Error::OrderFillTimeout {
                        order_id: order.id,
                        attempts: polls,
                    });
                }
            }

            tokio::time::sleep(self.poll_interval).await;
            order = self.market_data.exchange().fetch_order(&order.id).await?;
            polls += 1;

            tracing::debug!(order_id = %order.id, status = ?order.status, polls, "Polled order");
        }

        tracing::info!(order_id = %order.id, polls, "Order closed, filled {}", order.filled);
        Ok(order)
    }
}
