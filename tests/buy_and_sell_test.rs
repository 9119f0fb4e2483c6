mod common;

use common::{buy_order, MockExchange};
use cryptocom::api::Exchange;
use cryptocom::error::Error;
use cryptocom::execution::{BuyAndSellRequest, BuyAndSellService};
use cryptocom::feed::MarketData;
use cryptocom::models::{MarketSymbol, OrderStatus};
use std::sync::Arc;
use tokio::time::Duration;
use tokio_test::{assert_err, assert_ok};

async fn primed(exchange: &Arc<MockExchange>) -> Arc<MarketData> {
    let data = Arc::new(MarketData::new(exchange.clone() as Arc<dyn Exchange>));
    assert_ok!(data.initialize().await);
    assert_ok!(data.tickers_coordinator().ensure_fresh().await);
    data
}

fn request(buy_percentage: f64, sell_profit: f64) -> BuyAndSellRequest {
    BuyAndSellRequest::new(MarketSymbol::new("BTC", "USD"), buy_percentage, sell_profit).unwrap()
}

fn funded() -> MockExchange {
    MockExchange::with_credentials()
        .ticker("BTC/USD", 20000.0)
        .holding("USD", 1000.0, 1000.0)
}

#[tokio::test(start_paused = true)]
async fn test_buys_share_of_balance_and_sells_at_profit() {
    let exchange = Arc::new(funded().order_updates(vec![
        buy_order(OrderStatus::Open, 0.0, None),
        buy_order(OrderStatus::Closed, 0.025, Some(20000.0)),
    ]));
    let data = primed(&exchange).await;

    let outcome = assert_ok!(BuyAndSellService::new(data).execute(&request(50.0, 2.0)).await);

    let buys = exchange.buys();
    assert_eq!(buys.len(), 1);
    assert_eq!(buys[0].0, "BTC/USD");
    assert!((buys[0].1 - 0.025).abs() < 1e-12);
    assert!((outcome.buy_amount - 0.025).abs() < 1e-12);

    let sells = exchange.sells();
    assert_eq!(sells.len(), 1);
    assert_eq!(sells[0].amount, 0.025);
    assert!((sells[0].price - 20400.0).abs() < 1e-9);
    assert!(sells[0]
        .client_oid
        .as_deref()
        .unwrap()
        .starts_with("mbals-B50-P2-"));
    assert_eq!(outcome.sell_order.id, "sell-1");
    assert_eq!(outcome.buy_order.status, OrderStatus::Closed);

    assert_eq!(exchange.calls("fetch_order"), 2);
    // once for the budget, once after the trade
    assert_eq!(exchange.calls("fetch_balance"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_polls_at_fixed_interval_until_closed() {
    let exchange = Arc::new(funded().order_updates(vec![
        buy_order(OrderStatus::Open, 0.0, None),
        buy_order(OrderStatus::Open, 0.01, Some(20000.0)),
        buy_order(OrderStatus::Closed, 0.025, Some(20010.0)),
    ]));
    let data = primed(&exchange).await;

    let started = tokio::time::Instant::now();
    let outcome = assert_ok!(BuyAndSellService::new(data).execute(&request(50.0, 2.0)).await);

    assert_eq!(exchange.calls("fetch_order"), 3);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(900) && waited < Duration::from_millis(1200));
    // sell uses the final fill price
    assert!((outcome.sell_price - 20410.2).abs() < 1e-9);
}

#[tokio::test]
async fn test_missing_price_aborts_before_buying() {
    let exchange = Arc::new(
        MockExchange::with_credentials()
            .ticker("ETH/USD", 1500.0)
            .holding("USD", 1000.0, 1000.0),
    );
    let data = primed(&exchange).await;

    let err = assert_err!(BuyAndSellService::new(data).execute(&request(50.0, 2.0)).await);

    assert_eq!(
        err,
        Error::PriceUnavailable {
            symbol: "BTC/USD".to_string()
        }
    );
    assert!(exchange.buys().is_empty());
}

#[tokio::test]
async fn test_requires_credentials() {
    let exchange = Arc::new(MockExchange::public().ticker("BTC/USD", 20000.0));
    let data = primed(&exchange).await;

    let err = assert_err!(BuyAndSellService::new(data).execute(&request(50.0, 2.0)).await);

    assert!(matches!(err, Error::CredentialsRequired { .. }));
    assert_eq!(exchange.calls("create_market_buy_order"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_fill_poll_cap() {
    let exchange = Arc::new(funded().order_updates(vec![
        buy_order(OrderStatus::Open, 0.0, None),
        buy_order(OrderStatus::Open, 0.0, None),
        buy_order(OrderStatus::Open, 0.0, None),
        buy_order(OrderStatus::Open, 0.0, None),
    ]));
    let data = primed(&exchange).await;

    let service = BuyAndSellService::new(data).with_max_fill_polls(Some(3));
    let err = assert_err!(service.execute(&request(50.0, 2.0)).await);

    assert_eq!(
        err,
        Error::OrderFillTimeout {
            order_id: "buy-1".to_string(),
            attempts: 3
        }
    );
    assert!(exchange.sells().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sell_failure_leaves_buy_in_place() {
    let exchange = Arc::new(
        funded()
            .failing_sell()
            .order_updates(vec![buy_order(OrderStatus::Closed, 0.025, Some(20000.0))]),
    );
    let data = primed(&exchange).await;

    let err = assert_err!(BuyAndSellService::new(data).execute(&request(50.0, 2.0)).await);

    assert!(err.is_remote());
    assert_eq!(exchange.buys().len(), 1);
    assert_eq!(exchange.calls("create_limit_sell_order"), 1);
    // aborted before the post-trade refresh
    assert_eq!(exchange.calls("fetch_balance"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_orders_are_sent_on_market_steps() {
    // price step 0.01, quantity step 0.0001
    let exchange = Arc::new(
        MockExchange::with_credentials()
            .market("BTC/USD", 0.01)
            .ticker("BTC/USD", 20123.45)
            .holding("USD", 1000.0, 1000.0)
            .order_updates(vec![buy_order(OrderStatus::Closed, 0.0248, Some(20123.45))]),
    );
    let data = primed(&exchange).await;

    let outcome = assert_ok!(BuyAndSellService::new(data).execute(&request(50.0, 2.0)).await);

    // 500 / 20123.45 = 0.02484663... floors to 0.0248
    assert_eq!(exchange.buys()[0].1, 0.0248);
    assert_eq!(outcome.buy_amount, 0.0248);

    // 20123.45 * 1.02 = 20525.919 rounds to 20525.92
    let sells = exchange.sells();
    assert_eq!(sells[0].price, 20525.92);
    assert_eq!(sells[0].amount, 0.0248);
    assert_eq!(sells[0].price.to_string(), "20525.92");
    assert_eq!(sells[0].amount.to_string(), "0.0248");
}

#[tokio::test]
async fn test_budget_below_quantity_step_places_nothing() {
    let exchange = Arc::new(
        MockExchange::with_credentials()
            .market("BTC/USD", 0.01)
            .ticker("BTC/USD", 20000.0)
            .holding("USD", 1.0, 1.0),
    );
    let data = primed(&exchange).await;

    let err = assert_err!(BuyAndSellService::new(data).execute(&request(50.0, 2.0)).await);

    assert!(matches!(err, Error::InvalidRequest(_)));
    assert!(exchange.buys().is_empty());
}
