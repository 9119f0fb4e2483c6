use anyhow::Context;
use clap::{Parser, Subcommand};
use cryptocom::api::CryptoComClient;
use cryptocom::config::Settings;
use cryptocom::execution::{BuyAndSellRequest, BuyAndSellService};
use cryptocom::feed::{MarketData, RefreshCoordinator};
use cryptocom::models::MarketSymbol;
use cryptocom::sensors::{build_sensors, Sensor};
use cryptocom::Exchange;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cryptocom", about = "Crypto.com market data sensors and trading")]
struct Cli {
    /// Settings file (defaults to ./cryptocom.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the exchange and publish sensor values until Ctrl+C
    Watch,
    /// Market buy a share of the free USD balance, then place a limit sell at a profit
    BuyAndSell {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        buy_percentage: f64,
        #[arg(long)]
        sell_profit: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    setup_logging(&settings.log_filter);
    tracing::debug!("Loaded {:?}", settings);

    let client = CryptoComClient::new(
        settings.base_url.clone(),
        settings.credentials(),
        settings.rate_limit(),
    )
    .context("Failed to build crypto.com client")?;
    let exchange: Arc<dyn Exchange> = Arc::new(client);

    let market_data = Arc::new(MarketData::new(exchange));
    market_data
        .initialize()
        .await
        .context("Failed to load crypto.com markets")?;

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(market_data, &settings).await,
        Command::BuyAndSell {
            symbol,
            buy_percentage,
            sell_profit,
        } => buy_and_sell(market_data, &settings, &symbol, buy_percentage, sell_profit).await,
    }
}

fn setup_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn watch(market_data: Arc<MarketData>, settings: &Settings) -> anyhow::Result<()> {
    let symbols = settings.symbols();
    if symbols.is_empty() {
        tracing::warn!("No valid tickers configured, only balance sensors will be published");
    }

    let sensors: Vec<Arc<dyn Sensor>> = build_sensors(&market_data, &symbols)
        .into_iter()
        .map(Arc::from)
        .collect();

    tracing::info!("Publishing {} sensors:", sensors.len());
    for sensor in &sensors {
        tracing::info!("  - {} [{}] ({})", sensor.name(), sensor.unit(), sensor.icon());
    }

    // One refresh loop per coordinator; sensors created the candle ones above.
    let mut refresh_tasks: Vec<JoinHandle<()>> = vec![spawn_refresh(market_data.tickers_coordinator())];
    if let Some(balance) = market_data.balance_coordinator() {
        refresh_tasks.push(spawn_refresh(balance));
    }
    for candlesticks in market_data.candlestick_coordinators() {
        refresh_tasks.push(spawn_refresh(candlesticks));
    }

    let publish_tasks: Vec<JoinHandle<()>> = sensors.into_iter().map(spawn_publisher).collect();

    tracing::info!("Press Ctrl+C to stop...");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("Received Ctrl+C, shutting down...");

    for task in refresh_tasks.iter().chain(publish_tasks.iter()) {
        task.abort();
    }

    Ok(())
}

fn spawn_refresh<T: Send + Sync + 'static>(coordinator: Arc<RefreshCoordinator<T>>) -> JoinHandle<()> {
    tracing::info!(
        "  🔄 {}: every {} min",
        coordinator.name(),
        coordinator.interval().as_secs() / 60
    );
    coordinator.spawn_periodic()
}

/// Log the sensor's value every time its data source refreshes
fn spawn_publisher(sensor: Arc<dyn Sensor>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut updates = sensor.updates();

        while updates.changed().await.is_ok() {
            updates.borrow_and_update();

            match sensor.native_value() {
                Some(value) => tracing::info!(
                    sensor = %sensor.unique_id(),
                    "{} = {} {}",
                    sensor.name(),
                    value,
                    sensor.unit()
                ),
                None => tracing::debug!(sensor = %sensor.unique_id(), "No value yet"),
            }
        }
    })
}

async fn buy_and_sell(
    market_data: Arc<MarketData>,
    settings: &Settings,
    symbol: &str,
    buy_percentage: f64,
    sell_profit: f64,
) -> anyhow::Result<()> {
    let symbol = MarketSymbol::parse(symbol)?;
    let request = BuyAndSellRequest::new(symbol, buy_percentage, sell_profit)?;

    market_data
        .tickers_coordinator()
        .ensure_fresh()
        .await
        .context("Failed to load tickers")?;

    let service = BuyAndSellService::new(market_data.clone())
        .with_poll_interval(settings.fill_poll_interval())
        .with_max_fill_polls(settings.max_fill_polls);

    let outcome = service
        .execute(&request)
        .await
        .context("Buy and sell failed")?;

    let symbol = request.symbol();
    tracing::info!(
        "Bought {} {} (order {}), selling at {} {} (order {})",
        outcome.buy_order.filled,
        symbol.base(),
        outcome.buy_order.id,
        market_data.rounded_price(outcome.sell_price, symbol),
        symbol.quote(),
        outcome.sell_order.id
    );

    Ok(())
}
