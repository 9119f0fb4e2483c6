use crate::api::Exchange;
use crate::error::{Error, Result};
use crate::models::{
    Balance, Candle, MarketInfo, MarketSymbol, Order, OrderSide, OrderStatus, Ticker, Tickers,
    Timeframe,
};
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const CRYPTOCOM_API_BASE: &str = "https://api.crypto.com/v2";
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(200);
const REQUEST_TIMEOUT_SECS: u64 = 20;
const MAX_RETRIES: u32 = 3;
const PARAMS_MAX_LEVEL: usize = 3;

type HmacSha256 = Hmac<Sha256>;

type CryptoComRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// API key pair for the private endpoints
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Crypto.com Exchange REST client
///
/// Cloneable; all clones share one rate limiter, so every coordinator and the
/// order workflow draw from the same request budget.
#[derive(Clone)]
pub struct CryptoComClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    rate_limiter: Arc<CryptoComRateLimiter>,
    request_id: Arc<AtomicU64>,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    result: Option<T>,
}

/// The API mixes JSON numbers and numeric strings between versions
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Number {
    Float(f64),
    Text(String),
}

impl Number {
    fn value(&self) -> Option<f64> {
        match self {
            Number::Float(v) => Some(*v),
            Number::Text(s) => s.parse().ok(),
        }
    }
}

fn number(field: &Option<Number>) -> Option<f64> {
    field.as_ref().and_then(Number::value)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OrderId {
    Text(String),
    Int(u64),
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderId::Text(s) => f.write_str(s),
            OrderId::Int(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InstrumentsResult {
    instruments: Vec<RawInstrument>,
}

#[derive(Debug, Deserialize)]
struct RawInstrument {
    base_currency: String,
    quote_currency: String,
    price_decimals: i32,
    #[serde(default)]
    quantity_decimals: i32,
}

#[derive(Debug, Deserialize)]
struct TickerResult {
    data: OneOrMany<RawTicker>,
}

/// Field names are the exchange's single-letter abbreviations
#[derive(Debug, Deserialize)]
struct RawTicker {
    i: String,         // instrument name
    a: Option<Number>, // latest trade price
    #[serde(default)]
    b: Option<Number>,
    #[serde(default)]
    k: Option<Number>,
    #[serde(default)]
    h: Option<Number>,
    #[serde(default)]
    l: Option<Number>,
    #[serde(default)]
    v: Option<Number>,
    #[serde(default)]
    t: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CandlestickResult {
    data: Vec<RawCandle>,
}

#[derive(Debug, Deserialize)]
struct RawCandle {
    t: i64,
    o: Number,
    h: Number,
    l: Number,
    c: Number,
    v: Number,
}

#[derive(Debug, Deserialize)]
struct AccountSummaryResult {
    accounts: Vec<RawAccount>,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    currency: String,
    balance: Number,
    available: Number,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResult {
    order_id: OrderId,
    #[serde(default)]
    client_oid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderDetailResult {
    order_info: RawOrder,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    order_id: OrderId,
    #[serde(default)]
    client_oid: Option<String>,
    instrument_name: String,
    side: String,
    status: String,
    #[serde(default)]
    cumulative_quantity: Option<Number>,
    #[serde(default)]
    avg_price: Option<Number>,
    #[serde(default)]
    price: Option<Number>,
}

// ============== Conversions ==============

fn instrument_name(symbol: &MarketSymbol) -> String {
    format!("{}_{}", symbol.base(), symbol.quote())
}

fn wire_form_of(instrument: &str) -> Option<String> {
    MarketSymbol::parse(instrument).ok().map(|s| s.wire_form())
}

fn order_status(raw: &str) -> OrderStatus {
    match raw {
        "ACTIVE" => OrderStatus::Open,
        "FILLED" => OrderStatus::Closed,
        "CANCELED" => OrderStatus::Canceled,
        "REJECTED" => OrderStatus::Rejected,
        "EXPIRED" => OrderStatus::Expired,
        other => OrderStatus::Other(other.to_string()),
    }
}

impl RawTicker {
    fn into_ticker(self) -> Option<Ticker> {
        let symbol = wire_form_of(&self.i)?;
        let last = number(&self.a)?;
        Some(Ticker {
            symbol,
            last,
            bid: number(&self.b),
            ask: number(&self.k),
            high: number(&self.h),
            low: number(&self.l),
            volume: number(&self.v),
            timestamp: self.t.and_then(DateTime::<Utc>::from_timestamp_millis),
        })
    }
}

impl RawCandle {
    fn into_candle(self) -> Option<Candle> {
        Some(Candle {
            timestamp: DateTime::<Utc>::from_timestamp_millis(self.t)?,
            open: self.o.value()?,
            high: self.h.value()?,
            low: self.l.value()?,
            close: self.c.value()?,
            volume: self.v.value()?,
        })
    }
}

impl RawOrder {
    fn into_order(self) -> Order {
        let side = if self.side.eq_ignore_ascii_case("SELL") {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        let price = number(&self.avg_price)
            .filter(|p| *p > 0.0)
            .or_else(|| number(&self.price).filter(|p| *p > 0.0));

        Order {
            id: self.order_id.to_string(),
            client_oid: self.client_oid.filter(|oid| !oid.is_empty()),
            symbol: wire_form_of(&self.instrument_name).unwrap_or(self.instrument_name),
            side,
            status: order_status(&self.status),
            filled: number(&self.cumulative_quantity).unwrap_or(0.0),
            price,
        }
    }
}

// ============== Signing ==============

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Flatten request params the way the exchange does before signing:
/// keys in ascending order, each followed by its value, nested lists recursed.
pub fn params_to_string(params: &Value, level: usize) -> String {
    if level >= PARAMS_MAX_LEVEL {
        return value_to_string(params);
    }

    match params {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut out = String::new();
            for key in keys {
                out.push_str(key);
                match &map[key] {
                    Value::Array(items) => {
                        for item in items {
                            out.push_str(&params_to_string(item, level + 1));
                        }
                    }
                    other => out.push_str(&value_to_string(other)),
                }
            }
            out
        }
        other => value_to_string(other),
    }
}

/// Hex HMAC-SHA256 of `method + id + api_key + params + nonce`
pub fn sign_request(
    secret: &str,
    method: &str,
    id: u64,
    api_key: &str,
    params: &Value,
    nonce: i64,
) -> Result<String> {
    let payload = format!(
        "{}{}{}{}{}",
        method,
        id,
        api_key,
        params_to_string(params, 0),
        nonce
    );

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Config(format!("invalid API secret: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

// ============== Implementation ==============

impl CryptoComClient {
    /// Create a client; `credentials` of `None` gives a public-only client.
    pub fn new(
        base_url: impl Into<String>,
        credentials: Option<Credentials>,
        rate_limit: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let quota = Quota::with_period(rate_limit)
            .ok_or_else(|| Error::Config("rate limit period must be non-zero".to_string()))?;

        let base_url: String = base_url.into();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Send a request, waiting on the shared rate limiter before every attempt.
    ///
    /// 429s are always retried; transport errors and 5xx only when `idempotent`.
    async fn execute<T, F>(&self, method: &str, idempotent: bool, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.rate_limiter.until_ready().await;

            let response = match build().send().await {
                Ok(response) => response,
                Err(e) if idempotent && attempt < MAX_RETRIES => {
                    let backoff_secs = 2u64.pow(attempt);
                    tracing::warn!(
                        "Network error on {}: {}, retrying in {}s (attempt {}/{})",
                        method,
                        e,
                        backoff_secs,
                        attempt,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    continue;
                }
                Err(e) => return Err(Error::fetch(method, e)),
            };

            let status = response.status();
            let retryable = status == StatusCode::TOO_MANY_REQUESTS
                || (idempotent && status.is_server_error());
            if retryable && attempt < MAX_RETRIES {
                let backoff_secs = 2u64.pow(attempt);
                tracing::warn!(
                    "{} from Crypto.com on {}, backing off for {}s (attempt {}/{})",
                    status,
                    method,
                    backoff_secs,
                    attempt,
                    MAX_RETRIES
                );
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                continue;
            }

            let body = response
                .text()
                .await
                .map_err(|e| Error::fetch(method, e))?;
            return decode(method, status, &body);
        }
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, method);
        tracing::debug!(method, "GET {}", url);
        self.execute(method, true, || self.client.get(&url).query(query))
            .await
    }

    async fn private_post<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let credentials =
            self.credentials
                .as_ref()
                .ok_or_else(|| Error::CredentialsRequired {
                    operation: method.to_string(),
                })?;

        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let nonce = Utc::now().timestamp_millis();
        let sig = sign_request(
            &credentials.secret,
            method,
            id,
            &credentials.api_key,
            &params,
            nonce,
        )?;

        let body = json!({
            "id": id,
            "method": method,
            "api_key": credentials.api_key,
            "params": params,
            "nonce": nonce,
            "sig": sig,
        });

        let url = format!("{}/{}", self.base_url, method);
        tracing::debug!(method, id, "POST {}", url);
        self.execute(method, false, || self.client.post(&url).json(&body))
            .await
    }

    async fn create_order(
        &self,
        symbol: &MarketSymbol,
        side: OrderSide,
        params: Value,
    ) -> Result<Order> {
        let result: CreateOrderResult = self.private_post("private/create-order", params).await?;

        Ok(Order {
            id: result.order_id.to_string(),
            client_oid: result.client_oid.filter(|oid| !oid.is_empty()),
            symbol: symbol.wire_form(),
            side,
            status: OrderStatus::Open,
            filled: 0.0,
            price: None,
        })
    }
}

fn decode<T: DeserializeOwned>(method: &str, status: StatusCode, body: &str) -> Result<T> {
    let envelope: ApiResponse<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(Error::fetch(method, format!("HTTP {}: {}", status, body)));
        }
        Err(e) => {
            return Err(Error::fetch(
                method,
                format!("failed to decode response: {}", e),
            ));
        }
    };

    if envelope.code != 0 {
        return Err(Error::Exchange {
            method: method.to_string(),
            code: envelope.code,
            message: envelope
                .message
                .unwrap_or_else(|| "no message".to_string()),
        });
    }

    if !status.is_success() {
        return Err(Error::fetch(method, format!("HTTP {}: {}", status, body)));
    }

    envelope
        .result
        .ok_or_else(|| Error::fetch(method, "response has no result"))
}

#[async_trait::async_trait]
impl Exchange for CryptoComClient {
    async fn fetch_markets(&self) -> Result<Vec<MarketInfo>> {
        let result: InstrumentsResult = self.public_get("public/get-instruments", &[]).await?;

        let markets: Vec<MarketInfo> = result
            .instruments
            .into_iter()
            .map(|raw| MarketInfo {
                symbol: format!("{}/{}", raw.base_currency, raw.quote_currency),
                base: raw.base_currency,
                quote: raw.quote_currency,
                price_step: 10f64.powi(-raw.price_decimals),
                quantity_step: 10f64.powi(-raw.quantity_decimals),
            })
            .collect();

        tracing::debug!("Found {} markets on crypto.com exchange", markets.len());
        Ok(markets)
    }

    async fn fetch_ticker(&self, symbol: &MarketSymbol) -> Result<Ticker> {
        let result: TickerResult = self
            .public_get(
                "public/get-ticker",
                &[("instrument_name", instrument_name(symbol))],
            )
            .await?;

        let wire = symbol.wire_form();
        result
            .data
            .into_vec()
            .into_iter()
            .filter_map(RawTicker::into_ticker)
            .find(|ticker| ticker.symbol == wire)
            .ok_or_else(|| Error::fetch("public/get-ticker", format!("no ticker for {}", wire)))
    }

    async fn fetch_tickers(&self) -> Result<Tickers> {
        let result: TickerResult = self.public_get("public/get-ticker", &[]).await?;

        let tickers: Tickers = result
            .data
            .into_vec()
            .into_iter()
            .filter_map(RawTicker::into_ticker)
            .map(|ticker| (ticker.symbol.clone(), ticker))
            .collect();

        tracing::debug!("Fetched {} tickers", tickers.len());
        Ok(tickers)
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &MarketSymbol,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>> {
        let result: CandlestickResult = self
            .public_get(
                "public/get-candlestick",
                &[
                    ("instrument_name", instrument_name(symbol)),
                    ("timeframe", timeframe.as_str().to_string()),
                ],
            )
            .await?;

        let mut candles: Vec<Candle> = result
            .data
            .into_iter()
            .filter_map(RawCandle::into_candle)
            .collect();
        candles.sort_by_key(|candle| candle.timestamp);

        tracing::debug!(
            symbol = %symbol,
            timeframe = %timeframe,
            "Fetched {} candles",
            candles.len()
        );
        Ok(candles)
    }

    async fn fetch_balance(&self) -> Result<Balance> {
        let result: AccountSummaryResult = self
            .private_post("private/get-account-summary", json!({}))
            .await?;

        let mut balance = Balance::default();
        for account in result.accounts {
            let total = account.balance.value().unwrap_or(0.0);
            let free = account.available.value().unwrap_or(0.0);
            balance.total.insert(account.currency.clone(), total);
            balance.free.insert(account.currency, free);
        }

        Ok(balance)
    }

    async fn create_market_buy_order(&self, symbol: &MarketSymbol, amount: f64) -> Result<Order> {
        let params = json!({
            "instrument_name": instrument_name(symbol),
            "side": OrderSide::Buy.as_str(),
            "type": "MARKET",
            "quantity": amount.to_string(),
        });

        self.create_order(symbol, OrderSide::Buy, params).await
    }

    async fn create_limit_sell_order(
        &self,
        symbol: &MarketSymbol,
        amount: f64,
        price: f64,
        client_oid: Option<&str>,
    ) -> Result<Order> {
        let mut params = json!({
            "instrument_name": instrument_name(symbol),
            "side": OrderSide::Sell.as_str(),
            "type": "LIMIT",
            "price": price.to_string(),
            "quantity": amount.to_string(),
        });
        if let (Some(oid), Some(map)) = (client_oid, params.as_object_mut()) {
            map.insert("client_oid".to_string(), Value::String(oid.to_string()));
        }

        self.create_order(symbol, OrderSide::Sell, params).await
    }

    async fn fetch_order(&self, id: &str) -> Result<Order> {
        let result: OrderDetailResult = self
            .private_post("private/get-order-detail", json!({ "order_id": id }))
            .await?;

        Ok(result.order_info.into_order())
    }

    fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }
}
