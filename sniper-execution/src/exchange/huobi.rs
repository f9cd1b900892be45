use crate::account::{Account, OpenOrder};
use crate::balance::BalanceStore;
use crate::error::ExecutionError;
use crate::signing::hmac_sha256_hex;
use crate::ticker_store::TickerStore;
use crate::trade_exchange::{account_snapshot, new_account_list, remove_account_by_label, AccountList, TradeExchange};
use async_trait::async_trait;
use base64::Engine;
use flate2::read::GzDecoder;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::Value;
use sniper_instrument::{Balance, ConcatPair, Credential, MakePair, PriceFilter, Ticker};
use sniper_integration::http::{HttpClient, OutputFormat};
use sniper_integration::websocket::{self, send_pong, WsMessage};
use sniper_integration::AlertSender;
use std::collections::HashMap;
use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const REST_BASE: &str = "https://api.huobi.pro";
const WS_BASE: &str = "wss://api.huobi.pro/ws/v2";

/// Huobi: `<base><quote>` pair naming (uppercased), gzip-compressed WS
/// frames with application-level ping/pong, and price-filter quantization
/// sourced from `/v1/common/symbols`.
pub struct HuobiAccount {
    credential: Credential,
    balances: BalanceStore,
    client: HttpClient,
    price_filters: RwLock<HashMap<String, PriceFilter>>,
}

impl HuobiAccount {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            balances: BalanceStore::new(),
            client: HttpClient::new(),
            price_filters: RwLock::new(HashMap::new()),
        }
    }

    pub fn price_filter(&self, pair: &str) -> Option<PriceFilter> {
        self.price_filters.read().get(pair).copied()
    }

    /// Populate from `/v1/common/symbols`. Called once at init and then
    /// hourly by a supervised refresh loop.
    pub async fn refresh_price_filters(&self) -> Result<(), ExecutionError> {
        let url = format!("{REST_BASE}/v1/common/symbols");
        let resp = self.client.get(&url, OutputFormat::Json, None).await?;
        let entries = resp
            .as_json()
            .and_then(|j| j.get("data"))
            .and_then(Value::as_array)
            .ok_or_else(|| ExecutionError::AccountInit("malformed symbols response".into()))?;

        let mut filters = HashMap::new();
        for entry in entries {
            let (Some(symbol), Some(price_precision), Some(amount_precision)) = (
                entry.get("symbol").and_then(Value::as_str),
                entry.get("price-precision").and_then(Value::as_u64),
                entry.get("amount-precision").and_then(Value::as_u64),
            ) else {
                continue;
            };
            filters.insert(
                symbol.to_uppercase(),
                PriceFilter::new(price_precision as u32, amount_precision as u32),
            );
        }
        *self.price_filters.write() = filters;
        Ok(())
    }

    fn signed_query(&self, method: &str, host: &str, path: &str) -> String {
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        let mut params = vec![
            ("AccessKeyId".to_string(), self.credential.api_key.clone()),
            ("SignatureMethod".to_string(), "HmacSHA256".to_string()),
            ("SignatureVersion".to_string(), "2".to_string()),
            ("Timestamp".to_string(), timestamp),
        ];
        params.sort();
        let canonical = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let payload = format!("{method}\n{host}\n{path}\n{canonical}");
        let signature = base64::engine::general_purpose::STANDARD
            .encode(hmac_sha256_hex(&self.credential.api_secret, &payload).as_bytes());
        format!("{canonical}&Signature={}", urlencode(&signature))
    }

    async fn account_id(&self) -> Result<String, ExecutionError> {
        let host = "api.huobi.pro";
        let path = "/v1/account/accounts";
        let query = self.signed_query("GET", host, path);
        let url = format!("{REST_BASE}{path}?{query}");
        let resp = self.client.get(&url, OutputFormat::Json, None).await?;
        let data = resp
            .as_json()
            .and_then(|j| j.get("data"))
            .and_then(Value::as_array)
            .ok_or_else(|| ExecutionError::AccountInit("malformed accounts response".into()))?;
        data.iter()
            .find(|a| a.get("type").and_then(Value::as_str) == Some("spot"))
            .and_then(|a| a.get("id"))
            .map(|id| id.to_string())
            .ok_or_else(|| ExecutionError::AccountInit("no spot account id".into()))
    }

    async fn seed_balances(&self) -> Result<(), ExecutionError> {
        let account_id = self.account_id().await?;
        let host = "api.huobi.pro";
        let path = format!("/v1/account/accounts/{account_id}/balance");
        let query = self.signed_query("GET", host, &path);
        let url = format!("{REST_BASE}{path}?{query}");
        let resp = self.client.get(&url, OutputFormat::Json, None).await?;
        let list = resp
            .as_json()
            .and_then(|j| j.get("data"))
            .and_then(|d| d.get("list"))
            .and_then(Value::as_array)
            .ok_or_else(|| ExecutionError::AccountInit("malformed balance response".into()))?;

        let mut by_asset: HashMap<String, (Decimal, Decimal)> = HashMap::new();
        for entry in list {
            let (Some(currency), Some(ty), Some(balance)) = (
                entry.get("currency").and_then(Value::as_str),
                entry.get("type").and_then(Value::as_str),
                entry.get("balance").and_then(Value::as_str),
            ) else {
                continue;
            };
            let amount = Decimal::from_str(balance).unwrap_or_default();
            let slot = by_asset.entry(currency.to_uppercase()).or_default();
            match ty {
                "trade" => slot.0 += amount,
                "frozen" => slot.1 += amount,
                _ => {}
            }
        }
        for (asset, (free, locked)) in by_asset {
            self.balances.seed(asset, Balance::new(free, locked));
        }
        Ok(())
    }
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[async_trait]
impl Account for HuobiAccount {
    fn credential(&self) -> &Credential {
        &self.credential
    }

    fn balances(&self) -> &BalanceStore {
        &self.balances
    }

    async fn init(&self) -> Result<(), ExecutionError> {
        info!(account = %self.label(), "init started");
        self.refresh_price_filters().await?;
        self.seed_balances().await?;
        info!(account = %self.label(), "init finished");
        Ok(())
    }

    async fn create_buy_order(
        &self,
        pair: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<String, ExecutionError> {
        let account_id = self.account_id().await?;
        let body = serde_json::json!({
            "account-id": account_id,
            "symbol": pair.to_lowercase(),
            "type": "buy-limit",
            "amount": quantity.to_string(),
            "price": price.to_string(),
        });
        let host = "api.huobi.pro";
        let path = "/v1/order/orders/place";
        let query = self.signed_query("POST", host, path);
        let url = format!("{REST_BASE}{path}?{query}");
        let mut form = HashMap::new();
        form.insert("body".to_string(), body.to_string());
        let resp = self
            .client
            .post(&url, OutputFormat::Json, None, Some(form), None)
            .await?;
        resp.as_json()
            .and_then(|j| j.get("data"))
            .map(|v| v.to_string())
            .ok_or_else(|| ExecutionError::OrderRejected("malformed order response".into()))
    }

    async fn cancel_order(&self, order: &OpenOrder) -> Result<(), ExecutionError> {
        let host = "api.huobi.pro";
        let path = format!("/v1/order/orders/{}/submitcancel", order.order_id);
        let query = self.signed_query("POST", host, &path);
        let url = format!("{REST_BASE}{path}?{query}");
        self.client.post(&url, OutputFormat::Json, None, None, None).await?;
        Ok(())
    }

    async fn get_open_orders_id(&self) -> Result<Vec<OpenOrder>, ExecutionError> {
        let host = "api.huobi.pro";
        let path = "/v1/order/openOrders";
        let query = self.signed_query("GET", host, path);
        let url = format!("{REST_BASE}{path}?{query}");
        let resp = self.client.get(&url, OutputFormat::Json, None).await?;
        let orders = resp
            .as_json()
            .and_then(|j| j.get("data"))
            .and_then(Value::as_array)
            .ok_or_else(|| ExecutionError::CancelFailed("malformed open orders response".into()))?;
        Ok(orders
            .iter()
            .filter_map(|o| {
                let order_id = o.get("id")?.to_string();
                let pair = o.get("symbol").and_then(Value::as_str).map(str::to_string);
                Some(OpenOrder { order_id, pair })
            })
            .collect())
    }

    fn price_filter(&self, pair: &str) -> Option<PriceFilter> {
        HuobiAccount::price_filter(self, pair)
    }
}

fn decode_gzip(bytes: &[u8]) -> Option<String> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = String::new();
    decoder.read_to_string(&mut out).ok()?;
    Some(out)
}

pub async fn run_account_supervisor(account: Arc<HuobiAccount>) {
    loop {
        let mut stream = match websocket::connect(WS_BASE).await {
            Ok(s) => s,
            Err(e) => {
                error!(account = %account.label(), error = %e, "failed to open account WS, reconnecting");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        loop {
            match websocket::next_message(&mut stream).await {
                Ok(WsMessage::Binary(bytes)) => {
                    let Some(text) = decode_gzip(&bytes) else {
                        warn!(account = %account.label(), "failed to gunzip frame");
                        continue;
                    };
                    if let Some(ts) = extract_ping_ts(&text) {
                        let pong = format!("{{\"pong\":{ts}}}");
                        if let Err(e) = sniper_integration::websocket::send_text(&mut stream, pong).await {
                            warn!(account = %account.label(), error = %e, "failed to send pong");
                        }
                        continue;
                    }
                    process_account_message(&account, &text);
                }
                Ok(WsMessage::Ping(payload)) => {
                    let _ = send_pong(&mut stream, payload).await;
                }
                Ok(WsMessage::Closed) => {
                    warn!(account = %account.label(), "account WS closed, reconnecting");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(account = %account.label(), error = %e, "account WS error, reconnecting");
                    break;
                }
            }
        }
    }
}

fn extract_ping_ts(text: &str) -> Option<i64> {
    let json: Value = serde_json::from_str(text).ok()?;
    json.get("ping").and_then(Value::as_i64)
}

fn process_account_message(account: &HuobiAccount, text: &str) {
    let Ok(json) = serde_json::from_str::<Value>(text) else {
        warn!(account = %account.label(), "failed to decode account update");
        return;
    };
    match json.get("action").and_then(Value::as_str) {
        Some("push") => {
            let topic = json.get("ch").and_then(Value::as_str).unwrap_or("");
            if topic.contains("accounts") {
                // Treat as a full balance-map replacement for the named
                // asset, not an accumulate-in-place merge.
                if let Some(data) = json.get("data") {
                    let (Some(currency), Some(balance)) = (
                        data.get("currency").and_then(Value::as_str),
                        data.get("balance").and_then(Value::as_str),
                    ) else {
                        return;
                    };
                    let amount = Decimal::from_str(balance).unwrap_or_default();
                    let ty = data.get("changeType").and_then(Value::as_str).unwrap_or("");
                    let (free, locked) = if ty.contains("frozen") {
                        (Decimal::ZERO, amount)
                    } else {
                        (amount, Decimal::ZERO)
                    };
                    account
                        .balances()
                        .update(currency.to_uppercase(), &account.label(), Balance::new(free, locked));
                }
            } else if topic.contains("orders") {
                info!(account = %account.label(), update = %text, "order execution report");
            }
        }
        _ => {}
    }
}

/// Huobi trade exchange: owns its accounts and ticker store, buys with
/// `<base><quote>` pairs.
pub struct HuobiExchange {
    buy_symbols: Vec<String>,
    buy_amounts: HashMap<String, u32>,
    markup_pct: u32,
    cancel_delay: Duration,
    accounts: AccountList,
    tickers: Arc<TickerStore>,
    alerts: AlertSender,
}

impl HuobiExchange {
    pub fn new(
        buy_amounts: HashMap<String, u32>,
        markup_pct: u32,
        cancel_delay: Duration,
        accounts: Vec<Arc<dyn Account>>,
        alerts: AlertSender,
    ) -> Self {
        Self {
            buy_symbols: buy_amounts.keys().cloned().collect(),
            buy_amounts,
            markup_pct,
            cancel_delay,
            accounts: new_account_list(accounts),
            tickers: Arc::new(TickerStore::new()),
            alerts,
        }
    }

    /// Seed the ticker store from the `/market/tickers` batch snapshot.
    pub async fn seed_tickers(&self, client: &HttpClient) -> Result<(), ExecutionError> {
        apply_ticker_snapshot(client, &self.tickers).await
    }
}

#[async_trait]
impl TradeExchange for HuobiExchange {
    fn name(&self) -> &str {
        "huobi"
    }
    fn buy_symbols(&self) -> &[String] {
        &self.buy_symbols
    }
    fn make_pair(&self, base: &str, quote: &str) -> String {
        ConcatPair::make_pair(base, quote)
    }
    fn ticker_store(&self) -> &Arc<TickerStore> {
        &self.tickers
    }
    fn accounts(&self) -> Vec<Arc<dyn Account>> {
        account_snapshot(&self.accounts)
    }
    fn remove_account(&self, label: &str) {
        remove_account_by_label(&self.accounts, label);
    }
    fn buy_amount_pct(&self, quote_asset: &str) -> u32 {
        self.buy_amounts.get(quote_asset).copied().unwrap_or(0)
    }
    fn markup_pct(&self) -> u32 {
        self.markup_pct
    }
    fn cancel_delay(&self) -> Duration {
        self.cancel_delay
    }
    fn alerts(&self) -> &AlertSender {
        &self.alerts
    }
}

/// `priceChangePct = (close/open - 1) * 100`, rounded to two decimals;
/// zero if either side is zero.
fn calc_price_change_pct(close: Decimal, open: Decimal) -> Decimal {
    if close.is_zero() || open.is_zero() {
        return Decimal::ZERO;
    }
    ((close / open - Decimal::ONE) * Decimal::from(100)).round_dp(2)
}

async fn apply_ticker_snapshot(client: &HttpClient, tickers: &TickerStore) -> Result<(), ExecutionError> {
    let url = format!("{REST_BASE}/market/tickers");
    let resp = client.get(&url, OutputFormat::Json, None).await?;
    let entries = resp
        .as_json()
        .and_then(|j| j.get("data").cloned())
        .and_then(|d| d.as_array().cloned())
        .ok_or_else(|| ExecutionError::AccountInit("malformed tickers snapshot".into()))?;
    for entry in &entries {
        let (Some(symbol), Some(close), Some(open)) = (
            entry.get("symbol").and_then(Value::as_str),
            entry.get("close").and_then(Value::as_f64),
            entry.get("open").and_then(Value::as_f64),
        ) else {
            continue;
        };
        let close = Decimal::try_from(close).unwrap_or_default();
        let open = Decimal::try_from(open).unwrap_or_default();
        let pct = calc_price_change_pct(close, open);
        tickers.set(symbol.to_uppercase(), Ticker::new(pct, close));
    }
    Ok(())
}

/// `/market/tickers` polling reader: Huobi has no all-market WS push
/// equivalent to Binance's `!ticker@arr`, so the ticker store is refreshed
/// on an interval from the REST batch snapshot.
pub async fn run_ticker_reader(tickers: Arc<TickerStore>, client: HttpClient) {
    loop {
        if let Err(e) = apply_ticker_snapshot(&client, &tickers).await {
            error!(error = %e, "failed to refresh ticker snapshot");
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
    }
}

/// Hourly price-filter refresh, supervised: re-pulls `/v1/common/symbols`
/// so quantization tracks exchange-side precision changes.
pub async fn run_price_filter_refresh(account: Arc<HuobiAccount>) {
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        if let Err(e) = account.refresh_price_filters().await {
            error!(account = %account.label(), error = %e, "failed to refresh price filters");
        }
    }
}

#[cfg(test)]
mod exchange_tests {
    use super::*;

    #[test]
    fn price_change_pct_matches_formula() {
        let pct = calc_price_change_pct(Decimal::new(110, 0), Decimal::new(100, 0));
        assert_eq!(pct, Decimal::new(1000, 2));
    }

    #[test]
    fn price_change_pct_zero_when_either_side_zero() {
        assert_eq!(calc_price_change_pct(Decimal::ZERO, Decimal::new(100, 0)), Decimal::ZERO);
        assert_eq!(calc_price_change_pct(Decimal::new(100, 0), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn make_pair_is_concatenated() {
        let exchange = HuobiExchange::new(HashMap::new(), 15, Duration::from_secs(15), Vec::new(), sniper_integration::alert_queue().0);
        assert_eq!(exchange.make_pair("eth", "usdt"), "ETHUSDT");
    }
}
