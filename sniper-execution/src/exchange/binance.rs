use crate::account::{Account, OpenOrder};
use crate::balance::BalanceStore;
use crate::error::ExecutionError;
use crate::signing::hmac_sha256_hex;
use crate::ticker_store::TickerStore;
use crate::trade_exchange::{account_snapshot, new_account_list, remove_account_by_label, AccountList, TradeExchange};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use sniper_instrument::{Balance, ConcatPair, Credential, MakePair, Ticker};
use sniper_integration::http::{HttpClient, OutputFormat};
use sniper_integration::websocket::{self, WsMessage};
use sniper_integration::AlertSender;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const REST_BASE: &str = "https://api.binance.com";
const WS_BASE: &str = "wss://stream.binance.com:9443/ws";
const LISTEN_KEY_KEEPALIVE: Duration = Duration::from_secs(5 * 60);

/// Binance: `<base><quote>` pair naming, listen-key-scoped user-data stream,
/// 6-decimal order quantization.
pub struct BinanceAccount {
    credential: Credential,
    balances: BalanceStore,
    client: HttpClient,
}

impl BinanceAccount {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            balances: BalanceStore::new(),
            client: HttpClient::new(),
        }
    }

    fn signed_query(&self, mut params: Vec<(String, String)>) -> String {
        let timestamp = chrono::Utc::now().timestamp_millis();
        params.push(("timestamp".to_string(), timestamp.to_string()));
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let signature = hmac_sha256_hex(&self.credential.api_secret, &query);
        format!("{query}&signature={signature}")
    }

    fn headers(&self) -> HashMap<String, String> {
        HashMap::from([("X-MBX-APIKEY".to_string(), self.credential.api_key.clone())])
    }

    async fn fetch_listen_key(&self) -> Result<String, ExecutionError> {
        let url = format!("{REST_BASE}/api/v3/userDataStream");
        let resp = self
            .client
            .post(&url, OutputFormat::Json, Some(self.headers()), None, None)
            .await?;
        let json = resp.as_json().ok_or_else(|| ExecutionError::AccountInit("no listenKey in response".into()))?;
        json.get("listenKey")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ExecutionError::AccountInit("no listenKey in response".into()))
    }

    async fn keepalive_listen_key(&self, listen_key: &str) -> Result<(), ExecutionError> {
        let url = format!("{REST_BASE}/api/v3/userDataStream?listenKey={listen_key}");
        self.client
            .post(&url, OutputFormat::Json, Some(self.headers()), None, None)
            .await?;
        Ok(())
    }

    async fn seed_balances(&self) -> Result<(), ExecutionError> {
        let query = self.signed_query(vec![]);
        let url = format!("{REST_BASE}/api/v3/account?{query}");
        let resp = self
            .client
            .get(&url, OutputFormat::Json, Some(self.headers()))
            .await?;
        let json = resp.as_json().ok_or_else(|| ExecutionError::AccountInit("malformed account response".into()))?;
        let balances = json
            .get("balances")
            .and_then(Value::as_array)
            .ok_or_else(|| ExecutionError::AccountInit("missing balances array".into()))?;
        for entry in balances {
            let (Some(asset), Some(free), Some(locked)) = (
                entry.get("asset").and_then(Value::as_str),
                entry.get("free").and_then(Value::as_str),
                entry.get("locked").and_then(Value::as_str),
            ) else {
                continue;
            };
            let free = Decimal::from_str(free).unwrap_or_default();
            let locked = Decimal::from_str(locked).unwrap_or_default();
            self.balances.seed(asset, Balance::new(free, locked));
        }
        Ok(())
    }
}

#[async_trait]
impl Account for BinanceAccount {
    fn credential(&self) -> &Credential {
        &self.credential
    }

    fn balances(&self) -> &BalanceStore {
        &self.balances
    }

    async fn init(&self) -> Result<(), ExecutionError> {
        info!(account = %self.label(), "init started");
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
        let query = self.signed_query(vec![
            ("symbol".to_string(), pair.to_string()),
            ("side".to_string(), "BUY".to_string()),
            ("type".to_string(), "LIMIT".to_string()),
            ("timeInForce".to_string(), "GTC".to_string()),
            ("quantity".to_string(), quantity.to_string()),
            ("price".to_string(), price.to_string()),
        ]);
        let url = format!("{REST_BASE}/api/v3/order?{query}");
        let resp = self
            .client
            .post(&url, OutputFormat::Json, Some(self.headers()), None, None)
            .await?;
        let json = resp.as_json().ok_or_else(|| ExecutionError::OrderRejected("malformed order response".into()))?;
        json.get("orderId")
            .map(|v| v.to_string())
            .ok_or_else(|| ExecutionError::OrderRejected(json.to_string()))
    }

    async fn cancel_order(&self, order: &OpenOrder) -> Result<(), ExecutionError> {
        let pair = order
            .pair
            .as_deref()
            .ok_or_else(|| ExecutionError::CancelFailed("missing pair".into()))?;
        let query = self.signed_query(vec![
            ("symbol".to_string(), pair.to_string()),
            ("orderId".to_string(), order.order_id.clone()),
        ]);
        let url = format!("{REST_BASE}/api/v3/order?{query}");
        self.client
            .post(&url, OutputFormat::Json, Some(self.headers()), None, None)
            .await?;
        Ok(())
    }

    async fn get_open_orders_id(&self) -> Result<Vec<OpenOrder>, ExecutionError> {
        let query = self.signed_query(vec![]);
        let url = format!("{REST_BASE}/api/v3/openOrders?{query}");
        let resp = self
            .client
            .get(&url, OutputFormat::Json, Some(self.headers()))
            .await?;
        let json = resp.as_json().ok_or_else(|| ExecutionError::CancelFailed("malformed openOrders response".into()))?;
        let orders = json.as_array().ok_or_else(|| ExecutionError::CancelFailed(json.to_string()))?;
        Ok(orders
            .iter()
            .filter_map(|o| {
                let order_id = o.get("orderId")?.to_string();
                let pair = o.get("symbol").and_then(Value::as_str).map(str::to_string);
                Some(OpenOrder { order_id, pair })
            })
            .collect())
    }
}

/// Runs the listen-key keepalive and user-data WS supervisor for one
/// account. Spawned once per account at wiring time; reconnects on any WS
/// error with an immediate retry, re-running the listen-key fetch each time.
pub async fn run_account_supervisor(account: Arc<BinanceAccount>) {
    loop {
        let listen_key = match account.fetch_listen_key().await {
            Ok(k) => k,
            Err(e) => {
                error!(account = %account.label(), error = %e, "failed to fetch listen key, retrying");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        let keepalive_account = account.clone();
        let keepalive_key = listen_key.clone();
        let keepalive_handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(LISTEN_KEY_KEEPALIVE).await;
                if let Err(e) = keepalive_account.keepalive_listen_key(&keepalive_key).await {
                    warn!(account = %keepalive_account.label(), error = %e, "listen key keepalive failed");
                }
            }
        });

        let url = format!("{WS_BASE}/{listen_key}");
        let mut stream = match websocket::connect(&url).await {
            Ok(s) => s,
            Err(e) => {
                error!(account = %account.label(), error = %e, "failed to open account WS, reconnecting");
                keepalive_handle.abort();
                continue;
            }
        };

        loop {
            match websocket::next_message(&mut stream).await {
                Ok(WsMessage::Text(text)) => process_account_message(&account, &text),
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

        keepalive_handle.abort();
    }
}

fn process_account_message(account: &BinanceAccount, text: &str) {
    let Ok(json) = serde_json::from_str::<Value>(text) else {
        warn!(account = %account.label(), "failed to decode account update");
        return;
    };
    match json.get("e").and_then(Value::as_str) {
        Some("outboundAccountPosition") => {
            if let Some(balances) = json.get("B").and_then(Value::as_array) {
                for entry in balances {
                    let (Some(asset), Some(free), Some(locked)) = (
                        entry.get("a").and_then(Value::as_str),
                        entry.get("f").and_then(Value::as_str),
                        entry.get("l").and_then(Value::as_str),
                    ) else {
                        continue;
                    };
                    let free = Decimal::from_str(free).unwrap_or_default();
                    let locked = Decimal::from_str(locked).unwrap_or_default();
                    account.balances().update(asset, &account.label(), Balance::new(free, locked));
                }
            }
        }
        Some("executionReport") => {
            info!(account = %account.label(), update = %text, "order execution report");
        }
        _ => {}
    }
}

/// Binance trade exchange: owns its accounts and ticker store, buys with
/// `<base><quote>` pairs.
pub struct BinanceExchange {
    buy_symbols: Vec<String>,
    buy_amounts: HashMap<String, u32>,
    markup_pct: u32,
    cancel_delay: Duration,
    accounts: AccountList,
    tickers: Arc<TickerStore>,
    alerts: AlertSender,
}

impl BinanceExchange {
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

    /// Seed the ticker store from the 24h REST snapshot.
    pub async fn seed_tickers(&self, client: &HttpClient) -> Result<(), ExecutionError> {
        let url = format!("{REST_BASE}/api/v3/ticker/24hr");
        let resp = client.get(&url, OutputFormat::Json, None).await?;
        let entries = resp
            .as_json()
            .and_then(Value::as_array)
            .ok_or_else(|| ExecutionError::AccountInit("malformed ticker snapshot".into()))?;
        for entry in entries {
            let (Some(symbol), Some(pct), Some(price)) = (
                entry.get("symbol").and_then(Value::as_str),
                entry.get("priceChangePercent").and_then(Value::as_str),
                entry.get("askPrice").and_then(Value::as_str),
            ) else {
                continue;
            };
            let pct = Decimal::from_str(pct).unwrap_or_default();
            let price = Decimal::from_str(price).unwrap_or_default();
            self.tickers.set(symbol, Ticker::new(pct, price));
        }
        Ok(())
    }
}

#[async_trait]
impl TradeExchange for BinanceExchange {
    fn name(&self) -> &str {
        "binance"
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

/// `!ticker@arr` WS reader: reconnects from scratch on close or error, no
/// resume.
pub async fn run_ticker_reader(tickers: Arc<TickerStore>) {
    const WS_TICKER_URL: &str = "wss://stream.binance.com:9443/ws/!ticker@arr";
    loop {
        let mut stream = match websocket::connect(WS_TICKER_URL).await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to open ticker WS, reconnecting");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        loop {
            match websocket::next_message(&mut stream).await {
                Ok(WsMessage::Text(text)) => {
                    let Ok(json) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    let Some(entries) = json.as_array() else { continue };
                    for entry in entries {
                        let (Some(symbol), Some(pct), Some(price)) = (
                            entry.get("s").and_then(Value::as_str),
                            entry.get("P").and_then(Value::as_str),
                            entry.get("a").and_then(Value::as_str),
                        ) else {
                            continue;
                        };
                        let pct = Decimal::from_str(pct).unwrap_or_default();
                        let price = Decimal::from_str(price).unwrap_or_default();
                        tickers.set(symbol, Ticker::new(pct, price));
                    }
                }
                Ok(WsMessage::Closed) => {
                    warn!("ticker WS closed, reconnecting");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "ticker WS error, reconnecting");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_label_includes_owner_and_exchange() {
        let account = BinanceAccount::new(Credential::new("alice", "binance", "k", "s"));
        assert_eq!(account.label(), "binance:alice");
    }
}
