use crate::account::{Account, OpenOrder};
use crate::balance::BalanceStore;
use crate::error::ExecutionError;
use crate::ticker_store::TickerStore;
use crate::trade_exchange::{account_snapshot, new_account_list, remove_account_by_label, AccountList, TradeExchange};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::Sha512;
use sniper_instrument::{Balance, Credential, DashedQuoteFirstPair, MakePair, Ticker};
use sniper_integration::http::{HttpClient, OutputFormat};
use sniper_integration::websocket::{self, WsMessage};
use sniper_integration::AlertSender;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const REST_BASE: &str = "https://api.bittrex.com/v3";
const WS_NOTIFICATIONS_URL: &str = "wss://socket-v3.bittrex.com/signalr/connect";

type HmacSha512 = Hmac<Sha512>;

/// Bittrex: `<quote>-<base>` pair naming, API v3 HMAC-SHA512 request
/// signing, SignalR-based account notifications socket.
pub struct BittrexAccount {
    credential: Credential,
    balances: BalanceStore,
    client: HttpClient,
}

impl BittrexAccount {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            balances: BalanceStore::new(),
            client: HttpClient::new(),
        }
    }

    fn signed_headers(&self, method: &str, url: &str, body: &str) -> HashMap<String, String> {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let content_hash = {
            use sha2::Digest;
            hex::encode(sha2::Sha512::digest(body.as_bytes()))
        };
        let pre_sign = format!("{timestamp}{url}{method}{content_hash}");
        let mut mac = HmacSha512::new_from_slice(self.credential.api_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(pre_sign.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        HashMap::from([
            ("Api-Key".to_string(), self.credential.api_key.clone()),
            ("Api-Timestamp".to_string(), timestamp),
            ("Api-Content-Hash".to_string(), content_hash),
            ("Api-Signature".to_string(), signature),
        ])
    }

    async fn seed_balances(&self) -> Result<(), ExecutionError> {
        let url = format!("{REST_BASE}/balances");
        let resp = self
            .client
            .get(&url, OutputFormat::Json, Some(self.signed_headers("GET", &url, "")))
            .await?;
        let balances = resp
            .as_json()
            .and_then(Value::as_array)
            .ok_or_else(|| ExecutionError::AccountInit("malformed balances response".into()))?;
        for entry in balances {
            let (Some(currency), Some(available), Some(total)) = (
                entry.get("currencySymbol").and_then(Value::as_str),
                entry.get("available").and_then(Value::as_str),
                entry.get("total").and_then(Value::as_str),
            ) else {
                continue;
            };
            let free = Decimal::from_str(available).unwrap_or_default();
            let total = Decimal::from_str(total).unwrap_or_default();
            let locked = (total - free).max(Decimal::ZERO);
            self.balances.seed(currency, Balance::new(free, locked));
        }
        Ok(())
    }
}

#[async_trait]
impl Account for BittrexAccount {
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
        let body = serde_json::json!({
            "marketSymbol": pair,
            "direction": "BUY",
            "type": "LIMIT",
            "quantity": quantity.to_string(),
            "limit": price.to_string(),
            "timeInForce": "GOOD_TIL_CANCELLED",
        })
        .to_string();
        let url = format!("{REST_BASE}/orders");
        let resp = self
            .client
            .post(&url, OutputFormat::Json, Some(self.signed_headers("POST", &url, &body)), None, None)
            .await?;
        let json = resp.as_json().ok_or_else(|| ExecutionError::OrderRejected("malformed order response".into()))?;
        json.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ExecutionError::OrderRejected(json.to_string()))
    }

    async fn cancel_order(&self, order: &OpenOrder) -> Result<(), ExecutionError> {
        let url = format!("{REST_BASE}/orders/{}", order.order_id);
        self.client
            .post(&url, OutputFormat::Json, Some(self.signed_headers("DELETE", &url, "")), None, None)
            .await?;
        Ok(())
    }

    async fn get_open_orders_id(&self) -> Result<Vec<OpenOrder>, ExecutionError> {
        let url = format!("{REST_BASE}/orders/open");
        let resp = self
            .client
            .get(&url, OutputFormat::Json, Some(self.signed_headers("GET", &url, "")))
            .await?;
        let orders = resp
            .as_json()
            .and_then(Value::as_array)
            .ok_or_else(|| ExecutionError::CancelFailed("malformed open orders response".into()))?;
        Ok(orders
            .iter()
            .filter_map(|o| {
                let order_id = o.get("id").and_then(Value::as_str)?.to_string();
                let pair = o.get("marketSymbol").and_then(Value::as_str).map(str::to_string);
                Some(OpenOrder { order_id, pair })
            })
            .collect())
    }
}

/// Bittrex's notifications socket reconnects with no backoff on any error,
/// as every account-WS supervisor in this system does.
pub async fn run_account_supervisor(account: Arc<BittrexAccount>) {
    loop {
        let mut stream = match websocket::connect(WS_NOTIFICATIONS_URL).await {
            Ok(s) => s,
            Err(e) => {
                error!(account = %account.label(), error = %e, "failed to open notifications WS, reconnecting");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        loop {
            match websocket::next_message(&mut stream).await {
                Ok(WsMessage::Text(text)) => process_notification(&account, &text),
                Ok(WsMessage::Closed) => {
                    warn!(account = %account.label(), "notifications WS closed, reconnecting");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(account = %account.label(), error = %e, "notifications WS error, reconnecting");
                    break;
                }
            }
        }
    }
}

fn process_notification(account: &BittrexAccount, text: &str) {
    let Ok(json) = serde_json::from_str::<Value>(text) else {
        warn!(account = %account.label(), "failed to decode notification");
        return;
    };
    if let Some(currency) = json.get("currencySymbol").and_then(Value::as_str) {
        let (Some(available), Some(total)) = (
            json.get("available").and_then(Value::as_str),
            json.get("total").and_then(Value::as_str),
        ) else {
            return;
        };
        let free = Decimal::from_str(available).unwrap_or_default();
        let total = Decimal::from_str(total).unwrap_or_default();
        let locked = (total - free).max(Decimal::ZERO);
        account.balances().update(currency, &account.label(), Balance::new(free, locked));
    } else {
        info!(account = %account.label(), update = %text, "order execution report");
    }
}

/// Bittrex trade exchange: owns its accounts and ticker store, buys with
/// `<quote>-<base>` pairs.
pub struct BittrexExchange {
    buy_symbols: Vec<String>,
    buy_amounts: HashMap<String, u32>,
    markup_pct: u32,
    cancel_delay: Duration,
    accounts: AccountList,
    tickers: Arc<TickerStore>,
    alerts: AlertSender,
}

impl BittrexExchange {
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

    /// Seed the ticker store from the market summaries snapshot.
    pub async fn seed_tickers(&self, client: &HttpClient) -> Result<(), ExecutionError> {
        let url = "https://bittrex.com/api/v1.1/public/getmarketsummaries".to_string();
        let resp = client.get(&url, OutputFormat::Json, None).await?;
        let entries = resp
            .as_json()
            .and_then(|j| j.get("result").cloned())
            .and_then(|r| r.as_array().cloned())
            .ok_or_else(|| ExecutionError::AccountInit("malformed market summaries".into()))?;
        for entry in &entries {
            let (Some(market), Some(ask), Some(prev_day)) = (
                entry.get("MarketName").and_then(Value::as_str),
                entry.get("Ask").and_then(Value::as_f64),
                entry.get("PrevDay").and_then(Value::as_f64),
            ) else {
                continue;
            };
            let pct = calc_price_change_pct(Decimal::try_from(ask).unwrap_or_default(), Decimal::try_from(prev_day).unwrap_or_default());
            let price = Decimal::try_from(ask).unwrap_or_default();
            self.tickers.set(&market.replace('-', ""), Ticker::new(pct, price));
        }
        Ok(())
    }
}

#[async_trait]
impl TradeExchange for BittrexExchange {
    fn name(&self) -> &str {
        "bittrex"
    }
    fn buy_symbols(&self) -> &[String] {
        &self.buy_symbols
    }
    fn make_pair(&self, base: &str, quote: &str) -> String {
        DashedQuoteFirstPair::make_pair(base, quote)
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

/// `priceChangePct = (ask/prevDay - 1) * 100`, rounded to two decimals;
/// zero if either side is zero.
fn calc_price_change_pct(ask: Decimal, prev_day: Decimal) -> Decimal {
    if ask.is_zero() || prev_day.is_zero() {
        return Decimal::ZERO;
    }
    ((ask / prev_day - Decimal::ONE) * Decimal::from(100)).round_dp(2)
}

/// Market summaries ticker reader: reconnects from scratch on close or
/// error, no resume. Bittrex has no native WS ticker push in this client,
/// so it polls the same snapshot endpoint on an interval.
pub async fn run_ticker_reader(tickers: Arc<TickerStore>, client: HttpClient) {
    const MARKET_SUMMARIES_URL: &str = "https://bittrex.com/api/v1.1/public/getmarketsummaries";
    loop {
        match client.get(MARKET_SUMMARIES_URL, OutputFormat::Json, None).await {
            Ok(resp) => {
                if let Some(entries) = resp.as_json().and_then(|j| j.get("result").cloned()).and_then(|r| r.as_array().cloned()) {
                    for entry in &entries {
                        let (Some(market), Some(ask), Some(prev_day)) = (
                            entry.get("MarketName").and_then(Value::as_str),
                            entry.get("Ask").and_then(Value::as_f64),
                            entry.get("PrevDay").and_then(Value::as_f64),
                        ) else {
                            continue;
                        };
                        let ask = Decimal::try_from(ask).unwrap_or_default();
                        let prev_day = Decimal::try_from(prev_day).unwrap_or_default();
                        let pct = calc_price_change_pct(ask, prev_day);
                        tickers.set(&market.replace('-', ""), Ticker::new(pct, ask));
                    }
                } else {
                    warn!("malformed market summaries snapshot");
                }
            }
            Err(e) => {
                error!(error = %e, "failed to poll market summaries");
            }
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
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
    fn make_pair_is_dashed_quote_first() {
        let exchange = BittrexExchange::new(HashMap::new(), 15, Duration::from_secs(15), Vec::new(), sniper_integration::alert_queue().0);
        assert_eq!(exchange.make_pair("ETH", "BTC"), "BTC-ETH");
    }
}
