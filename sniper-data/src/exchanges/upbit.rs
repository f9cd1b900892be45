use crate::error::{CheckError, PartError};
use crate::part::{TriggerAction, TriggerActions, TriggerPart};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sniper_instrument::{CoinSource, Symbol};
use sniper_integration::http::{HttpClient, OutputFormat};
use std::collections::HashSet;
use std::time::Duration;

/// One Upbit market-listing poller, parameterised by the quote currency its
/// endpoint enumerates pairs against (`KRW` or `BTC`), each with its own
/// configured `priceChangeLimit`.
pub struct UpbitMarketPart {
    client: HttpClient,
    quote: &'static str,
    delay: Duration,
    actions: TriggerActions,
    price_change_limit: Decimal,
}

impl UpbitMarketPart {
    pub fn krw(delay: Duration, price_change_limit: Decimal) -> Self {
        Self::new("KRW", delay, price_change_limit, HashSet::from([TriggerAction::Buy]))
    }

    /// BTC-quoted pairs are call-only, matching `ApiPairsBTCOnlyPart` upstream:
    /// a new BTC listing pages the on-call numbers but never places an order.
    pub fn btc(delay: Duration, price_change_limit: Decimal) -> Self {
        Self::new("BTC", delay, price_change_limit, HashSet::from([TriggerAction::Call]))
    }

    fn new(quote: &'static str, delay: Duration, price_change_limit: Decimal, actions: TriggerActions) -> Self {
        Self {
            client: HttpClient::new(),
            quote,
            delay,
            actions,
            price_change_limit,
        }
    }
}

#[async_trait]
impl TriggerPart for UpbitMarketPart {
    fn source(&self) -> CoinSource {
        CoinSource::ApiPair
    }
    fn trigger_actions(&self) -> &TriggerActions {
        &self.actions
    }
    fn delay(&self) -> Duration {
        self.delay
    }
    fn price_change_limit(&self) -> Decimal {
        self.price_change_limit
    }

    async fn get(&self) -> Result<HashSet<Symbol>, CheckError> {
        let url = "https://api.upbit.com/v1/market/all?isDetails=false";
        let resp = self.client.get(url, OutputFormat::Json, None).await;
        let resp = resp.map_err(|e| match e {
            sniper_integration::SocketError::TooManyRequests { retry_after_secs } => {
                CheckError::RateLimited { retry_after_secs }
            }
            other => CheckError::Transport(other),
        })?;
        let json = resp.as_json().ok_or_else(|| PartError::new(url, "expected JSON body".to_string()))?;
        let markets = json
            .as_array()
            .ok_or_else(|| PartError::new(url, json.to_string()))?;

        let prefix = format!("{}-", self.quote);
        let mut coins = HashSet::new();
        for market in markets {
            let Some(code) = market.get("market").and_then(|v| v.as_str()) else {
                continue;
            };
            if let Some(base) = code.strip_prefix(&prefix) {
                coins.insert(Symbol::new(base, CoinSource::ApiPair));
            }
        }
        Ok(coins)
    }
}
