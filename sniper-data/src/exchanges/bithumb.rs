use crate::error::{CheckError, PartError};
use crate::part::{TriggerAction, TriggerActions, TriggerPart};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sniper_instrument::{CoinSource, Symbol};
use sniper_integration::http::{HttpClient, OutputFormat};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

static LISTING_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([A-Za-z0-9]+)\)").expect("static regex is valid"));

const SEARCH_WORDS: &[&str] = &["상장 및"];

/// Every Bithumb part is call-only: spec §4.7 excludes Bithumb from the buy
/// fan-out, keeping it a paging-only source like Upbit's BTC market.
fn call_only() -> TriggerActions {
    HashSet::from([TriggerAction::Call])
}

/// Enumerates the wallet status endpoint's asset list (oddly keyed off a
/// single coin's page — `DASH` in the upstream scraper — but the response
/// body lists every supported asset regardless of which one is requested).
pub struct BithumbWalletsPart {
    client: HttpClient,
    delay: Duration,
    actions: TriggerActions,
    price_change_limit: Decimal,
}

impl BithumbWalletsPart {
    pub fn new(delay: Duration, price_change_limit: Decimal) -> Self {
        Self {
            client: HttpClient::new(),
            delay,
            actions: call_only(),
            price_change_limit,
        }
    }
}

#[async_trait]
impl TriggerPart for BithumbWalletsPart {
    fn source(&self) -> CoinSource {
        CoinSource::ApiWallet
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
        let url = "https://www.bithumb.com/trade/getAsset/DASH";
        let mut headers = HashMap::new();
        headers.insert("X-Requested-With".to_string(), "XMLHttpRequest".to_string());
        let resp = self.client.get(url, OutputFormat::Json, Some(headers)).await;
        let resp = resp.map_err(|e| match e {
            sniper_integration::SocketError::TooManyRequests { retry_after_secs } => {
                CheckError::RateLimited { retry_after_secs }
            }
            other => CheckError::Transport(other),
        })?;
        let json = resp.as_json().ok_or_else(|| PartError::new(url, "expected JSON body".to_string()))?;
        if json.get("error").and_then(|v| v.as_str()) != Some("0000") {
            return Err(PartError::new(url, json.to_string()).into());
        }
        let data = json
            .get("data")
            .and_then(|v| v.as_object())
            .ok_or_else(|| PartError::new(url, json.to_string()))?;

        Ok(data
            .keys()
            .map(|code| Symbol::new(code, CoinSource::ApiWallet).with_url(url.to_string()))
            .collect())
    }
}

/// Enumerates every base asset across Bithumb's live ticker (the tradeable
/// pairs), call-only like the other Bithumb parts.
pub struct BithumbPairPart {
    client: HttpClient,
    delay: Duration,
    actions: TriggerActions,
    price_change_limit: Decimal,
}

impl BithumbPairPart {
    pub fn new(delay: Duration, price_change_limit: Decimal) -> Self {
        Self {
            client: HttpClient::new(),
            delay,
            actions: call_only(),
            price_change_limit,
        }
    }
}

#[async_trait]
impl TriggerPart for BithumbPairPart {
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
        let url = "https://api.bithumb.com/public/ticker/ALL";
        let resp = self.client.get(url, OutputFormat::Json, None).await;
        let resp = resp.map_err(|e| match e {
            sniper_integration::SocketError::TooManyRequests { retry_after_secs } => {
                CheckError::RateLimited { retry_after_secs }
            }
            other => CheckError::Transport(other),
        })?;
        let json = resp.as_json().ok_or_else(|| PartError::new(url, "expected JSON body".to_string()))?;
        if json.get("status").and_then(|v| v.as_str()) != Some("0000") {
            return Err(PartError::new(url, json.to_string()).into());
        }
        let data = json
            .get("data")
            .and_then(|v| v.as_object())
            .ok_or_else(|| PartError::new(url, json.to_string()))?;

        Ok(data
            .iter()
            .filter(|(_, v)| v.is_object())
            .map(|(code, _)| Symbol::new(code, CoinSource::ApiPair).with_url(url.to_string()))
            .collect())
    }
}

/// Scrapes Bithumb's listing-notice board for titles containing "상장 및"
/// ("listing and ..."), extracting the parenthesised ticker.
pub struct BithumbAnnouncementsPart {
    client: HttpClient,
    delay: Duration,
    actions: TriggerActions,
    price_change_limit: Decimal,
}

impl BithumbAnnouncementsPart {
    pub fn new(delay: Duration, price_change_limit: Decimal) -> Self {
        Self {
            client: HttpClient::new(),
            delay,
            actions: call_only(),
            price_change_limit,
        }
    }
}

#[async_trait]
impl TriggerPart for BithumbAnnouncementsPart {
    fn source(&self) -> CoinSource {
        CoinSource::Site
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
        let url = "https://cafe.bithumb.com/boards/43/contents";
        let mut form = HashMap::new();
        form.insert("draw".to_string(), "1".to_string());
        form.insert("start".to_string(), "0".to_string());
        form.insert("length".to_string(), "15".to_string());
        let resp = self.client.post(url, OutputFormat::Json, None, Some(form), None).await;
        let resp = resp.map_err(|e| match e {
            sniper_integration::SocketError::TooManyRequests { retry_after_secs } => {
                CheckError::RateLimited { retry_after_secs }
            }
            other => CheckError::Transport(other),
        })?;
        let json = resp.as_json().ok_or_else(|| PartError::new(url, "expected JSON body".to_string()))?;
        let rows = json
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| PartError::new(url, json.to_string()))?;

        let mut coins = HashSet::new();
        for row in rows {
            let Some(title) = row.get(2).and_then(|v| v.as_str()) else {
                continue;
            };
            if !SEARCH_WORDS.iter().any(|w| title.contains(w)) {
                continue;
            }
            for capture in LISTING_SYMBOL.captures_iter(title) {
                coins.insert(Symbol::new(capture[1].to_uppercase(), CoinSource::Site).with_url(url.to_string()));
            }
        }
        Ok(coins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallets_and_pairs_are_call_only() {
        let wallets = BithumbWalletsPart::new(Duration::from_secs(60), Decimal::from(25));
        let pairs = BithumbPairPart::new(Duration::from_secs(60), Decimal::from(25));
        let announcements = BithumbAnnouncementsPart::new(Duration::from_secs(3), Decimal::from(25));
        assert_eq!(wallets.trigger_actions(), &call_only());
        assert_eq!(pairs.trigger_actions(), &call_only());
        assert_eq!(announcements.trigger_actions(), &call_only());
    }
}
