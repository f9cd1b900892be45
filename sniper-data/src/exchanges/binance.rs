use crate::error::{CheckError, PartError};
use crate::part::{TriggerAction, TriggerActions, TriggerPart};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sniper_instrument::{CoinSource, Symbol};
use sniper_integration::http::{HttpClient, OutputFormat};
use std::collections::HashSet;
use std::time::Duration;

static ANNOUNCEMENT_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([A-Za-z0-9]+)\)").expect("static regex is valid"));

const LISTING_KEYWORDS: &[&str] = &["will list", "lists", "listing"];

fn shared_actions() -> TriggerActions {
    HashSet::from([TriggerAction::Buy])
}

/// Enumerates every asset in Binance's public wallet status endpoint.
pub struct BinanceWalletPart {
    client: HttpClient,
    delay: Duration,
    actions: TriggerActions,
    price_change_limit: Decimal,
}

impl BinanceWalletPart {
    pub fn new(delay: Duration, price_change_limit: Decimal) -> Self {
        Self {
            client: HttpClient::new(),
            delay,
            actions: shared_actions(),
            price_change_limit,
        }
    }
}

#[async_trait]
impl TriggerPart for BinanceWalletPart {
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
        let url = "https://www.binance.com/bapi/capital/v1/public/capital/config/getall";
        let resp = self.client.get(url, OutputFormat::Json, None).await;
        let resp = resp.map_err(|e| match e {
            sniper_integration::SocketError::TooManyRequests { retry_after_secs } => {
                CheckError::RateLimited { retry_after_secs }
            }
            other => CheckError::Transport(other),
        })?;
        let json = resp.as_json().ok_or_else(|| {
            PartError::new(url, "expected JSON body".to_string())
        })?;
        let entries = json.as_array().ok_or_else(|| {
            PartError::new(url, json.to_string())
        })?;

        let mut coins = HashSet::new();
        for entry in entries {
            if let Some(code) = entry.get("coin").and_then(|v| v.as_str()) {
                coins.insert(Symbol::new(code, CoinSource::ApiWallet));
            }
        }
        Ok(coins)
    }
}

/// Enumerates every base asset across Binance's tradeable pairs.
pub struct BinancePairPart {
    client: HttpClient,
    delay: Duration,
    actions: TriggerActions,
    price_change_limit: Decimal,
}

impl BinancePairPart {
    pub fn new(delay: Duration, price_change_limit: Decimal) -> Self {
        Self {
            client: HttpClient::new(),
            delay,
            actions: shared_actions(),
            price_change_limit,
        }
    }
}

#[async_trait]
impl TriggerPart for BinancePairPart {
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
        let url = "https://api.binance.com/api/v3/exchangeInfo";
        let resp = self.client.get(url, OutputFormat::Json, None).await;
        let resp = resp.map_err(|e| match e {
            sniper_integration::SocketError::TooManyRequests { retry_after_secs } => {
                CheckError::RateLimited { retry_after_secs }
            }
            other => CheckError::Transport(other),
        })?;
        let json = resp.as_json().ok_or_else(|| PartError::new(url, "expected JSON body".to_string()))?;
        let symbols = json
            .get("symbols")
            .and_then(|v| v.as_array())
            .ok_or_else(|| PartError::new(url, json.to_string()))?;

        let mut coins = HashSet::new();
        for entry in symbols {
            if let Some(base) = entry.get("baseAsset").and_then(|v| v.as_str()) {
                coins.insert(Symbol::new(base, CoinSource::ApiPair));
            }
        }
        Ok(coins)
    }
}

/// Scrapes Binance's public announcements feed for "new listing" posts and
/// extracts the parenthesised ticker from the title.
pub struct BinanceAnnouncementsPart {
    client: HttpClient,
    delay: Duration,
    actions: TriggerActions,
    price_change_limit: Decimal,
}

impl BinanceAnnouncementsPart {
    pub fn new(delay: Duration, price_change_limit: Decimal) -> Self {
        Self {
            client: HttpClient::new(),
            delay,
            actions: shared_actions(),
            price_change_limit,
        }
    }

    fn extract(&self, title: &str) -> Option<String> {
        let lower = title.to_lowercase();
        if !LISTING_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return None;
        }
        ANNOUNCEMENT_SYMBOL
            .captures(title)
            .map(|c| c[1].to_uppercase())
    }
}

#[async_trait]
impl TriggerPart for BinanceAnnouncementsPart {
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
        let url = "https://www.binance.com/bapi/composite/v1/public/cms/article/catalog/list/query?catalogId=48&pageNo=1&pageSize=15";
        let resp = self.client.get(url, OutputFormat::Json, None).await;
        let resp = resp.map_err(|e| match e {
            sniper_integration::SocketError::TooManyRequests { retry_after_secs } => {
                CheckError::RateLimited { retry_after_secs }
            }
            other => CheckError::Transport(other),
        })?;
        let json = resp.as_json().ok_or_else(|| PartError::new(url, "expected JSON body".to_string()))?;
        let articles = json
            .get("data")
            .and_then(|d| d.get("catalogs"))
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("articles"))
            .and_then(|a| a.as_array())
            .ok_or_else(|| PartError::new(url, json.to_string()))?;

        let mut coins = HashSet::new();
        for article in articles {
            let title = match article.get("title").and_then(|v| v.as_str()) {
                Some(t) => t,
                None => continue,
            };
            if let Some(code) = self.extract(title) {
                coins.insert(Symbol::new(code, CoinSource::Site).with_url(url.to_string()));
            }
        }
        Ok(coins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_parenthesised_symbol_from_listing_title() {
        let part = BinanceAnnouncementsPart::new(Duration::from_secs(60), Decimal::from(25));
        let title = "Binance Will List Decentraland (MANA)";
        assert_eq!(part.extract(title), Some("MANA".to_string()));
    }

    #[test]
    fn ignores_titles_without_listing_keywords() {
        let part = BinanceAnnouncementsPart::new(Duration::from_secs(60), Decimal::from(25));
        let title = "Binance Maintenance Notice (MANA)";
        assert_eq!(part.extract(title), None);
    }
}
