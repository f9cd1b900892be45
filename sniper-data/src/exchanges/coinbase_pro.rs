use crate::error::{CheckError, PartError};
use crate::part::{TriggerAction, TriggerActions, TriggerPart};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sniper_instrument::{CoinSource, Symbol};
use sniper_integration::http::{HttpClient, OutputFormat, Response};
use std::collections::HashSet;
use std::time::Duration;

static LISTING_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([A-Za-z0-9]+)\)").expect("static regex is valid"));

const BLOG_URL: &str = "https://blog.coinbase.com/";
const FEED_URL: &str = "https://medium.com/_/api/collections/c114225aeaf7/stream";

/// Enumerates every currency Coinbase Pro's exchange will settle, regardless
/// of which one the (oddly singular) `/currencies/` endpoint is asked about
/// — it always returns the full list.
pub struct CoinbaseProWalletsPart {
    client: HttpClient,
    delay: Duration,
    actions: TriggerActions,
    price_change_limit: Decimal,
}

impl CoinbaseProWalletsPart {
    pub fn new(delay: Duration, price_change_limit: Decimal) -> Self {
        Self {
            client: HttpClient::new(),
            delay,
            actions: HashSet::from([TriggerAction::Buy]),
            price_change_limit,
        }
    }
}

#[async_trait]
impl TriggerPart for CoinbaseProWalletsPart {
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
        let url = "https://api.pro.coinbase.com/currencies/";
        let resp = self.client.get(url, OutputFormat::Json, None).await;
        let resp = resp.map_err(|e| match e {
            sniper_integration::SocketError::TooManyRequests { retry_after_secs } => {
                CheckError::RateLimited { retry_after_secs }
            }
            other => CheckError::Transport(other),
        })?;
        let json = resp.as_json().ok_or_else(|| PartError::new(url, "expected JSON body".to_string()))?;
        let currencies = json.as_array().ok_or_else(|| PartError::new(url, json.to_string()))?;

        let mut coins = HashSet::new();
        for currency in currencies {
            let Some(id) = currency.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            coins.insert(Symbol::new(id.to_uppercase(), CoinSource::ApiWallet).with_url(url.to_string()));
        }
        Ok(coins)
    }
}

/// Same Medium-feed scrape as Coinbase's retail blog, filtered for Pro's own
/// "is launching on coinbase pro" announcement phrasing.
pub struct CoinbaseProAnnouncementsPart {
    client: HttpClient,
    delay: Duration,
    actions: TriggerActions,
    price_change_limit: Decimal,
}

impl CoinbaseProAnnouncementsPart {
    pub fn new(delay: Duration, price_change_limit: Decimal) -> Self {
        Self {
            client: HttpClient::new(),
            delay,
            actions: HashSet::from([TriggerAction::Buy]),
            price_change_limit,
        }
    }
}

#[async_trait]
impl TriggerPart for CoinbaseProAnnouncementsPart {
    fn source(&self) -> CoinSource {
        CoinSource::ApiUnofficial
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
        let resp = self.client.get(FEED_URL, OutputFormat::Raw, None).await;
        let resp = resp.map_err(|e| match e {
            sniper_integration::SocketError::TooManyRequests { retry_after_secs } => {
                CheckError::RateLimited { retry_after_secs }
            }
            other => CheckError::Transport(other),
        })?;
        let json = Response::strip_json_prefix(resp.as_raw())
            .ok_or_else(|| PartError::new(FEED_URL, "expected JSON-with-junk-prefix body".to_string()))?;
        if json.get("success").and_then(|v| v.as_bool()) != Some(true) {
            return Err(PartError::new(FEED_URL, json.to_string()).into());
        }
        let posts = json
            .get("payload")
            .and_then(|p| p.get("references"))
            .and_then(|r| r.get("Post"))
            .and_then(|p| p.as_object())
            .ok_or_else(|| PartError::new(FEED_URL, json.to_string()))?;

        let mut coins = HashSet::new();
        for post in posts.values() {
            let Some(title) = post.get("title").and_then(|v| v.as_str()) else {
                continue;
            };
            if !title.to_lowercase().contains("is launching on coinbase pro") {
                continue;
            }
            for capture in LISTING_SYMBOL.captures_iter(title) {
                coins.insert(Symbol::new(capture[1].to_uppercase(), CoinSource::Site).with_url(BLOG_URL.to_string()));
            }
        }
        Ok(coins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallets_and_announcements_are_buy_actions() {
        let wallets = CoinbaseProWalletsPart::new(Duration::from_secs(60), Decimal::from(25));
        let announcements = CoinbaseProAnnouncementsPart::new(Duration::from_secs(3), Decimal::from(25));
        assert_eq!(wallets.trigger_actions(), &HashSet::from([TriggerAction::Buy]));
        assert_eq!(announcements.trigger_actions(), &HashSet::from([TriggerAction::Buy]));
    }
}
