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

/// Coinbase's retail blog is fetched from its Medium collection feed, which
/// prefixes the JSON body with an anti-scraping junk string — the same shape
/// `Response::strip_json_prefix` exists to peel off.
pub struct CoinbaseAnnouncementsPart {
    client: HttpClient,
    delay: Duration,
    actions: TriggerActions,
    price_change_limit: Decimal,
}

impl CoinbaseAnnouncementsPart {
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
impl TriggerPart for CoinbaseAnnouncementsPart {
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
            if !title.to_lowercase().contains("is now available on coinbase") {
                continue;
            }
            for capture in LISTING_SYMBOL.captures_iter(title) {
                coins.insert(Symbol::new(capture[1].to_uppercase(), CoinSource::Site).with_url(BLOG_URL.to_string()));
            }
        }
        Ok(coins)
    }
}
