use async_trait::async_trait;
use sniper_integration::http::{HttpClient, OutputFormat};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;

/// Display name + canonical URL for a coin, looked up from a
/// CoinMarketCap-style "quick search" endpoint. Misses are non-fatal: callers
/// fall back to the bare code.
#[derive(Debug, Clone)]
pub struct CoinInfo {
    pub name: String,
    pub url: String,
}

#[async_trait]
pub trait CoinMetadata: Send + Sync {
    async fn lookup(&self, code: &str) -> Option<CoinInfo>;
}

const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A quick-search client with a 24h per-code cache, matching
/// `coinmarketcap.py`'s behaviour in the original implementation.
pub struct CoinMarketCapClient {
    client: HttpClient,
    base_url: String,
    cache: parking_lot::Mutex<HashMap<String, (CoinInfo, Instant)>>,
}

impl CoinMarketCapClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: HttpClient::new(),
            base_url: base_url.into(),
            cache: parking_lot::Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CoinMetadata for CoinMarketCapClient {
    async fn lookup(&self, code: &str) -> Option<CoinInfo> {
        if let Some((info, at)) = self.cache.lock().get(code) {
            if at.elapsed() < CACHE_TTL {
                return Some(info.clone());
            }
        }

        let url = format!("{}/v1/cryptocurrency/map?symbol={}", self.base_url, code);
        let resp = match self.client.get(&url, OutputFormat::Json, None).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(code, error = %e, "coin metadata lookup failed");
                return None;
            }
        };
        let json = resp.as_json()?;
        let entry = json.get("data")?.get(0)?;
        let info = CoinInfo {
            name: entry.get("name")?.as_str()?.to_string(),
            url: format!("https://coinmarketcap.com/currencies/{}/", entry.get("slug")?.as_str()?),
        };
        self.cache
            .lock()
            .insert(code.to_string(), (info.clone(), Instant::now()));
        Some(info)
    }
}
