use crate::part::{TriggerAction, TriggerActions, TriggerPartStream};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use rust_decimal::Decimal;
use sha1::Sha1;
use sniper_instrument::{CoinSource, Symbol};
use std::collections::HashSet;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, warn};

type HmacSha1 = Hmac<Sha1>;

static TICKER_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z]+\b").expect("static regex is valid"));

const STREAM_URL: &str = "https://stream.twitter.com/1.1/statuses/filter.json";

/// OAuth1 credentials for Twitter's v1.1 filter-stream API, configured
/// through `TWITTER_*` env vars and owned by the bin crate's `Config`.
#[derive(Debug, Clone)]
pub struct TwitterCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

/// A long-lived POST to `statuses/filter`, following Coinbase Pro's own
/// account for "is now live" tweets. Reconnection is the caller's job, per
/// `TriggerPartStream`'s contract — a dropped connection ends this stream.
pub struct TwitterStreamPart {
    credentials: TwitterCredentials,
    follow_user_ids: Vec<String>,
    client: reqwest::Client,
    body: Option<Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>>,
    buffer: String,
    actions: TriggerActions,
    price_change_limit: Decimal,
}

impl TwitterStreamPart {
    pub fn new(credentials: TwitterCredentials, follow_user_ids: Vec<String>, price_change_limit: Decimal) -> Self {
        Self {
            credentials,
            follow_user_ids,
            client: reqwest::Client::new(),
            body: None,
            buffer: String::new(),
            actions: HashSet::from([TriggerAction::Buy]),
            price_change_limit,
        }
    }

    async fn connect(&mut self) -> Result<(), reqwest::Error> {
        let follow = self.follow_user_ids.join(",");
        let auth_header = oauth1_header(&self.credentials, STREAM_URL, &[("follow", &follow)]);
        let resp = self
            .client
            .post(STREAM_URL)
            .header("Authorization", auth_header)
            .form(&[("follow", follow.as_str())])
            .send()
            .await?
            .error_for_status()?;
        self.body = Some(Box::pin(resp.bytes_stream()));
        Ok(())
    }

    /// Pulls one `\r\n`-terminated line out of the buffered body, if a full
    /// one has arrived (Twitter's stream format, keepalive newlines included).
    fn take_line(&mut self) -> Option<String> {
        let idx = self.buffer.find("\r\n")?;
        let line = self.buffer[..idx].to_string();
        self.buffer.drain(..idx + 2);
        Some(line)
    }

    fn symbols_from_tweet(&self, json: &serde_json::Value) -> Option<HashSet<Symbol>> {
        let user_id = json.get("user")?.get("id_str")?.as_str()?;
        if !self.follow_user_ids.iter().any(|id| id == user_id) {
            return None;
        }
        let text = json.get("text")?.as_str()?;
        if text.contains("USDC") {
            return None;
        }
        let screen_name = json.get("user")?.get("screen_name").and_then(|v| v.as_str()).unwrap_or("CoinbasePro");
        let tweet_id = json.get("id_str").and_then(|v| v.as_str()).unwrap_or("");
        let url = format!("https://twitter.com/{screen_name}/status/{tweet_id}");

        let symbols: HashSet<Symbol> = TICKER_WORD
            .find_iter(text)
            .map(|m| Symbol::new(m.as_str(), CoinSource::Twitter).with_url(url.clone()))
            .collect();
        if symbols.is_empty() {
            None
        } else {
            Some(symbols)
        }
    }
}

#[async_trait]
impl TriggerPartStream for TwitterStreamPart {
    fn source(&self) -> CoinSource {
        CoinSource::Twitter
    }
    fn trigger_actions(&self) -> &TriggerActions {
        &self.actions
    }
    fn price_change_limit(&self) -> Decimal {
        self.price_change_limit
    }

    async fn next(&mut self) -> Option<HashSet<Symbol>> {
        loop {
            if self.body.is_none() {
                if let Err(e) = self.connect().await {
                    error!(error = %e, "failed to open twitter filter stream");
                    return None;
                }
            }

            if let Some(line) = self.take_line() {
                if line.trim().is_empty() {
                    continue;
                }
                let Ok(json) = serde_json::from_str::<serde_json::Value>(&line) else {
                    warn!(line = %line, "unparsable twitter stream line, skipping");
                    continue;
                };
                if let Some(symbols) = self.symbols_from_tweet(&json) {
                    return Some(symbols);
                }
                continue;
            }

            let chunk = match self.body.as_mut().unwrap().next().await {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    error!(error = %e, "twitter filter stream read failed");
                    self.body = None;
                    return None;
                }
                None => {
                    self.body = None;
                    return None;
                }
            };
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn nonce() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..32).map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char).collect()
}

/// Builds the `Authorization: OAuth ...` header for a signed request, per
/// RFC 5849 (HMAC-SHA1 signature method, as mandated by Twitter's API).
fn oauth1_header(credentials: &TwitterCredentials, url: &str, body_params: &[(&str, &str)]) -> String {
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs().to_string();
    let nonce = nonce();

    let mut params: Vec<(String, String)> = vec![
        ("oauth_consumer_key".to_string(), credentials.consumer_key.clone()),
        ("oauth_nonce".to_string(), nonce.clone()),
        ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
        ("oauth_timestamp".to_string(), timestamp.clone()),
        ("oauth_token".to_string(), credentials.access_token.clone()),
        ("oauth_version".to_string(), "1.0".to_string()),
    ];
    for (k, v) in body_params {
        params.push((k.to_string(), v.to_string()));
    }
    params.sort();

    let param_string = params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let base_string = format!("POST&{}&{}", percent_encode(url), percent_encode(&param_string));
    let signing_key = format!(
        "{}&{}",
        percent_encode(&credentials.consumer_secret),
        percent_encode(&credentials.access_token_secret)
    );

    let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(base_string.as_bytes());
    let signature = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, mac.finalize().into_bytes());

    let header_params = [
        ("oauth_consumer_key", credentials.consumer_key.as_str()),
        ("oauth_nonce", nonce.as_str()),
        ("oauth_signature", signature.as_str()),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_token", credentials.access_token.as_str()),
        ("oauth_version", "1.0"),
    ];
    let joined = header_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {joined}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> TwitterCredentials {
        TwitterCredentials {
            consumer_key: "ck".to_string(),
            consumer_secret: "cs".to_string(),
            access_token: "at".to_string(),
            access_token_secret: "ats".to_string(),
        }
    }

    #[test]
    fn percent_encode_leaves_unreserved_untouched() {
        assert_eq!(percent_encode("abc-123_.~"), "abc-123_.~");
        assert_eq!(percent_encode("a b"), "a%20b");
    }

    #[test]
    fn oauth1_header_is_well_formed() {
        let header = oauth1_header(&creds(), STREAM_URL, &[("follow", "720487892670410753")]);
        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_signature=\""));
        assert!(header.contains("oauth_consumer_key=\"ck\""));
    }

    #[test]
    fn extracts_uppercase_tickers_from_tweet_text() {
        let part = TwitterStreamPart::new(creds(), vec!["720487892670410753".to_string()], Decimal::from(25));
        let tweet = serde_json::json!({
            "id_str": "1",
            "user": {"id_str": "720487892670410753", "screen_name": "CoinbasePro"},
            "text": "MANA is now live on Coinbase Pro",
        });
        let symbols = part.symbols_from_tweet(&tweet).expect("expected symbols");
        assert!(symbols.iter().any(|s| s.code == "MANA"));
    }

    #[test]
    fn skips_tweets_from_unfollowed_users() {
        let part = TwitterStreamPart::new(creds(), vec!["720487892670410753".to_string()], Decimal::from(25));
        let tweet = serde_json::json!({
            "id_str": "1",
            "user": {"id_str": "999", "screen_name": "someone_else"},
            "text": "MANA is now live",
        });
        assert!(part.symbols_from_tweet(&tweet).is_none());
    }

    #[test]
    fn skips_tweets_mentioning_usdc() {
        let part = TwitterStreamPart::new(creds(), vec!["720487892670410753".to_string()], Decimal::from(25));
        let tweet = serde_json::json!({
            "id_str": "1",
            "user": {"id_str": "720487892670410753", "screen_name": "CoinbasePro"},
            "text": "USDC rewards this week",
        });
        assert!(part.symbols_from_tweet(&tweet).is_none());
    }
}
