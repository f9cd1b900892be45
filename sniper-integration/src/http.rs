use crate::error::SocketError;
use rand::seq::IndexedRandom;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
];

/// How the response body should be handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Parse as JSON.
    Json,
    /// Return the raw body verbatim, letting the caller deal with junk prefixes.
    Raw,
}

/// The shape a successful request resolves to.
#[derive(Debug, Clone)]
pub enum Response {
    Json(serde_json::Value),
    Raw(String),
}

impl Response {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Response::Json(v) => Some(v),
            Response::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> &str {
        match self {
            Response::Raw(s) => s,
            Response::Json(_) => "",
        }
    }

    /// Locate the first `{` in a raw body and parse from there onward. Used for
    /// feeds that prefix a JSON payload with unrelated junk (e.g. a JSONP-style
    /// callback wrapper).
    pub fn strip_json_prefix(raw: &str) -> Option<serde_json::Value> {
        let start = raw.find('{')?;
        serde_json::from_str(&raw[start..]).ok()
    }
}

/// A thin HTTP client matching the shared contract: randomised User-Agent,
/// 60s timeout (overridable), 429 translated to [`SocketError::TooManyRequests`].
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("reqwest client builds with no custom TLS config"),
        }
    }

    fn random_user_agent() -> &'static str {
        USER_AGENTS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(USER_AGENTS[0])
    }

    pub async fn get(
        &self,
        url: &str,
        output: OutputFormat,
        headers: Option<HashMap<String, String>>,
    ) -> Result<Response, SocketError> {
        let mut req = self.client.get(url).header("User-Agent", Self::random_user_agent());
        req = apply_headers(req, headers);
        let resp = req.send().await?;
        Self::handle_response(resp, output, None).await
    }

    pub async fn post(
        &self,
        url: &str,
        output: OutputFormat,
        headers: Option<HashMap<String, String>>,
        form: Option<HashMap<String, String>>,
        timeout: Option<Duration>,
    ) -> Result<Response, SocketError> {
        let mut req = self.client.post(url).header("User-Agent", Self::random_user_agent());
        req = apply_headers(req, headers);
        if let Some(form) = form {
            req = req.form(&form);
        }
        let resp = req.send().await?;
        Self::handle_response(resp, output, timeout).await
    }

    async fn handle_response(
        resp: reqwest::Response,
        output: OutputFormat,
        _timeout: Option<Duration>,
    ) -> Result<Response, SocketError> {
        let status = resp.status();
        if status.as_u16() == 429 {
            let retry_after_secs = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            return Err(SocketError::TooManyRequests { retry_after_secs });
        }
        let url = resp.url().to_string();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SocketError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let body = resp.text().await?;
        match output {
            OutputFormat::Raw => Ok(Response::Raw(body)),
            OutputFormat::Json => serde_json::from_str(&body)
                .map(Response::Json)
                .map_err(|e| SocketError::Deserialise {
                    url,
                    error: e.to_string(),
                    payload: body,
                }),
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_headers(
    mut req: reqwest::RequestBuilder,
    headers: Option<HashMap<String, String>>,
) -> reqwest::RequestBuilder {
    if let Some(headers) = headers {
        for (k, v) in headers {
            req = req.header(k, v);
        }
    }
    req
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_json_prefix_skips_junk() {
        let raw = "while(1);{\"a\":1}";
        let parsed = Response::strip_json_prefix(raw).unwrap();
        assert_eq!(parsed["a"], 1);
    }

    #[test]
    fn strip_json_prefix_none_without_brace() {
        assert!(Response::strip_json_prefix("no json here").is_none());
    }
}
