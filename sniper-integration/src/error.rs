use thiserror::Error;

/// Transport and protocol errors shared by every HTTP and WebSocket caller in the
/// sniper workspace. Mirrors the shape of a typical exchange-integration error
/// taxonomy: each variant names a failure mode by behaviour, not by vendor.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("too many requests, retry after {retry_after_secs}s")]
    TooManyRequests { retry_after_secs: u64 },

    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("http request timed out: {0}")]
    HttpTimeout(String),

    #[error("http transport error: {0}")]
    HttpTransport(String),

    #[error("failed to deserialise payload from {url}: {error} (payload: {payload})")]
    Deserialise {
        url: String,
        error: String,
        payload: String,
    },

    #[error("failed to serialise outgoing payload: {0}")]
    Serialise(String),

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("websocket closed")]
    Terminated,

    #[error("url parse error: {0}")]
    UrlParse(String),
}

impl From<reqwest::Error> for SocketError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::HttpTimeout(error.to_string())
        } else {
            Self::HttpTransport(error.to_string())
        }
    }
}

impl From<url::ParseError> for SocketError {
    fn from(error: url::ParseError) -> Self {
        Self::UrlParse(error.to_string())
    }
}
