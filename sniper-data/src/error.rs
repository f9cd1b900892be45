use sniper_integration::SocketError;
use thiserror::Error;

/// A vendor API returned a shape the part's decoder didn't expect. Carries
/// enough to debug without crashing the poll loop: the URL hit and the raw
/// response body.
#[derive(Debug, Error)]
#[error("part error fetching {url}: unexpected response shape: {response}")]
pub struct PartError {
    pub url: String,
    pub response: String,
}

impl PartError {
    pub fn new(url: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            response: response.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error(transparent)]
    Part(#[from] PartError),
    #[error("transport error: {0}")]
    Transport(#[from] SocketError),
}
