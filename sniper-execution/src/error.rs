use sniper_integration::SocketError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Transport(#[from] SocketError),
    #[error("order rejected: {0}")]
    OrderRejected(String),
    #[error("cancel failed: {0}")]
    CancelFailed(String),
    #[error("account init failed: {0}")]
    AccountInit(String),
}
