//! Transport plumbing shared across the listing sniper workspace: the HTTP
//! client, WebSocket frame helpers, the shared error taxonomy, the alert
//! queue, and decimal formatting.

pub mod channel;
pub mod decimal;
pub mod error;
pub mod http;
pub mod websocket;

pub use channel::{alert_queue, AlertReceiver, AlertSender};
pub use decimal::norm;
pub use error::SocketError;
pub use http::{HttpClient, OutputFormat, Response};
