use crate::error::SocketError;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message as TungsteniteMessage, MaybeTlsStream,
    WebSocketStream,
};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A decoded WebSocket frame, reduced to the cases callers in this workspace
/// actually branch on. Ping/Pong are surfaced so each exchange connector can
/// apply its own keepalive reply (Huobi echoes the `ts` field back inside the
/// gzip payload rather than at the protocol level).
#[derive(Debug, Clone)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Closed,
}

pub async fn connect(url: &str) -> Result<WsStream, SocketError> {
    let (stream, _) = connect_async(url)
        .await
        .map_err(|e| SocketError::WebSocket(e.to_string()))?;
    Ok(stream)
}

pub async fn next_message(stream: &mut WsStream) -> Result<WsMessage, SocketError> {
    match stream.next().await {
        None => Ok(WsMessage::Closed),
        Some(Ok(msg)) => Ok(process_message(msg)),
        Some(Err(e)) => Err(SocketError::WebSocket(e.to_string())),
    }
}

fn process_message(msg: TungsteniteMessage) -> WsMessage {
    match msg {
        TungsteniteMessage::Text(t) => WsMessage::Text(t.to_string()),
        TungsteniteMessage::Binary(b) => WsMessage::Binary(b.to_vec()),
        TungsteniteMessage::Ping(p) => WsMessage::Ping(p.to_vec()),
        TungsteniteMessage::Pong(p) => WsMessage::Pong(p.to_vec()),
        TungsteniteMessage::Close(_) => WsMessage::Closed,
        TungsteniteMessage::Frame(_) => WsMessage::Closed,
    }
}

pub async fn send_text(stream: &mut WsStream, text: String) -> Result<(), SocketError> {
    stream
        .send(TungsteniteMessage::Text(text.into()))
        .await
        .map_err(|e| SocketError::WebSocket(e.to_string()))
}

pub async fn send_pong(stream: &mut WsStream, payload: Vec<u8>) -> Result<(), SocketError> {
    stream
        .send(TungsteniteMessage::Pong(payload.into()))
        .await
        .map_err(|e| SocketError::WebSocket(e.to_string()))
}
