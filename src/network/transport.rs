use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::ChatError;

pub type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SOCKET_PATH: &str = "/socket.io/?EIO=4&transport=websocket";

/// Maps the backend base URL to the Socket.IO WebSocket endpoint on the same host.
pub fn socket_url(backend_url: &str) -> Result<String, ChatError> {
    let trimmed = backend_url.trim().trim_end_matches('/');
    let (scheme, rest) = if let Some(rest) = trimmed.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        ("ws", rest)
    } else if let Some(rest) = trimmed.strip_prefix("wss://") {
        ("wss", rest)
    } else if let Some(rest) = trimmed.strip_prefix("ws://") {
        ("ws", rest)
    } else {
        return Err(ChatError::InvalidUrl(backend_url.to_string()));
    };

    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(ChatError::InvalidUrl(backend_url.to_string()));
    }

    Ok(format!("{scheme}://{host}{SOCKET_PATH}"))
}

pub async fn connect(url: &str) -> Result<SocketStream, ChatError> {
    let (stream, response) = connect_async(url).await?;
    log::debug!("WebSocket upgrade answered with {}", response.status());
    Ok(stream)
}
