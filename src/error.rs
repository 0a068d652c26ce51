use thiserror::Error;

use crate::network::protocol::ProtocolError;

/// Failures of the history fetch and the push channel. All of them are
/// handled inside the widget; none is fatal to the application.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("backend reported an unsuccessful response")]
    Rejected,
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("invalid backend url `{0}`")]
    InvalidUrl(String),
}
