//! Text-frame codec for Socket.IO v5 running over Engine.IO v4.
//!
//! Only the packets the chat widget needs are modelled. Every WebSocket text
//! frame carries exactly one Engine.IO packet; the first character is the
//! Engine.IO type, and `message` packets (`4`) wrap a Socket.IO packet whose
//! first character is the Socket.IO type.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;
const DEFAULT_PING_TIMEOUT_MS: u64 = 20_000;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,
    #[error("unknown engine packet type `{0}`")]
    UnknownEngineType(char),
    #[error("unknown socket packet type `{0}`")]
    UnknownSocketType(char),
    #[error("malformed event: {0}")]
    MalformedEvent(String),
    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parameters the server announces in the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}

fn default_ping_timeout() -> u64 {
    DEFAULT_PING_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Noop,
    /// Socket.IO connect; the server's ack carries `{ "sid": ... }`.
    Connect(Option<Value>),
    Disconnect,
    /// Only the first event argument is kept.
    Event { name: String, payload: Value },
    ConnectError(Value),
}

impl Packet {
    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        Packet::Event {
            name: name.into(),
            payload,
        }
    }

    pub fn decode(frame: &str) -> Result<Packet, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let body = chars.as_str();

        match kind {
            '0' => Ok(Packet::Open(serde_json::from_str(body)?)),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '4' => decode_socket_packet(body),
            '6' => Ok(Packet::Noop),
            other => Err(ProtocolError::UnknownEngineType(other)),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Packet::Open(handshake) => format!(
                "0{}",
                json!({
                    "sid": handshake.sid,
                    "pingInterval": handshake.ping_interval,
                    "pingTimeout": handshake.ping_timeout,
                })
            ),
            Packet::Close => "1".to_string(),
            Packet::Ping => "2".to_string(),
            Packet::Pong => "3".to_string(),
            Packet::Noop => "6".to_string(),
            Packet::Connect(None) => "40".to_string(),
            Packet::Connect(Some(auth)) => format!("40{auth}"),
            Packet::Disconnect => "41".to_string(),
            Packet::Event { name, payload } => {
                let args = Value::Array(vec![Value::String(name.clone()), payload.clone()]);
                format!("42{args}")
            }
            Packet::ConnectError(reason) => format!("44{reason}"),
        }
    }
}

fn decode_socket_packet(body: &str) -> Result<Packet, ProtocolError> {
    let mut chars = body.chars();
    let kind = chars.next().ok_or(ProtocolError::Empty)?;
    let rest = strip_namespace(chars.as_str());

    match kind {
        '0' if rest.is_empty() => Ok(Packet::Connect(None)),
        '0' => Ok(Packet::Connect(Some(serde_json::from_str(rest)?))),
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(strip_ack_id(rest)),
        '4' if rest.is_empty() => Ok(Packet::ConnectError(Value::Null)),
        '4' => Ok(Packet::ConnectError(serde_json::from_str(rest)?)),
        other => Err(ProtocolError::UnknownSocketType(other)),
    }
}

fn decode_event(body: &str) -> Result<Packet, ProtocolError> {
    let args: Vec<Value> = serde_json::from_str(body)?;
    let mut args = args.into_iter();

    let name = match args.next() {
        Some(Value::String(name)) => name,
        Some(other) => {
            return Err(ProtocolError::MalformedEvent(format!(
                "event name must be a string, got {other}"
            )));
        }
        None => return Err(ProtocolError::MalformedEvent("no event name".to_string())),
    };

    Ok(Packet::Event {
        name,
        payload: args.next().unwrap_or(Value::Null),
    })
}

/// `/chat,{...}` -> `{...}`; the default namespace has no prefix.
fn strip_namespace(body: &str) -> &str {
    if !body.starts_with('/') {
        return body;
    }
    match body.find(',') {
        Some(comma) => &body[comma + 1..],
        None => "",
    }
}

fn strip_ack_id(body: &str) -> &str {
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}
