use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::tungstenite::Message;

use crate::common::{ChatCommand, ChatEvent, ChatMessage};
use crate::error::ChatError;

use super::protocol::{Handshake, Packet};
use super::transport::{self, SocketStream};

const MESSAGE_EVENT: &str = "message";
const SEND_EVENT: &str = "sendMessage";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(5);
const OFFLINE_NOTICE: &str = "Chat is offline, your message was not sent";

/// Why a connected session ended.
enum SessionEnd {
    /// The widget closed the command channel.
    Shutdown,
    Lost(String),
    /// The server ended the Socket.IO session on purpose; no reconnect.
    Kicked,
}

/// Keeps the push channel alive for one mounted widget: relays inbound
/// `message` events and emits `sendMessage` for outgoing commands.
pub struct ChatClient {
    event_sender: mpsc::Sender<ChatEvent>,
    command_receiver: mpsc::Receiver<ChatCommand>,
    socket_url: String,
    reconnect_attempts: u32,
}

impl ChatClient {
    pub fn new(
        event_sender: mpsc::Sender<ChatEvent>,
        command_receiver: mpsc::Receiver<ChatCommand>,
        socket_url: String,
        reconnect_attempts: u32,
    ) -> Self {
        Self {
            event_sender,
            command_receiver,
            socket_url,
            reconnect_attempts,
        }
    }

    /// Runs until the command channel is closed.
    pub async fn run(mut self) {
        let mut failures = 0u32;

        loop {
            let reason = match self.connect_and_serve(&mut failures).await {
                SessionEnd::Shutdown => break,
                SessionEnd::Lost(reason) => reason,
                SessionEnd::Kicked => {
                    log::warn!("Server disconnected the chat session; not reconnecting");
                    self.emit(ChatEvent::ConnectionLost("server disconnect".to_string()))
                        .await;
                    self.reject_until_closed().await;
                    break;
                }
            };
            log::warn!("Push channel to {} lost: {reason}", self.socket_url);

            failures += 1;
            if failures > self.reconnect_attempts {
                log::warn!("Giving up on the push channel after {failures} failed attempts");
                self.emit(ChatEvent::ConnectionLost(reason)).await;
                self.reject_until_closed().await;
                break;
            }

            self.emit(ChatEvent::Reconnecting { attempt: failures }).await;
            if !self.wait_for_retry(reconnect_delay(failures)).await {
                break;
            }
        }

        log::info!("Push channel stopped");
    }

    async fn connect_and_serve(&mut self, failures: &mut u32) -> SessionEnd {
        log::info!("Connecting to push channel at {}", self.socket_url);
        let url = self.socket_url.clone();
        let connecting = timeout(CONNECT_TIMEOUT, async move {
            let mut socket = transport::connect(&url).await?;
            let handshake = handshake(&mut socket).await?;
            Ok::<_, ChatError>((socket, handshake))
        });
        tokio::pin!(connecting);

        // Unmounting while connecting drops the half-open socket right away.
        let connected = loop {
            tokio::select! {
                connected = &mut connecting => break connected,
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => self.reject(command).await,
                        None => return SessionEnd::Shutdown,
                    }
                }
            }
        };

        let (socket, handshake) = match connected {
            Ok(Ok(connected)) => connected,
            Ok(Err(err)) => return SessionEnd::Lost(err.to_string()),
            Err(_) => return SessionEnd::Lost("connect timed out".to_string()),
        };

        log::info!("Push channel connected (sid {})", handshake.sid);
        *failures = 0;
        self.emit(ChatEvent::Connected).await;
        self.serve(socket, &handshake).await
    }

    async fn serve(&mut self, mut socket: SocketStream, handshake: &Handshake) -> SessionEnd {
        let heartbeat = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
        let mut deadline = Instant::now() + heartbeat;

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => {
                            if let Err(err) = send_command(&mut socket, command).await {
                                return SessionEnd::Lost(err.to_string());
                            }
                        }
                        None => {
                            close(&mut socket).await;
                            return SessionEnd::Shutdown;
                        }
                    }
                }
                frame = socket.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match self.handle_frame(&text, &mut socket).await {
                                Ok(Flow::Continue) => {}
                                Ok(Flow::Heartbeat) => deadline = Instant::now() + heartbeat,
                                Ok(Flow::Closed) => {
                                    return SessionEnd::Lost("server closed the session".to_string());
                                }
                                Ok(Flow::Kicked) => {
                                    close(&mut socket).await;
                                    return SessionEnd::Kicked;
                                }
                                Err(err) => return SessionEnd::Lost(err.to_string()),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return SessionEnd::Lost("connection closed".to_string());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => return SessionEnd::Lost(err.to_string()),
                    }
                }
                _ = sleep_until(deadline) => {
                    return SessionEnd::Lost("ping timeout".to_string());
                }
            }
        }
    }

    async fn handle_frame(&mut self, text: &str, socket: &mut SocketStream) -> Result<Flow, ChatError> {
        let packet = match Packet::decode(text) {
            Ok(packet) => packet,
            Err(err) => {
                log::warn!("Skipping undecodable frame `{text}`: {err}");
                return Ok(Flow::Continue);
            }
        };

        match packet {
            Packet::Ping => {
                socket.send(Message::Text(Packet::Pong.encode())).await?;
                Ok(Flow::Heartbeat)
            }
            Packet::Close => Ok(Flow::Closed),
            Packet::Disconnect => Ok(Flow::Kicked),
            Packet::Event { name, payload } if name == MESSAGE_EVENT => {
                match serde_json::from_value::<ChatMessage>(payload) {
                    Ok(message) => {
                        log::debug!("Received message {} from {}", message.id, message.sender_name());
                        self.emit(ChatEvent::MessageReceived(message)).await;
                    }
                    Err(err) => log::warn!("Skipping malformed chat message: {err}"),
                }
                Ok(Flow::Continue)
            }
            other => {
                log::trace!("Ignoring packet {other:?}");
                Ok(Flow::Continue)
            }
        }
    }

    async fn wait_for_retry(&mut self, delay: Duration) -> bool {
        let retry_at = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = sleep_until(retry_at) => return true,
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => self.reject(command).await,
                        None => return false,
                    }
                }
            }
        }
    }

    async fn reject_until_closed(&mut self) {
        while let Some(command) = self.command_receiver.recv().await {
            self.reject(command).await;
        }
    }

    async fn reject(&mut self, command: ChatCommand) {
        log::warn!("Push channel offline; dropping {command:?}");
        self.emit(ChatEvent::Notice(OFFLINE_NOTICE.to_string())).await;
    }

    async fn emit(&self, event: ChatEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::debug!("Widget no longer listening: {err}");
        }
    }
}

enum Flow {
    Continue,
    Heartbeat,
    Closed,
    Kicked,
}

fn reconnect_delay(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    RECONNECT_BASE_DELAY
        .saturating_mul(factor)
        .min(RECONNECT_MAX_DELAY)
}

async fn handshake(socket: &mut SocketStream) -> Result<Handshake, ChatError> {
    let open = match next_packet(socket).await? {
        Packet::Open(open) => open,
        other => {
            return Err(ChatError::Handshake(format!("expected open packet, got {other:?}")));
        }
    };

    socket.send(Message::Text(Packet::Connect(None).encode())).await?;

    loop {
        match next_packet(socket).await? {
            Packet::Connect(_) => return Ok(open),
            Packet::ConnectError(reason) => return Err(ChatError::Handshake(reason.to_string())),
            Packet::Ping => socket.send(Message::Text(Packet::Pong.encode())).await?,
            other => log::trace!("Ignoring {other:?} before connect ack"),
        }
    }
}

async fn next_packet(socket: &mut SocketStream) -> Result<Packet, ChatError> {
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => return Ok(Packet::decode(&text)?),
            Some(Ok(Message::Close(_))) | None => {
                return Err(ChatError::Handshake("socket closed during handshake".to_string()));
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(err.into()),
        }
    }
}

async fn send_command(socket: &mut SocketStream, command: ChatCommand) -> Result<(), ChatError> {
    match command {
        ChatCommand::SendMessage { user_id, message } => {
            let packet = Packet::event(SEND_EVENT, json!({ "userId": user_id, "message": message }));
            socket.send(Message::Text(packet.encode())).await?;
            log::debug!("Emitted {SEND_EVENT} for user {user_id}");
        }
    }
    Ok(())
}

async fn close(socket: &mut SocketStream) {
    if let Err(err) = socket.send(Message::Text(Packet::Close.encode())).await {
        log::debug!("Failed to send close packet: {err}");
    }
    if let Err(err) = socket.close(None).await {
        log::debug!("Failed to close socket: {err}");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{WebSocketStream, accept_async};

    pub(crate) const OPEN_FRAME: &str =
        r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;

    pub(crate) async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(Message::Close(_))) | None => panic!("socket closed"),
                Some(Ok(_)) => {}
                Some(Err(err)) => panic!("socket error: {err}"),
            }
        }
    }

    /// Accepts one client and completes the Socket.IO handshake.
    pub(crate) async fn accept_client(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        ws.send(Message::Text(OPEN_FRAME.into())).await.unwrap();
        assert_eq!(next_text(&mut ws).await, "40");
        ws.send(Message::Text(r#"40{"sid":"c1"}"#.into())).await.unwrap();
        ws
    }

    pub(crate) async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!(
            "ws://{}/socket.io/?EIO=4&transport=websocket",
            listener.local_addr().unwrap()
        );
        (listener, url)
    }

    fn spawn_client(
        url: String,
        reconnect_attempts: u32,
    ) -> (
        mpsc::Receiver<ChatEvent>,
        mpsc::Sender<ChatCommand>,
        tokio::task::JoinHandle<()>,
    ) {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (command_tx, command_rx) = mpsc::channel(16);
        let handle = tokio::spawn(ChatClient::new(event_tx, command_rx, url, reconnect_attempts).run());
        (event_rx, command_tx, handle)
    }

    #[test]
    fn reconnect_delay_doubles_up_to_cap() {
        assert_eq!(reconnect_delay(1), Duration::from_secs(1));
        assert_eq!(reconnect_delay(2), Duration::from_secs(2));
        assert_eq!(reconnect_delay(3), Duration::from_secs(4));
        assert_eq!(reconnect_delay(4), Duration::from_secs(5));
        assert_eq!(reconnect_delay(40), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn relays_messages_answers_pings_and_emits_sends() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_client(&listener).await;
            ws.send(Message::Text("2".into())).await.unwrap();
            let event = Packet::event(
                "message",
                json!({
                    "_id": "m1",
                    "sender": { "_id": "u2", "name": "Ravi" },
                    "content": "cutoffs are out",
                    "createdAt": "2026-10-19T08:00:00Z"
                }),
            );
            ws.send(Message::Text(event.encode())).await.unwrap();

            assert_eq!(next_text(&mut ws).await, "3");
            let sent = Packet::decode(&next_text(&mut ws).await).unwrap();
            assert_eq!(
                sent,
                Packet::event("sendMessage", json!({ "userId": "u1", "message": "hello" }))
            );
            assert_eq!(next_text(&mut ws).await, "1");
        });

        let (mut events, commands, client) = spawn_client(url, 0);

        assert_eq!(events.recv().await, Some(ChatEvent::Connected));
        match events.recv().await {
            Some(ChatEvent::MessageReceived(message)) => {
                assert_eq!(message.id, "m1");
                assert_eq!(message.sender_name(), "Ravi");
            }
            other => panic!("unexpected event {other:?}"),
        }

        commands
            .send(ChatCommand::SendMessage {
                user_id: "u1".to_string(),
                message: "hello".to_string(),
            })
            .await
            .unwrap();
        drop(commands);

        client.await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_client(&listener).await;
            ws.send(Message::Text("42{broken".into())).await.unwrap();
            ws.send(Message::Text(r#"42["message","not an object"]"#.into()))
                .await
                .unwrap();
            let ok = Packet::event("message", json!({ "_id": "ok", "content": "still here" }));
            ws.send(Message::Text(ok.encode())).await.unwrap();
            let _ = ws.next().await;
        });

        let (mut events, commands, client) = spawn_client(url, 0);

        assert_eq!(events.recv().await, Some(ChatEvent::Connected));
        match events.recv().await {
            Some(ChatEvent::MessageReceived(message)) => assert_eq!(message.id, "ok"),
            other => panic!("unexpected event {other:?}"),
        }

        drop(commands);
        client.await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn degrades_after_losing_connection() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_client(&listener).await;
            ws.close(None).await.unwrap();
        });

        let (mut events, commands, client) = spawn_client(url, 0);

        assert_eq!(events.recv().await, Some(ChatEvent::Connected));
        assert!(matches!(events.recv().await, Some(ChatEvent::ConnectionLost(_))));

        commands
            .send(ChatCommand::SendMessage {
                user_id: "u1".to_string(),
                message: "anyone?".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(
            events.recv().await,
            Some(ChatEvent::Notice(OFFLINE_NOTICE.to_string()))
        );

        drop(commands);
        client.await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn server_disconnect_skips_reconnect() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_client(&listener).await;
            ws.send(Message::Text("41".into())).await.unwrap();
            let _ = ws.next().await;
        });

        let (mut events, commands, client) = spawn_client(url, 3);

        assert_eq!(events.recv().await, Some(ChatEvent::Connected));
        assert_eq!(
            events.recv().await,
            Some(ChatEvent::ConnectionLost("server disconnect".to_string()))
        );

        commands
            .send(ChatCommand::SendMessage {
                user_id: "u1".to_string(),
                message: "still there?".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(
            events.recv().await,
            Some(ChatEvent::Notice(OFFLINE_NOTICE.to_string()))
        );

        drop(commands);
        client.await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_error_is_reported_as_lost() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(Message::Text(OPEN_FRAME.into())).await.unwrap();
            assert_eq!(next_text(&mut ws).await, "40");
            ws.send(Message::Text(r#"44{"message":"unauthorized"}"#.into()))
                .await
                .unwrap();
        });

        let (mut events, commands, client) = spawn_client(url, 0);

        match events.recv().await {
            Some(ChatEvent::ConnectionLost(reason)) => assert!(reason.contains("unauthorized")),
            other => panic!("unexpected event {other:?}"),
        }

        drop(commands);
        client.await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_server_announces_retry_before_giving_up() {
        let (listener, url) = bind().await;
        drop(listener);

        let (mut events, commands, client) = spawn_client(url, 1);

        assert_eq!(events.recv().await, Some(ChatEvent::Reconnecting { attempt: 1 }));
        assert!(matches!(events.recv().await, Some(ChatEvent::ConnectionLost(_))));

        drop(commands);
        client.await.unwrap();
    }
}
