use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::common::retention::SWEEP_INTERVAL;
use crate::common::{ChatCommand, ChatEvent};

use super::client::ChatClient;
use super::history::HistoryLoader;

const EVENT_BUFFER: usize = 100;
const COMMAND_BUFFER: usize = 100;

/// What a session needs to reach the backend.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub backend_url: String,
    pub socket_url: String,
    pub reconnect_attempts: u32,
    pub sweep_interval: Duration,
}

impl SessionConfig {
    pub fn new(backend_url: impl Into<String>, socket_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            socket_url: socket_url.into(),
            reconnect_attempts: 5,
            sweep_interval: SWEEP_INTERVAL,
        }
    }
}

/// The resources a mounted chat widget holds: the one-shot history fetch,
/// the push listener and the periodic sweeper. All of them are released when
/// the session is unmounted or dropped.
pub struct ChatSession {
    command_sender: Option<mpsc::Sender<ChatCommand>>,
    history: JoinHandle<()>,
    push: Option<JoinHandle<()>>,
    sweeper: JoinHandle<()>,
}

impl ChatSession {
    /// Must be called from within a tokio runtime.
    pub fn mount(config: SessionConfig) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);

        let history = tokio::spawn(load_history(
            HistoryLoader::new(&config.backend_url),
            event_tx.clone(),
        ));

        let client = ChatClient::new(
            event_tx.clone(),
            command_rx,
            config.socket_url.clone(),
            config.reconnect_attempts,
        );
        let push = tokio::spawn(client.run());

        let sweeper = tokio::spawn(sweep(config.sweep_interval, event_tx));

        log::info!("Chat session mounted against {}", config.backend_url);
        (
            Self {
                command_sender: Some(command_tx),
                history,
                push: Some(push),
                sweeper,
            },
            event_rx,
        )
    }

    pub fn send(&self, command: ChatCommand) {
        let Some(sender) = &self.command_sender else {
            log::warn!("Session already unmounted; dropping {command:?}");
            return;
        };
        if let Err(err) = sender.try_send(command) {
            log::warn!("Failed to hand command to push channel: {err}");
        }
    }

    /// Releases the session and waits for the push channel to close its socket.
    pub async fn unmount(mut self) {
        self.release();
        if let Some(push) = self.push.take() {
            if let Err(err) = push.await {
                log::debug!("Push task ended abnormally: {err}");
            }
        }
    }

    fn release(&mut self) {
        if self.command_sender.take().is_some() {
            self.history.abort();
            self.sweeper.abort();
            log::info!("Chat session unmounted");
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.release();
    }
}

async fn load_history(loader: HistoryLoader, events: mpsc::Sender<ChatEvent>) {
    let event = match loader.fetch().await {
        Ok(messages) => {
            log::info!("Loaded {} chat history messages", messages.len());
            ChatEvent::HistoryLoaded(messages)
        }
        Err(err) => {
            log::warn!("Failed to load chat history from {}: {err}", loader.url());
            ChatEvent::HistoryUnavailable
        }
    };

    if events.send(event).await.is_err() {
        log::debug!("Widget gone before history arrived; discarding it");
    }
}

/// First tick lands one `period` after the call, not after the task is first polled.
fn sweep(period: Duration, events: mpsc::Sender<ChatEvent>) -> impl Future<Output = ()> {
    let first_tick = Instant::now() + period;

    async move {
        let mut ticker = interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if events.send(ChatEvent::Sweep).await.is_err() {
                break;
            }
        }
    }
}
