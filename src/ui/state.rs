use chrono::{DateTime, TimeDelta, Utc};

use crate::common::retention::prune_in_place;
use crate::common::{AuthUser, ChatCommand, ChatEvent, ChatMessage, Notice};

const MAX_NOTICES: usize = 5;
const NOTICE_LIFETIME_SECS: i64 = 5;
pub const LOGIN_REQUIRED_NOTICE: &str = "Please log in to send messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetView {
    Collapsed,
    Expanded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryState {
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Offline,
}

/// Result of pressing "send".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Emit(ChatCommand),
    /// Blank input; nothing happens.
    Ignored,
    /// No signed-in user; a notice was raised instead.
    Rejected,
}

/// Local state of one mounted chat widget. The message list is kept in
/// arrival order and pruned to the retention window on every change.
#[derive(Debug)]
pub struct WidgetState {
    pub messages: Vec<ChatMessage>,
    pub input_text: String,
    pub view: WidgetView,
    pub history: HistoryState,
    pub connection: ConnectionStatus,
    pub notices: Vec<Notice>,
}

impl Default for WidgetState {
    fn default() -> Self {
        Self::new()
    }
}

impl WidgetState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            input_text: String::new(),
            view: WidgetView::Collapsed,
            history: HistoryState::Loading,
            connection: ConnectionStatus::Connecting,
            notices: Vec::new(),
        }
    }

    pub fn toggle_view(&mut self) {
        self.view = match self.view {
            WidgetView::Collapsed => WidgetView::Expanded,
            WidgetView::Expanded => WidgetView::Collapsed,
        };
    }

    pub fn apply_event(&mut self, event: ChatEvent, now: DateTime<Utc>) {
        match event {
            ChatEvent::HistoryLoaded(history) => self.seed_history(history, now),
            ChatEvent::HistoryUnavailable => self.history = HistoryState::Ready,
            ChatEvent::MessageReceived(message) => self.push_message(message, now),
            ChatEvent::Sweep => self.sweep(now),
            ChatEvent::Connected => self.connection = ConnectionStatus::Connected,
            ChatEvent::Reconnecting { attempt } => {
                self.connection = ConnectionStatus::Reconnecting { attempt };
            }
            ChatEvent::ConnectionLost(reason) => {
                log::info!("Chat continues without live updates: {reason}");
                self.connection = ConnectionStatus::Offline;
            }
            ChatEvent::Notice(text) => self.raise_notice(text, now),
        }
    }

    /// Replaces the store with `history`. Live messages that arrived before
    /// the history and are not part of it stay, after the history entries.
    pub fn seed_history(&mut self, history: Vec<ChatMessage>, now: DateTime<Utc>) {
        let live = std::mem::replace(&mut self.messages, history);
        for message in live {
            if !self.contains(&message.id) {
                self.messages.push(message);
            }
        }
        self.history = HistoryState::Ready;
        self.sweep(now);
    }

    pub fn push_message(&mut self, message: ChatMessage, now: DateTime<Utc>) {
        if self.contains(&message.id) {
            log::debug!("Ignoring duplicate message {}", message.id);
        } else {
            self.messages.push(message);
        }
        self.sweep(now);
    }

    pub fn sweep(&mut self, now: DateTime<Utc>) {
        let removed = prune_in_place(&mut self.messages, now);
        if removed > 0 {
            log::debug!("Aged out {removed} chat messages");
        }
    }

    /// Turns the input into a command for `user`. The store is left alone:
    /// the sent message shows up once the server echoes it back.
    pub fn prepare_send(&mut self, user: Option<&AuthUser>, now: DateTime<Utc>) -> SendOutcome {
        let Some(user) = user else {
            self.raise_notice(LOGIN_REQUIRED_NOTICE, now);
            return SendOutcome::Rejected;
        };

        let message = self.input_text.trim();
        if message.is_empty() {
            return SendOutcome::Ignored;
        }

        let command = ChatCommand::SendMessage {
            user_id: user.id.clone(),
            message: message.to_string(),
        };
        self.input_text.clear();
        SendOutcome::Emit(command)
    }

    pub fn raise_notice(&mut self, text: impl Into<String>, now: DateTime<Utc>) {
        self.notices.push(Notice::new(text, now));
        if self.notices.len() > MAX_NOTICES {
            self.notices.remove(0);
        }
    }

    pub fn expire_notices(&mut self, now: DateTime<Utc>) {
        let lifetime = TimeDelta::seconds(NOTICE_LIFETIME_SECS);
        self.notices.retain(|notice| now - notice.raised_at < lifetime);
    }

    fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|message| message.id == id)
    }
}
