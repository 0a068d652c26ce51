use super::types::ChatMessage;

/// Events the session tasks deliver to the widget.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    HistoryLoaded(Vec<ChatMessage>),
    /// History could not be fetched; the widget stays usable without it.
    HistoryUnavailable,
    MessageReceived(ChatMessage),
    /// Periodic sweeper tick.
    Sweep,
    Connected,
    Reconnecting { attempt: u32 },
    /// Push channel gave up; only history stays visible.
    ConnectionLost(String),
    /// Text to surface to the user as a notice.
    Notice(String),
}
