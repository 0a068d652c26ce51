//! Rolling time window applied to the message store.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

use super::types::ChatMessage;

/// Messages older than this are no longer shown.
pub const RETENTION_WINDOW: Duration = Duration::from_secs(10 * 60);
/// How often the sweeper re-applies the window without new traffic.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

fn window() -> TimeDelta {
    TimeDelta::from_std(RETENTION_WINDOW).unwrap_or(TimeDelta::MAX)
}

/// True when `message` is strictly younger than the retention window at `now`.
/// A message without a timestamp is treated as expired.
pub fn is_fresh(message: &ChatMessage, now: DateTime<Utc>) -> bool {
    match message.created_at {
        Some(created_at) => now - created_at < window(),
        None => false,
    }
}

/// Returns the fresh messages of `messages`, keeping their relative order.
pub fn retain_recent(messages: &[ChatMessage], now: DateTime<Utc>) -> Vec<ChatMessage> {
    messages
        .iter()
        .filter(|message| is_fresh(message, now))
        .cloned()
        .collect()
}

/// In-place variant of [`retain_recent`]. Returns how many messages were dropped.
pub fn prune_in_place(messages: &mut Vec<ChatMessage>, now: DateTime<Utc>) -> usize {
    let before = messages.len();
    messages.retain(|message| is_fresh(message, now));
    before - messages.len()
}
