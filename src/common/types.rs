use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A chat message as the backend stores and broadcasts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Backend `_id`, or a transient client id when the payload carries none.
    #[serde(rename = "_id", alias = "id", default = "transient_id")]
    pub id: String,
    /// `None` for system-originated entries.
    #[serde(default, deserialize_with = "lenient_sender")]
    pub sender: Option<Sender>,
    #[serde(default)]
    pub content: String,
    /// Missing or unparsable timestamps decode to `None` and count as expired.
    #[serde(
        rename = "createdAt",
        default,
        deserialize_with = "lenient_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// Populated author of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(
        rename = "profilePic",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub profile_pic: Option<String>,
}

/// The signed-in user. Handed to the widget explicitly, never read from a global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A short-lived, user-visible notice.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub id: String,
    pub text: String,
    pub raised_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn sender_name(&self) -> &str {
        match &self.sender {
            Some(sender) if !sender.name.is_empty() => &sender.name,
            Some(sender) => &sender.id,
            None => "System",
        }
    }
}

impl Notice {
    pub fn new(text: impl Into<String>, raised_at: DateTime<Utc>) -> Self {
        Self {
            id: transient_id(),
            text: text.into(),
            raised_at,
        }
    }
}

pub fn transient_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SenderRepr {
    Populated(Sender),
    Id(String),
}

fn lenient_sender<'de, D>(deserializer: D) -> Result<Option<Sender>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = Option::<SenderRepr>::deserialize(deserializer)?;
    Ok(repr.map(|repr| match repr {
        SenderRepr::Populated(sender) => sender,
        SenderRepr::Id(id) => Sender {
            id,
            name: String::new(),
            profile_pic: None,
        },
    }))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| parse_timestamp(&value)))
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_populated_backend_message() {
        let message: ChatMessage = serde_json::from_value(json!({
            "_id": "665f1c",
            "sender": { "_id": "u1", "name": "Asha", "profilePic": "https://cdn/a.png" },
            "content": "Anyone applying to IIT Delhi?",
            "createdAt": "2026-10-19T08:30:00.000Z"
        }))
        .unwrap();

        assert_eq!(message.id, "665f1c");
        assert_eq!(message.sender_name(), "Asha");
        assert_eq!(
            message.sender.unwrap().profile_pic.as_deref(),
            Some("https://cdn/a.png")
        );
        assert_eq!(
            message.created_at.unwrap().to_rfc3339(),
            "2026-10-19T08:30:00+00:00"
        );
    }

    #[test]
    fn bad_timestamp_decodes_to_none() {
        let message: ChatMessage = serde_json::from_value(json!({
            "_id": "1",
            "content": "hi",
            "createdAt": "yesterday-ish"
        }))
        .unwrap();
        assert!(message.created_at.is_none());

        let message: ChatMessage =
            serde_json::from_value(json!({ "_id": "2", "content": "hi" })).unwrap();
        assert!(message.created_at.is_none());
    }

    #[test]
    fn epoch_millis_timestamp_is_accepted() {
        let message: ChatMessage = serde_json::from_value(json!({
            "_id": "1",
            "content": "hi",
            "createdAt": 1_760_000_000_000i64
        }))
        .unwrap();
        assert_eq!(message.created_at.unwrap().timestamp(), 1_760_000_000);
    }

    #[test]
    fn missing_id_gets_transient_one_and_null_sender_is_system() {
        let message: ChatMessage =
            serde_json::from_value(json!({ "sender": null, "content": "welcome" })).unwrap();
        assert!(!message.id.is_empty());
        assert!(message.sender.is_none());
        assert_eq!(message.sender_name(), "System");
    }

    #[test]
    fn unpopulated_sender_id_is_kept() {
        let message: ChatMessage = serde_json::from_value(json!({
            "_id": "1",
            "sender": "u42",
            "content": "hi"
        }))
        .unwrap();
        assert_eq!(message.sender.as_ref().unwrap().id, "u42");
        assert_eq!(message.sender_name(), "u42");
    }
}
