use serde::Deserialize;
use serde_json::Value;

use crate::common::ChatMessage;
use crate::error::ChatError;

const HISTORY_PATH: &str = "/api/chat/history";

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    messages: Vec<Value>,
}

/// One-shot fetch of the chat history the widget is seeded with.
#[derive(Debug, Clone)]
pub struct HistoryLoader {
    http: reqwest::Client,
    url: String,
}

impl HistoryLoader {
    pub fn new(backend_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: format!("{}{HISTORY_PATH}", backend_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> Result<Vec<ChatMessage>, ChatError> {
        let response = self.http.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Status(status));
        }

        let body: HistoryResponse = response.json().await?;
        if !body.success {
            return Err(ChatError::Rejected);
        }

        let total = body.messages.len();
        let messages: Vec<ChatMessage> = body
            .messages
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(message) => Some(message),
                Err(err) => {
                    log::warn!("Skipping malformed history entry: {err}");
                    None
                }
            })
            .collect();

        log::debug!("Fetched {} of {total} history messages", messages.len());
        Ok(messages)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves a single canned HTTP response and returns the base URL.
    pub(crate) async fn serve_once(status: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });

        format!("http://{addr}")
    }

    #[test]
    fn builds_history_url_from_base() {
        assert_eq!(
            HistoryLoader::new("http://localhost:5000/").url(),
            "http://localhost:5000/api/chat/history"
        );
    }

    #[tokio::test]
    async fn fetches_messages_on_success() {
        let body = serde_json::json!({
            "success": true,
            "messages": [
                { "_id": "1", "content": "hello", "createdAt": "2026-10-19T08:00:00Z",
                  "sender": { "_id": "u1", "name": "Asha" } },
                { "_id": "2", "content": "hi", "createdAt": "2026-10-19T08:01:00Z", "sender": null }
            ]
        })
        .to_string();
        let base = serve_once("200 OK", body).await;

        let messages = HistoryLoader::new(&base).fetch().await.unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "1");
        assert_eq!(messages[1].sender_name(), "System");
    }

    #[tokio::test]
    async fn malformed_entries_are_skipped_one_by_one() {
        let body = serde_json::json!({
            "success": true,
            "messages": [
                "not a message",
                { "_id": "1", "content": "kept", "createdAt": "2026-10-19T08:00:00Z" },
                42,
                { "_id": "2", "content": "also kept" }
            ]
        })
        .to_string();
        let base = serve_once("200 OK", body).await;

        let messages = HistoryLoader::new(&base).fetch().await.unwrap();

        let ids: Vec<_> = messages.iter().map(|message| message.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn unsuccessful_body_is_an_error() {
        let base = serve_once("200 OK", r#"{"success":false,"messages":[]}"#.to_string()).await;
        let result = HistoryLoader::new(&base).fetch().await;
        assert!(matches!(result, Err(ChatError::Rejected)));
    }

    #[tokio::test]
    async fn error_status_is_an_error() {
        let base = serve_once("500 Internal Server Error", "{}".to_string()).await;
        let result = HistoryLoader::new(&base).fetch().await;
        assert!(matches!(result, Err(ChatError::Status(status)) if status.as_u16() == 500));
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = HistoryLoader::new(&format!("http://{addr}")).fetch().await;
        assert!(matches!(result, Err(ChatError::Http(_))));
    }
}
