use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::AuthUser;

pub const DEFAULT_CONFIG_PATH: &str = "config/chat.json";
pub const BACKEND_URL_ENV: &str = "CHAT_BACKEND_URL";
const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Signed-in user; without one the widget is read-only.
    #[serde(default)]
    pub user: Option<AuthUser>,
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            user: None,
            reconnect_attempts: default_reconnect_attempts(),
        }
    }
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_reconnect_attempts() -> u32 {
    DEFAULT_RECONNECT_ATTEMPTS
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    let mut config = match fs::read_to_string(path) {
        Ok(content) => parse_config(&content, path),
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    };

    if let Ok(url) = env::var(BACKEND_URL_ENV) {
        if !url.trim().is_empty() {
            log::debug!("Backend URL taken from {BACKEND_URL_ENV}");
            config.backend_url = url;
        }
    }

    config
}

fn parse_config(content: &str, path: &Path) -> AppConfig {
    match serde_json::from_str::<AppConfig>(content) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("Failed to parse config file {}: {err}", path.display());
            AppConfig::default()
        }
    }
}

impl AppConfig {
    /// Applies command-line overrides; a user id alone is enough to sign in.
    pub fn with_overrides(
        mut self,
        backend_url: Option<String>,
        user_id: Option<String>,
        user_name: Option<String>,
    ) -> Self {
        if let Some(url) = backend_url {
            self.backend_url = url;
        }
        match (user_id, user_name) {
            (Some(id), name) => {
                self.user = Some(AuthUser {
                    id,
                    name: name.unwrap_or_default(),
                });
            }
            (None, Some(name)) => {
                if let Some(user) = self.user.as_mut() {
                    user.name = name;
                } else {
                    log::warn!("--user-name given without --user-id; ignoring it");
                }
            }
            (None, None) => {}
        }
        self
    }
}
