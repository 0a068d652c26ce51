mod common;
mod config;
mod error;
mod network;
mod ui;

use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use network::transport::socket_url;
use network::{ChatSession, SessionConfig};
use ui::ChatApp;
use ui::state::WidgetState;

use common::{ChatEvent, ChatMessage};
use config::AppConfig;

#[derive(Parser)]
#[command(
    name = "campus_chat",
    version,
    about = "Live chat widget for the campus community"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Backend base URL, overrides config and CHAT_BACKEND_URL
    #[arg(long, value_name = "URL")]
    backend_url: Option<String>,
    /// Id of the signed-in user
    #[arg(long)]
    user_id: Option<String>,
    /// Display name of the signed-in user
    #[arg(long)]
    user_name: Option<String>,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Run headless and log the live window until Ctrl-C
    Tail,
}

#[tokio::main]
async fn main() -> Result<(), eframe::Error> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let app_config =
        config::load_config(&cli.config).with_overrides(cli.backend_url, cli.user_id, cli.user_name);

    let session_config = match session_config(&app_config) {
        Some(session_config) => session_config,
        None => return Ok(()),
    };

    if cli.mode == Some(Mode::Tail) {
        run_tail(session_config).await;
        return Ok(());
    }

    run_widget(app_config, session_config)
}

fn session_config(app_config: &AppConfig) -> Option<SessionConfig> {
    match socket_url(&app_config.backend_url) {
        Ok(url) => {
            let mut session_config = SessionConfig::new(app_config.backend_url.clone(), url);
            session_config.reconnect_attempts = app_config.reconnect_attempts;
            Some(session_config)
        }
        Err(err) => {
            log::error!("Cannot start chat: {err}");
            None
        }
    }
}

async fn run_tail(session_config: SessionConfig) {
    let (session, mut event_rx) = ChatSession::mount(session_config);
    let mut state = WidgetState::new();

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(event) => log_event(&mut state, event),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, closing chat");
                break;
            }
        }
    }

    session.unmount().await;
}

fn log_event(state: &mut WidgetState, event: ChatEvent) {
    let now = Utc::now();
    match event {
        ChatEvent::HistoryLoaded(history) => {
            state.seed_history(history, now);
            log::info!("History: {} messages in window", state.messages.len());
            for message in &state.messages {
                print_message(message);
            }
        }
        ChatEvent::MessageReceived(message) => {
            let id = message.id.clone();
            let known = state.messages.iter().any(|message| message.id == id);
            state.push_message(message, now);
            if let Some(message) = state.messages.iter().find(|message| message.id == id) {
                if !known {
                    print_message(message);
                }
            }
        }
        ChatEvent::Sweep => {
            let before = state.messages.len();
            state.sweep(now);
            log::info!("Sweep: {before} -> {} messages in window", state.messages.len());
        }
        ChatEvent::Notice(text) => log::warn!("{text}"),
        other => state.apply_event(other, now),
    }
}

fn print_message(message: &ChatMessage) {
    println!("[{}] {}", message.sender_name(), message.content);
}

fn run_widget(app_config: AppConfig, session_config: SessionConfig) -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions::default();
    let (session, event_receiver) = ChatSession::mount(session_config);
    let user = app_config.user;

    eframe::run_native(
        "Campus Chat",
        options,
        Box::new(move |cc| {
            match &user {
                Some(user) => log::info!("Chat widget started for user {}", user.id),
                None => log::info!("Chat widget started read-only (no user configured)"),
            }

            Ok(Box::new(ChatApp::new(cc, user, session, event_receiver)))
        }),
    )
}
