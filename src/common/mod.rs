pub mod commands;
pub mod events;
pub mod retention;
pub mod types;

pub use commands::ChatCommand;
pub use events::ChatEvent;
pub use types::{AuthUser, ChatMessage, Notice};
