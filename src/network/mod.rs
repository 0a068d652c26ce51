pub mod client;
pub mod history;
pub mod protocol;
pub mod session;
pub mod transport;

pub use session::{ChatSession, SessionConfig};
