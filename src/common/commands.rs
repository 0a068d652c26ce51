/// Commands the widget sends down to the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Emitted as the `sendMessage` event with `{ userId, message }`.
    SendMessage { user_id: String, message: String },
}
