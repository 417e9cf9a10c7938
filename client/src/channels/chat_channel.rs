use serde::Serialize;

use crate::state::FeedMessage;

/// Feed-append events. Every variant carries the appended message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
pub enum ChatEvent {
    /// Decrypted line from the server, enveloped or legacy.
    MessageReceived { message: FeedMessage },
    /// Local echo of a line we just sent.
    MessageSent { message: FeedMessage },
    /// Greeting appended when the session opens.
    SystemMessage { message: FeedMessage },
}

impl ChatEvent {
    pub fn message(&self) -> &FeedMessage {
        match self {
            Self::MessageReceived { message }
            | Self::MessageSent { message }
            | Self::SystemMessage { message } => message,
        }
    }
}
