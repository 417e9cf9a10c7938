pub mod chat_channel;
pub mod notification_channel;
pub mod presence_channel;

pub use chat_channel::ChatEvent;
pub use notification_channel::NetworkStatusEvent;
pub use presence_channel::PresenceEvent;

use serde::Serialize;
use tokio::sync::mpsc;

/// Receives the three notification streams a session produces.
///
/// Callbacks run on the session task, in the order the session changed.
/// Implementations must not block.
pub trait SessionObserver: Send + Sync + 'static {
    fn on_chat(&self, event: ChatEvent);
    fn on_presence(&self, event: PresenceEvent);
    fn on_status(&self, event: NetworkStatusEvent);
}

/// Any one session notification, as forwarded by [`EventChannel`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "channel", content = "event")]
pub enum SessionEvent {
    Chat(ChatEvent),
    Presence(PresenceEvent),
    Status(NetworkStatusEvent),
}

/// Observer that funnels every notification into one ordered channel.
#[derive(Debug, Clone)]
pub struct EventChannel {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

// A dropped receiver just means nobody is listening any more.
impl SessionObserver for EventChannel {
    fn on_chat(&self, event: ChatEvent) {
        let _ = self.tx.send(SessionEvent::Chat(event));
    }

    fn on_presence(&self, event: PresenceEvent) {
        let _ = self.tx.send(SessionEvent::Presence(event));
    }

    fn on_status(&self, event: NetworkStatusEvent) {
        let _ = self.tx.send(SessionEvent::Status(event));
    }
}
