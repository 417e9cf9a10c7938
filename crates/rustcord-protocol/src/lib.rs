pub mod envelope;
pub mod error;
pub mod presence;

pub use envelope::{classify, ClientMessage, Envelope};
pub use error::ProtocolError;
pub use presence::{normalize_presence_user, PresenceStatus, PresenceUser, RosterEntry};
