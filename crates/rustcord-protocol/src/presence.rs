use std::fmt;

use serde::{Deserialize, Serialize};

/// Presence status of a roster participant.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Idle,
    Dnd,
    #[default]
    Offline,
}

impl PresenceStatus {
    /// Parse the lowercase wire spelling. Unknown spellings yield `None`.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "online" => Some(Self::Online),
            "idle" => Some(Self::Idle),
            "dnd" => Some(Self::Dnd),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::Dnd => "dnd",
            Self::Offline => "offline",
        }
    }

    /// Everything except `Offline` counts towards the online total.
    pub fn is_online(self) -> bool {
        self != Self::Offline
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant as it appears on the wire.
///
/// Envelope decoding fills `username` from `id` when the server omits it, so
/// only `id` is mandatory on the wire. `status` stays a raw string here so
/// that a status this client does not know about still parses; the mapping to
/// [`PresenceStatus`] happens in [`normalize_presence_user`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUser {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A normalized roster entry, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: String,
    pub username: String,
    pub status: PresenceStatus,
    pub avatar: Option<String>,
    pub email: Option<String>,
}

/// Apply the wire defaults: a missing or unknown status becomes `Offline`,
/// missing or null `avatar`/`email` stay absent.
pub fn normalize_presence_user(user: PresenceUser) -> RosterEntry {
    let status = user
        .status
        .as_deref()
        .and_then(PresenceStatus::from_wire)
        .unwrap_or_default();

    RosterEntry {
        id: user.id,
        username: user.username,
        status,
        avatar: user.avatar,
        email: user.email,
    }
}

impl From<PresenceUser> for RosterEntry {
    fn from(user: PresenceUser) -> Self {
        normalize_presence_user(user)
    }
}
