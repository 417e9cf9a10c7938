use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use rustcord_protocol::{PresenceStatus, PresenceUser};
use serde::{Deserialize, Serialize};

use crate::presence_store::PresenceStore;

/// Author shown for server-originated lines and unattributed chat.
pub const SERVER_AUTHOR: &str = "Server";

/// Author of the local greeting appended when a session opens.
pub const WELCOME_AUTHOR: &str = "Rustcord";

pub const WELCOME_TEXT: &str = "Welcome to Rustcord! Start chatting securely.";

/// Which OAuth provider vouched for the local identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Google,
    #[serde(rename = "github")]
    GitHub,
}

impl AuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::GitHub => "github",
        }
    }

    /// Parse a provider name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "google" => Some(Self::Google),
            "github" => Some(Self::GitHub),
            _ => None,
        }
    }
}

/// The authenticated local user. Fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub provider: AuthProvider,
}

impl Identity {
    /// Build an identity from the fields an OAuth callback hands back.
    ///
    /// The id is `oauth_<provider>_<unix millis>`; it is only unique per
    /// sign-in, not per person.
    pub fn from_oauth_callback(
        provider: AuthProvider,
        display_name: impl Into<String>,
        email: Option<String>,
        avatar: Option<String>,
    ) -> Self {
        Self {
            id: format!("oauth_{}_{}", provider.as_str(), timestamp_now_ms()),
            display_name: display_name.into(),
            email: email.filter(|e| !e.is_empty()),
            avatar: avatar.filter(|a| !a.is_empty()),
            provider,
        }
    }

    /// Wire form used for the presence announcement on connect.
    pub fn presence_user(&self) -> PresenceUser {
        PresenceUser {
            id: self.id.clone(),
            username: self.display_name.clone(),
            status: Some(PresenceStatus::Online.as_str().to_string()),
            avatar: self.avatar.clone(),
            email: self.email.clone(),
        }
    }

    /// Author label for locally echoed messages.
    pub fn feed_author(&self) -> String {
        if self.display_name.trim().is_empty() {
            "User".to_string()
        } else {
            self.display_name.clone()
        }
    }

    /// Avatar for locally echoed messages: the profile image, else initials.
    pub fn feed_avatar(&self) -> String {
        match &self.avatar {
            Some(url) => url.clone(),
            None => initials(&self.feed_author()),
        }
    }
}

/// Up to two uppercase initials taken from the first letters of each word.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

/// Lifecycle of one authenticated session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    /// No session started yet.
    #[default]
    Idle,
    /// Deriving the session key.
    AwaitingKey,
    /// Key ready, socket handshake in flight.
    Connecting,
    Open,
    /// Terminal. A new login starts a new session.
    Closed,
}

/// One line in the chat feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMessage {
    pub id: String,
    pub author: String,
    pub content: String,
    pub timestamp: u64,
    pub avatar: Option<String>,
}

/// State shared between the session task and its handle.
///
/// Only the session task writes `status` and `roster`; handles read them.
/// `closing` is the one field a handle writes, so that a logout takes effect
/// before the task gets around to processing the command.
#[derive(Debug, Default)]
pub struct SessionState {
    pub status: RwLock<ConnectionStatus>,
    pub roster: RwLock<PresenceStore>,
    pub closing: AtomicBool,
}

impl SessionState {
    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    pub fn mark_closing(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }
}

pub type SharedState = Arc<SessionState>;

/// Current Unix timestamp in milliseconds.
pub fn timestamp_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str, avatar: Option<&str>) -> Identity {
        Identity {
            id: "u1".into(),
            display_name: name.into(),
            email: None,
            avatar: avatar.map(str::to_string),
            provider: AuthProvider::Google,
        }
    }

    #[test]
    fn oauth_identity_id_embeds_provider() {
        let id = Identity::from_oauth_callback(AuthProvider::GitHub, "Ava", None, Some(String::new()));
        assert!(id.id.starts_with("oauth_github_"));
        assert!(id.id["oauth_github_".len()..].parse::<u64>().is_ok());
        assert_eq!(id.avatar, None);
    }

    #[test]
    fn initials_take_two_uppercase_letters() {
        assert_eq!(initials("ava lovelace"), "AL");
        assert_eq!(initials("Ava"), "A");
        assert_eq!(initials("ada byron king"), "AB");
        assert_eq!(initials(""), "");
    }

    #[test]
    fn echo_author_falls_back_to_user() {
        assert_eq!(identity("Ava", None).feed_author(), "Ava");
        assert_eq!(identity("  ", None).feed_author(), "User");
        assert_eq!(identity("", None).feed_avatar(), "U");
    }

    #[test]
    fn echo_avatar_prefers_profile_image() {
        assert_eq!(identity("Ava L", Some("https://a/p.png")).feed_avatar(), "https://a/p.png");
        assert_eq!(identity("Ava L", None).feed_avatar(), "AL");
    }

    #[test]
    fn presence_user_announces_online() {
        let user = identity("Ava", None).presence_user();
        assert_eq!(user.id, "u1");
        assert_eq!(user.status.as_deref(), Some("online"));
    }

    #[test]
    fn provider_names_parse() {
        assert_eq!(AuthProvider::from_name("GitHub"), Some(AuthProvider::GitHub));
        assert_eq!(AuthProvider::from_name("google"), Some(AuthProvider::Google));
        assert_eq!(AuthProvider::from_name("twitter"), None);
    }
}
