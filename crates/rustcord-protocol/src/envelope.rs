use rustcord_crypto::{encrypt_frame, SymmetricKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::presence::{PresenceStatus, PresenceUser};

pub const TYPE_PRESENCE_SNAPSHOT: &str = "presence_snapshot";
pub const TYPE_PRESENCE_UPDATE: &str = "presence_update";
pub const TYPE_CHAT_MESSAGE: &str = "chat_message";

/// An inbound frame after classification.
///
/// Anything that is not a well-formed envelope becomes [`Envelope::Unrecognized`]
/// carrying the raw frame text, so callers can run the legacy
/// bare-ciphertext path on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Full roster; replaces whatever the client currently holds.
    PresenceSnapshot { users: Vec<PresenceUser> },
    /// One participant joined or changed.
    PresenceUpdate { user: PresenceUser },
    /// Encrypted chat line. `author` falls back to "Server" when absent.
    ChatMessage {
        ciphertext: String,
        author: Option<String>,
    },
    Unrecognized(String),
}

impl Envelope {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PresenceSnapshot { .. } => TYPE_PRESENCE_SNAPSHOT,
            Self::PresenceUpdate { .. } => TYPE_PRESENCE_UPDATE,
            Self::ChatMessage { .. } => TYPE_CHAT_MESSAGE,
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Classify a raw text frame. Never fails: malformed input is `Unrecognized`.
pub fn classify(raw: &str) -> Envelope {
    match parse_envelope(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::trace!(error = %e, frame_len = raw.len(), "frame is not a recognized envelope");
            Envelope::Unrecognized(raw.to_string())
        }
    }
}

/// Strict parse of a raw text frame into a recognized envelope variant.
pub fn parse_envelope(raw: &str) -> Result<Envelope, ProtocolError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ProtocolError::MalformedEnvelope(format!("not JSON: {e}")))?;
    let Value::Object(fields) = value else {
        return Err(ProtocolError::MalformedEnvelope(
            "envelope is not a JSON object".into(),
        ));
    };

    let tag = fields
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::MalformedEnvelope("missing type tag".into()))?;

    match tag {
        TYPE_PRESENCE_SNAPSHOT => parse_snapshot(&fields),
        TYPE_PRESENCE_UPDATE => parse_update(&fields),
        TYPE_CHAT_MESSAGE => parse_chat(&fields),
        other => Err(ProtocolError::MalformedEnvelope(format!(
            "unknown envelope type {other:?}"
        ))),
    }
}

fn parse_snapshot(fields: &Map<String, Value>) -> Result<Envelope, ProtocolError> {
    let members = fields
        .get("users")
        .and_then(Value::as_array)
        .ok_or_else(|| ProtocolError::MalformedEnvelope("snapshot users is not an array".into()))?;

    let users: Vec<PresenceUser> = members.iter().filter_map(decode_user).collect();
    if users.len() < members.len() {
        tracing::debug!(
            skipped = members.len() - users.len(),
            "snapshot members without a usable id were skipped"
        );
    }
    Ok(Envelope::PresenceSnapshot { users })
}

fn parse_update(fields: &Map<String, Value>) -> Result<Envelope, ProtocolError> {
    let user = fields
        .get("user")
        .filter(|v| v.is_object())
        .ok_or_else(|| ProtocolError::MalformedEnvelope("update user is not an object".into()))?;
    let user = decode_user(user)
        .ok_or_else(|| ProtocolError::MalformedEnvelope("update user has no id".into()))?;
    Ok(Envelope::PresenceUpdate { user })
}

fn parse_chat(fields: &Map<String, Value>) -> Result<Envelope, ProtocolError> {
    let ciphertext = fields
        .get("ciphertext")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::MalformedEnvelope("chat ciphertext is not a string".into()))?;
    let author = fields
        .get("author")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(Envelope::ChatMessage {
        ciphertext: ciphertext.to_string(),
        author,
    })
}

/// Decode one roster member leniently.
///
/// Only a non-empty string `id` is required. A missing username falls back to
/// the id; optional fields that are not strings are treated as absent.
fn decode_user(value: &Value) -> Option<PresenceUser> {
    let fields = value.as_object()?;
    let text = |name: &str| {
        fields
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let id = text("id").filter(|id| !id.is_empty())?;
    Some(PresenceUser {
        username: text("username").unwrap_or_else(|| id.clone()),
        id,
        status: text("status"),
        avatar: text("avatar"),
        email: text("email"),
    })
}

/// Client → server messages. Only the enveloped form is ever emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Sent once when the connection opens.
    PresenceUpdate { user: PresenceUser },
    /// Local status change after the initial announcement.
    PresenceStatus {
        user_id: String,
        status: PresenceStatus,
    },
    ChatMessage { ciphertext: String },
}

impl ClientMessage {
    /// Encrypt `plaintext` and wrap it as a `chat_message` envelope.
    pub fn seal_chat(plaintext: &str, key: &SymmetricKey) -> Result<Self, ProtocolError> {
        let ciphertext = encrypt_frame(plaintext, key)?;
        Ok(Self::ChatMessage { ciphertext })
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use rustcord_crypto::decrypt_frame;
    use serde_json::json;

    use super::*;

    #[test]
    fn chat_message_with_ciphertext_is_recognized() {
        let env = classify(r#"{"type":"chat_message","ciphertext":"abc"}"#);
        assert_eq!(
            env,
            Envelope::ChatMessage {
                ciphertext: "abc".into(),
                author: None
            }
        );
    }

    #[test]
    fn chat_message_without_ciphertext_is_unrecognized() {
        let raw = r#"{"type":"chat_message"}"#;
        assert_eq!(classify(raw), Envelope::Unrecognized(raw.into()));

        let raw = r#"{"type":"chat_message","ciphertext":42}"#;
        assert_eq!(classify(raw), Envelope::Unrecognized(raw.into()));
    }

    #[test]
    fn non_json_is_unrecognized() {
        assert_eq!(classify("hello"), Envelope::Unrecognized("hello".into()));
    }

    #[test]
    fn chat_author_is_optional_and_must_be_a_string() {
        let env = classify(r#"{"type":"chat_message","ciphertext":"x","author":"Bo"}"#);
        assert_eq!(
            env,
            Envelope::ChatMessage {
                ciphertext: "x".into(),
                author: Some("Bo".into())
            }
        );

        let env = classify(r#"{"type":"chat_message","ciphertext":"x","author":7}"#);
        assert_eq!(
            env,
            Envelope::ChatMessage {
                ciphertext: "x".into(),
                author: None
            }
        );
    }

    #[test]
    fn snapshot_requires_user_array() {
        let env = classify(
            r#"{"type":"presence_snapshot","users":[{"id":"a","username":"A","status":"online"},{"id":"b","username":"B"}]}"#,
        );
        let Envelope::PresenceSnapshot { users } = env else {
            panic!("expected presence snapshot");
        };
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].status, None);

        let raw = r#"{"type":"presence_snapshot","users":{"id":"a"}}"#;
        assert_eq!(classify(raw), Envelope::Unrecognized(raw.into()));

        let raw = r#"{"type":"presence_snapshot"}"#;
        assert_eq!(classify(raw), Envelope::Unrecognized(raw.into()));
    }

    #[test]
    fn empty_snapshot_is_valid() {
        assert_eq!(
            classify(r#"{"type":"presence_snapshot","users":[]}"#),
            Envelope::PresenceSnapshot { users: vec![] }
        );
    }

    #[test]
    fn snapshot_keeps_valid_members_and_skips_the_rest() {
        let env = classify(
            r#"{"type":"presence_snapshot","users":[
                {"id":"c","username":"C","status":"online"},
                {"id":"d","status":"idle"},
                {"username":"no id"},
                {"id":5,"username":"numeric id"},
                {"id":"","username":"empty id"},
                7,
                {"id":"e","username":"E","status":3,"avatar":null,"email":["x"]}
            ]}"#,
        );
        let Envelope::PresenceSnapshot { users } = env else {
            panic!("expected presence snapshot");
        };
        let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["c", "d", "e"]);
        assert_eq!(users[1].username, "d");
        assert_eq!(users[1].status.as_deref(), Some("idle"));
        assert_eq!(users[2].status, None);
        assert_eq!(users[2].avatar, None);
        assert_eq!(users[2].email, None);
    }

    #[test]
    fn update_without_username_is_applied() {
        let env = classify(r#"{"type":"presence_update","user":{"id":"b","status":"dnd"}}"#);
        let Envelope::PresenceUpdate { user } = env else {
            panic!("expected presence update");
        };
        assert_eq!(user.id, "b");
        assert_eq!(user.username, "b");
        assert_eq!(user.status.as_deref(), Some("dnd"));
    }

    #[test]
    fn update_requires_non_null_object() {
        let env = classify(r#"{"type":"presence_update","user":{"id":"b","username":"B","status":"dnd"}}"#);
        assert!(matches!(env, Envelope::PresenceUpdate { ref user } if user.id == "b"));

        for raw in [
            r#"{"type":"presence_update","user":null}"#,
            r#"{"type":"presence_update","user":"b"}"#,
            r#"{"type":"presence_update"}"#,
            r#"{"type":"presence_update","user":{"username":"no id"}}"#,
        ] {
            assert_eq!(classify(raw), Envelope::Unrecognized(raw.into()));
        }
    }

    #[test]
    fn unknown_or_missing_tag_is_unrecognized() {
        for raw in [
            r#"{"type":"typing","user":"a"}"#,
            r#"{"users":[]}"#,
            r"[1,2,3]",
            r"42",
            r#""a string""#,
        ] {
            assert_eq!(classify(raw), Envelope::Unrecognized(raw.into()));
        }
    }

    #[test]
    fn parse_reports_malformed_envelope() {
        assert!(matches!(
            parse_envelope("{not json"),
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn presence_update_wire_shape() {
        let msg = ClientMessage::PresenceUpdate {
            user: PresenceUser {
                id: "u1".into(),
                username: "Ava".into(),
                status: Some("online".into()),
                avatar: Some("https://example.com/ava.png".into()),
                email: None,
            },
        };
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "presence_update",
                "user": {
                    "id": "u1",
                    "username": "Ava",
                    "status": "online",
                    "avatar": "https://example.com/ava.png"
                }
            })
        );
    }

    #[test]
    fn presence_status_wire_shape() {
        let msg = ClientMessage::PresenceStatus {
            user_id: "u1".into(),
            status: PresenceStatus::Dnd,
        };
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "presence_status", "user_id": "u1", "status": "dnd"})
        );
    }

    #[test]
    fn sealed_chat_decrypts_with_same_key() {
        let key = SymmetricKey::from_bytes([5u8; 32]);
        let msg = ClientMessage::seal_chat("hi", &key).unwrap();
        let json = msg.to_json().unwrap();

        // The outbound frame must itself classify as a chat envelope.
        let Envelope::ChatMessage { ciphertext, author } = classify(&json) else {
            panic!("outbound chat frame did not classify as chat_message");
        };
        assert!(author.is_none());
        assert_eq!(decrypt_frame(&ciphertext, &key).unwrap(), "hi");
    }
}
