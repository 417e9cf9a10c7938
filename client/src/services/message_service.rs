use rustcord_crypto::decrypt_frame;
use rustcord_protocol::{classify, ClientMessage, Envelope};

use crate::channels::ChatEvent;
use crate::services::presence_service;
use crate::services::session_service::Session;
use crate::state::SERVER_AUTHOR;

/// Route one inbound text frame.
///
/// Frames that arrive once the session is no longer open are dropped
/// without touching the feed or the roster.
pub(crate) fn handle_incoming_frame(session: &mut Session, raw: &str) {
    if !session.is_open() {
        tracing::debug!(frame_len = raw.len(), "dropping frame for inactive session");
        return;
    }

    let envelope = classify(raw);
    tracing::debug!(kind = envelope.kind(), frame_len = raw.len(), "inbound frame");

    match envelope {
        Envelope::PresenceSnapshot { users } => presence_service::apply_snapshot(session, users),
        Envelope::PresenceUpdate { user } => presence_service::apply_update(session, user),
        Envelope::ChatMessage { ciphertext, author } => {
            handle_chat_envelope(session, &ciphertext, author);
        }
        Envelope::Unrecognized(raw) => handle_legacy_frame(session, raw),
    }
}

fn handle_chat_envelope(session: &mut Session, ciphertext: &str, author: Option<String>) {
    let Some(key) = session.key.as_ref() else {
        return;
    };
    let content = match decrypt_frame(ciphertext, key) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(
                error = %e,
                ciphertext_len = ciphertext.len(),
                "dropping chat message that failed to decrypt"
            );
            return;
        }
    };

    let author = author.unwrap_or_else(|| SERVER_AUTHOR.to_string());
    let message = session.feed_message(author, content, None);
    session.append_feed(ChatEvent::MessageReceived { message });
}

/// Anything that is not an envelope: try it as a bare ciphertext, and show
/// it verbatim from the server if that fails.
///
/// Decrypted text without an `author: ` prefix is kept and attributed to the
/// server. Older web clients silently dropped such lines; this client does not.
fn handle_legacy_frame(session: &mut Session, raw: String) {
    let decrypted = session.key.as_ref().map(|key| decrypt_frame(&raw, key));
    let (author, content) = match decrypted {
        Some(Ok(plaintext)) => split_legacy_author(&plaintext),
        Some(Err(e)) => {
            tracing::debug!(error = %e, frame_len = raw.len(), "legacy frame is not ciphertext");
            (SERVER_AUTHOR.to_string(), raw)
        }
        None => (SERVER_AUTHOR.to_string(), raw),
    };

    let message = session.feed_message(author, content, None);
    session.append_feed(ChatEvent::MessageReceived { message });
}

/// Split `"<author>: <content>"`. The author may not be empty or contain a
/// colon; otherwise the whole line belongs to the server.
fn split_legacy_author(plaintext: &str) -> (String, String) {
    match plaintext.split_once(": ") {
        Some((author, content)) if !author.is_empty() && !author.contains(':') => {
            (author.to_string(), content.to_string())
        }
        _ => (SERVER_AUTHOR.to_string(), plaintext.to_string()),
    }
}

/// Encrypt `text`, send it as a `chat_message` envelope and echo it locally.
///
/// Blank input and a session that is not open are silent no-ops.
pub(crate) fn send_chat_message(session: &mut Session, text: &str) {
    if text.trim().is_empty() || !session.is_open() {
        return;
    }
    let Some(key) = session.key.as_ref() else {
        return;
    };

    let sealed = match ClientMessage::seal_chat(text, key) {
        Ok(sealed) => sealed,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encrypt chat message");
            return;
        }
    };
    if let Err(e) = session.transmit(&sealed) {
        tracing::warn!(error = %e, "failed to send chat message");
        return;
    }
    tracing::debug!(len = text.len(), "chat message sent");

    let author = session.identity.feed_author();
    let avatar = session.identity.feed_avatar();
    let message = session.feed_message(author, text.to_string(), Some(avatar));
    session.append_feed(ChatEvent::MessageSent { message });
}

#[cfg(test)]
mod tests {
    use rustcord_crypto::{encrypt_frame, SymmetricKey};
    use serde_json::Value;

    use super::*;
    use crate::channels::SessionEvent;
    use crate::services::session_service::tests::{open_session, OpenSession};

    fn key() -> SymmetricKey {
        SymmetricKey::from_bytes([4u8; 32])
    }

    fn received(event: SessionEvent) -> (String, String) {
        match event {
            SessionEvent::Chat(ChatEvent::MessageReceived { message }) => {
                (message.author, message.content)
            }
            other => panic!("expected a received message, got {other:?}"),
        }
    }

    #[test]
    fn legacy_author_split() {
        assert_eq!(split_legacy_author("Bo: hi there"), ("Bo".into(), "hi there".into()));
        assert_eq!(split_legacy_author("Bo: a: b"), ("Bo".into(), "a: b".into()));
        assert_eq!(split_legacy_author("no separator"), ("Server".into(), "no separator".into()));
        assert_eq!(split_legacy_author(": empty"), ("Server".into(), ": empty".into()));
        assert_eq!(split_legacy_author("a:b: c"), ("Server".into(), "a:b: c".into()));
    }

    #[test]
    fn enveloped_chat_uses_author_or_server() {
        let OpenSession { mut session, mut events, .. } = open_session();
        let ct = encrypt_frame("hello", &key()).unwrap();

        handle_incoming_frame(
            &mut session,
            &format!(r#"{{"type":"chat_message","ciphertext":"{ct}","author":"Bo"}}"#),
        );
        assert_eq!(received(events.try_recv().unwrap()), ("Bo".into(), "hello".into()));

        handle_incoming_frame(&mut session, &format!(r#"{{"type":"chat_message","ciphertext":"{ct}"}}"#));
        assert_eq!(received(events.try_recv().unwrap()), ("Server".into(), "hello".into()));
    }

    #[test]
    fn undecryptable_chat_is_dropped() {
        let OpenSession { mut session, mut events, .. } = open_session();
        let wrong = encrypt_frame("hello", &SymmetricKey::from_bytes([9u8; 32])).unwrap();
        handle_incoming_frame(
            &mut session,
            &format!(r#"{{"type":"chat_message","ciphertext":"{wrong}","author":"Bo"}}"#),
        );
        handle_incoming_frame(&mut session, r#"{"type":"chat_message","ciphertext":"abc"}"#);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn legacy_frames() {
        let OpenSession { mut session, mut events, .. } = open_session();

        handle_incoming_frame(&mut session, &encrypt_frame("Bo: yo", &key()).unwrap());
        assert_eq!(received(events.try_recv().unwrap()), ("Bo".into(), "yo".into()));

        handle_incoming_frame(&mut session, &encrypt_frame("just text", &key()).unwrap());
        assert_eq!(received(events.try_recv().unwrap()), ("Server".into(), "just text".into()));

        handle_incoming_frame(&mut session, "hello");
        assert_eq!(received(events.try_recv().unwrap()), ("Server".into(), "hello".into()));
    }

    #[test]
    fn send_encrypts_and_echoes() {
        let OpenSession { mut session, mut events, mut wire } = open_session();
        send_chat_message(&mut session, "hi");

        let frame: Value = serde_json::from_str(&wire.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "chat_message");
        let ct = frame["ciphertext"].as_str().unwrap();
        assert_eq!(decrypt_frame(ct, &key()).unwrap(), "hi");
        assert!(wire.try_recv().is_err());

        match events.try_recv().unwrap() {
            SessionEvent::Chat(ChatEvent::MessageSent { message }) => {
                assert_eq!(message.author, "Ava");
                assert_eq!(message.content, "hi");
                assert_eq!(message.avatar.as_deref(), Some("A"));
            }
            other => panic!("expected local echo, got {other:?}"),
        }
    }

    #[test]
    fn blank_or_closed_send_is_noop() {
        let OpenSession { mut session, mut events, mut wire } = open_session();
        send_chat_message(&mut session, "   ");
        assert!(wire.try_recv().is_err());
        assert!(events.try_recv().is_err());

        session.state.mark_closing();
        send_chat_message(&mut session, "hi");
        assert!(wire.try_recv().is_err());
        assert!(events.try_recv().is_err());
    }
}
