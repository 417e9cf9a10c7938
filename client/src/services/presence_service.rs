use rustcord_protocol::{normalize_presence_user, ClientMessage, PresenceStatus, PresenceUser};

use crate::channels::PresenceEvent;
use crate::error::SessionError;
use crate::presence_store::Upsert;
use crate::services::session_service::Session;

/// Replace the roster with a server snapshot.
pub(crate) fn apply_snapshot(session: &Session, users: Vec<PresenceUser>) {
    let (entries, online_count) = {
        let mut roster = session.state.roster.write();
        roster.replace_all(users.into_iter().map(normalize_presence_user));
        (roster.entries().to_vec(), roster.online_count())
    };
    tracing::debug!(users = entries.len(), online = online_count, "presence snapshot applied");
    session
        .observer
        .on_presence(PresenceEvent::RosterReplaced { entries, online_count });
}

/// Insert or overwrite one participant.
pub(crate) fn apply_update(session: &Session, user: PresenceUser) {
    let entry = normalize_presence_user(user);
    let (outcome, online_count) = {
        let mut roster = session.state.roster.write();
        let outcome = roster.upsert(entry.clone());
        (outcome, roster.online_count())
    };
    tracing::debug!(
        user = %entry.id,
        status = %entry.status,
        joined = outcome == Upsert::Inserted,
        "presence update applied"
    );
    session
        .observer
        .on_presence(PresenceEvent::UserUpdated { entry, online_count });
}

pub(crate) fn clear_roster(session: &Session) {
    session.state.roster.write().clear();
    session.observer.on_presence(PresenceEvent::RosterCleared);
}

/// Tell the server who we are. Sent once, right after the connection opens.
pub(crate) fn announce_presence(session: &Session) -> Result<(), SessionError> {
    session.transmit(&ClientMessage::PresenceUpdate {
        user: session.identity.presence_user(),
    })
}

/// Publish a local status change. Ignored unless the session is open.
pub(crate) fn publish_status(session: &Session, status: PresenceStatus) {
    if !session.is_open() {
        return;
    }
    let message = ClientMessage::PresenceStatus {
        user_id: session.identity.id.clone(),
        status,
    };
    match session.transmit(&message) {
        Ok(()) => tracing::info!(%status, "published presence status"),
        Err(e) => tracing::warn!(error = %e, "failed to publish presence status"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::channels::SessionEvent;
    use crate::services::message_service::handle_incoming_frame;
    use crate::services::session_service::tests::{open_session, OpenSession};

    fn roster_ids(session: &Session) -> Vec<String> {
        session
            .state
            .roster
            .read()
            .entries()
            .iter()
            .map(|e| e.id.clone())
            .collect()
    }

    #[test]
    fn snapshot_then_update() {
        let OpenSession { mut session, mut events, .. } = open_session();
        handle_incoming_frame(
            &mut session,
            r#"{"type":"presence_snapshot","users":[{"id":"a","username":"A","status":"online"},{"id":"b","username":"B","status":"idle"}]}"#,
        );
        match events.try_recv().unwrap() {
            SessionEvent::Presence(PresenceEvent::RosterReplaced { entries, online_count }) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(online_count, 2);
            }
            other => panic!("unexpected {other:?}"),
        }

        handle_incoming_frame(
            &mut session,
            r#"{"type":"presence_snapshot","users":[{"id":"c","username":"C","status":"online"}]}"#,
        );
        assert_eq!(roster_ids(&session), ["c"]);

        handle_incoming_frame(
            &mut session,
            r#"{"type":"presence_update","user":{"id":"b","username":"B","status":"dnd"}}"#,
        );
        assert_eq!(roster_ids(&session), ["c", "b"]);
        assert_eq!(session.state.roster.read().online_count(), 2);
    }

    #[test]
    fn snapshot_with_bad_member_still_replaces_roster() {
        let OpenSession { mut session, mut events, .. } = open_session();
        handle_incoming_frame(
            &mut session,
            r#"{"type":"presence_snapshot","users":[{"id":"a","username":"A","status":"online"}]}"#,
        );
        let _ = events.try_recv();

        handle_incoming_frame(
            &mut session,
            r#"{"type":"presence_snapshot","users":[{"id":"c","username":"C","status":"online"},{"id":"d","status":"idle"},{"username":"ghost"}]}"#,
        );
        assert_eq!(roster_ids(&session), ["c", "d"]);
        assert_eq!(session.state.roster.read().online_count(), 2);
        assert!(matches!(
            events.try_recv(),
            Ok(SessionEvent::Presence(PresenceEvent::RosterReplaced { .. }))
        ));
        // nothing lands in the feed
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn unknown_status_counts_as_offline() {
        let OpenSession { mut session, .. } = open_session();
        handle_incoming_frame(
            &mut session,
            r#"{"type":"presence_update","user":{"id":"a","username":"A","status":"away"}}"#,
        );
        let roster = session.state.roster.read();
        assert_eq!(roster.get("a").map(|e| e.status), Some(PresenceStatus::Offline));
        assert_eq!(roster.online_count(), 0);
    }

    #[test]
    fn announce_sends_presence_update() {
        let OpenSession { session, mut wire, .. } = open_session();
        announce_presence(&session).unwrap();
        let frame: Value = serde_json::from_str(&wire.try_recv().unwrap()).unwrap();
        assert_eq!(
            frame,
            json!({
                "type": "presence_update",
                "user": {"id": "u1", "username": "Ava", "status": "online"}
            })
        );
    }

    #[test]
    fn status_change_only_when_open() {
        let OpenSession { session, mut wire, .. } = open_session();
        publish_status(&session, PresenceStatus::Idle);
        let frame: Value = serde_json::from_str(&wire.try_recv().unwrap()).unwrap();
        assert_eq!(frame, json!({"type": "presence_status", "user_id": "u1", "status": "idle"}));

        session.state.mark_closing();
        publish_status(&session, PresenceStatus::Dnd);
        assert!(wire.try_recv().is_err());
    }
}
