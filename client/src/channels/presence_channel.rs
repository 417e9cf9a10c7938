use rustcord_protocol::RosterEntry;
use serde::Serialize;

/// Roster-change events. Each carries the online total after the change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
pub enum PresenceEvent {
    /// A snapshot replaced the whole roster.
    RosterReplaced {
        entries: Vec<RosterEntry>,
        online_count: usize,
    },
    UserUpdated {
        entry: RosterEntry,
        online_count: usize,
    },
    /// Session teardown emptied the roster.
    RosterCleared,
}
