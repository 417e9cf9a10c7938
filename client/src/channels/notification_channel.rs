use serde::Serialize;

use crate::state::ConnectionStatus;

/// Pushed whenever the session moves to a new lifecycle state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatusEvent {
    pub status: ConnectionStatus,
    /// Why the session closed, when it did.
    pub detail: Option<String>,
}
