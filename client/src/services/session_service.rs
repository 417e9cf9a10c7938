use std::sync::Arc;

use rustcord_crypto::SymmetricKey;
use rustcord_protocol::{ClientMessage, PresenceStatus, RosterEntry};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channels::{ChatEvent, NetworkStatusEvent, SessionObserver};
use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::services::{message_service, presence_service};
use crate::state::{ConnectionStatus, FeedMessage, Identity, SessionState, SharedState};
use crate::transport::{Connector, TransportEvent};

const LOGGED_OUT: &str = "logged out";

#[derive(Debug)]
enum SessionCommand {
    Send(String),
    SetStatus(PresenceStatus),
    Logout,
}

/// Per-session data owned by the session task.
///
/// Everything that touches the feed, the roster or the socket goes through
/// here, on the one task, so inbound frames are handled strictly in arrival
/// order.
pub(crate) struct Session {
    pub(crate) identity: Identity,
    pub(crate) state: SharedState,
    pub(crate) observer: Arc<dyn SessionObserver>,
    pub(crate) key: Option<SymmetricKey>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    next_seq: u64,
}

impl Session {
    pub(crate) fn new(
        identity: Identity,
        state: SharedState,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            identity,
            state,
            observer,
            key: None,
            outbound: None,
            next_seq: 0,
        }
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        self.state.status()
    }

    /// Open and not already on its way out.
    pub(crate) fn is_open(&self) -> bool {
        self.status() == ConnectionStatus::Open && !self.state.is_closing()
    }

    fn set_status(&self, status: ConnectionStatus, detail: Option<String>) {
        *self.state.status.write() = status;
        tracing::debug!(user = %self.identity.id, ?status, "session status changed");
        self.observer.on_status(NetworkStatusEvent { status, detail });
    }

    /// Build a feed line stamped with the current time and a session-unique id.
    pub(crate) fn feed_message(
        &mut self,
        author: String,
        content: String,
        avatar: Option<String>,
    ) -> FeedMessage {
        let timestamp = crate::state::timestamp_now_ms();
        self.next_seq += 1;
        FeedMessage {
            id: format!("{timestamp}-{}", self.next_seq),
            author,
            content,
            timestamp,
            avatar,
        }
    }

    pub(crate) fn append_feed(&self, event: ChatEvent) {
        self.observer.on_chat(event);
    }

    /// Serialize `message` and queue it on the socket.
    pub(crate) fn transmit(&self, message: &ClientMessage) -> Result<(), SessionError> {
        let outbound = self.outbound.as_ref().ok_or(SessionError::NotOpen)?;
        let frame = message.to_json()?;
        outbound
            .send(frame)
            .map_err(|_| SessionError::Transport("socket writer has stopped".into()))
    }

    /// Handshake finished: go Open, announce ourselves, greet the user.
    fn on_connected(&mut self) {
        if self.status() != ConnectionStatus::Connecting || self.state.is_closing() {
            return;
        }
        self.set_status(ConnectionStatus::Open, None);
        tracing::info!(user = %self.identity.id, "session open");

        if let Err(e) = presence_service::announce_presence(self) {
            tracing::warn!(error = %e, "failed to announce presence");
        }

        let welcome = self.feed_message(
            crate::state::WELCOME_AUTHOR.to_string(),
            crate::state::WELCOME_TEXT.to_string(),
            None,
        );
        self.append_feed(ChatEvent::SystemMessage { message: welcome });
    }

    /// Close the connection, empty the roster and discard the key.
    ///
    /// Safe to call more than once; only the first call has any effect.
    pub(crate) fn teardown(&mut self, reason: &str) {
        if self.status() == ConnectionStatus::Closed {
            return;
        }
        self.state.mark_closing();
        self.outbound = None;
        presence_service::clear_roster(self);
        // zeroized on drop
        self.key = None;
        tracing::info!(user = %self.identity.id, reason, "session closed");
        self.set_status(ConnectionStatus::Closed, Some(reason.to_string()));
    }
}

/// Handle to a running session. Cheap calls that never block on the network.
pub struct SessionHandle {
    state: SharedState,
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Encrypt and send one chat line.
    ///
    /// Silently ignored when `text` is blank or the session is not open.
    pub fn send_message(&self, text: impl Into<String>) {
        let _ = self.commands.send(SessionCommand::Send(text.into()));
    }

    /// Publish a new local presence status. Ignored unless open.
    pub fn set_status(&self, status: PresenceStatus) {
        let _ = self.commands.send(SessionCommand::SetStatus(status));
    }

    /// End the session.
    ///
    /// Takes effect immediately: any frame the task has not yet processed is
    /// dropped, even if the logout command itself is still queued.
    pub fn logout(&self) {
        self.state.mark_closing();
        let _ = self.commands.send(SessionCommand::Logout);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.status()
    }

    /// Current roster, in display order.
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.state.roster.read().entries().to_vec()
    }

    pub fn online_count(&self) -> usize {
        self.state.roster.read().online_count()
    }

    /// Log out and wait for the session task to finish.
    pub async fn shutdown(self) {
        self.logout();
        let Self { task, .. } = self;
        if let Err(e) = task.await {
            tracing::error!(error = %e, "session task panicked");
        }
    }
}

/// Start a session for `identity`.
///
/// Key derivation runs on the blocking pool; the connection is opened once
/// the key is ready. Progress is reported through `observer`.
pub fn spawn_session<C: Connector>(
    config: &ClientConfig,
    identity: Identity,
    connector: C,
    observer: Arc<dyn SessionObserver>,
) -> SessionHandle {
    let state: SharedState = Arc::new(SessionState::default());
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let session = Session::new(identity, Arc::clone(&state), observer);
    let params = SessionParams {
        endpoint: config.endpoint.clone(),
        passphrase: config.passphrase.clone(),
        deriver: config.key_deriver(),
    };
    let task = tokio::spawn(run_session(session, params, connector, commands_rx));

    SessionHandle {
        state,
        commands: commands_tx,
        task,
    }
}

struct SessionParams {
    endpoint: String,
    passphrase: String,
    deriver: Result<rustcord_crypto::KeyDeriver, rustcord_crypto::CryptoError>,
}

async fn run_session<C: Connector>(
    mut session: Session,
    params: SessionParams,
    connector: C,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
) {
    session.set_status(ConnectionStatus::AwaitingKey, None);

    let key = tokio::select! {
        biased;
        () = wait_for_logout(&mut commands) => {
            session.teardown(LOGGED_OUT);
            return;
        }
        derived = derive_key(params.deriver, params.passphrase) => match derived {
            Ok(key) => key,
            Err(e) => {
                tracing::error!(error = %e, "key derivation failed");
                session.teardown(&e.to_string());
                return;
            }
        },
    };
    if session.state.is_closing() {
        session.teardown(LOGGED_OUT);
        return;
    }
    session.key = Some(key);

    session.set_status(ConnectionStatus::Connecting, None);
    tracing::info!(endpoint = %params.endpoint, user = %session.identity.id, "connecting");
    let link = match connector.connect(&params.endpoint) {
        Ok(link) => link,
        Err(e) => {
            tracing::error!(error = %e, "connect failed");
            session.teardown(&e.to_string());
            return;
        }
    };
    session.outbound = Some(link.outbound);
    let mut inbound = link.inbound;

    loop {
        tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(SessionCommand::Send(text)) => message_service::send_chat_message(&mut session, &text),
                Some(SessionCommand::SetStatus(status)) => presence_service::publish_status(&session, status),
                Some(SessionCommand::Logout) | None => {
                    session.teardown(LOGGED_OUT);
                    break;
                }
            },
            event = inbound.recv() => match event {
                Some(TransportEvent::Connected) => session.on_connected(),
                Some(TransportEvent::Frame(raw)) => message_service::handle_incoming_frame(&mut session, &raw),
                Some(TransportEvent::Closed(reason)) => {
                    let reason = reason.unwrap_or_else(|| "connection closed".to_string());
                    session.teardown(&reason);
                    break;
                }
                Some(TransportEvent::Error(e)) => {
                    tracing::error!(error = %e, "transport error");
                    session.teardown(&SessionError::Transport(e).to_string());
                    break;
                }
                None => {
                    session.teardown("transport stopped");
                    break;
                }
            },
        }
    }
}

async fn derive_key(
    deriver: Result<rustcord_crypto::KeyDeriver, rustcord_crypto::CryptoError>,
    passphrase: String,
) -> Result<SymmetricKey, SessionError> {
    let deriver = deriver.map_err(SessionError::from)?;
    tokio::task::spawn_blocking(move || deriver.derive(&passphrase))
        .await
        .map_err(|e| SessionError::KeyDerivation(format!("derivation task failed: {e}")))?
        .map_err(SessionError::from)
}

/// Resolve once a logout arrives or every handle is gone. Other commands
/// are dropped: nothing can be sent before the session is open.
async fn wait_for_logout(commands: &mut mpsc::UnboundedReceiver<SessionCommand>) {
    loop {
        match commands.recv().await {
            Some(SessionCommand::Logout) | None => return,
            Some(_) => tracing::debug!("ignoring command before session is open"),
        }
    }
}
