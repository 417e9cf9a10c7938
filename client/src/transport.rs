use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::SessionError;

/// What the socket reports back to the session task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake finished; frames may now flow both ways.
    Connected,
    /// One inbound text frame.
    Frame(String),
    /// Peer closed the connection, with its reason if it gave one.
    Closed(Option<String>),
    Error(String),
}

/// Both directions of one connection.
///
/// Dropping `outbound` asks the socket to close. Dropping `inbound` makes
/// the socket stop delivering.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens connections for a session.
///
/// `connect` must return without waiting for the handshake; completion is
/// reported as [`TransportEvent::Connected`] on the returned link. It is
/// called from within a tokio runtime.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, endpoint: &str) -> Result<TransportLink, SessionError>;
}

/// WebSocket connector over tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, endpoint: &str) -> Result<TransportLink, SessionError> {
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(SessionError::Transport(format!(
                "unsupported endpoint {endpoint:?}"
            )));
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(drive_socket(endpoint.to_string(), outbound_rx, inbound_tx));

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

async fn drive_socket(
    endpoint: String,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    inbound_tx: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut ws = match connect_async(endpoint.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            tracing::warn!(endpoint = %endpoint, error = %e, "websocket handshake failed");
            let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
            return;
        }
    };
    tracing::info!(endpoint = %endpoint, "websocket connected");
    if outbound_rx.is_closed() || inbound_tx.send(TransportEvent::Connected).is_err() {
        // Session ended during the handshake.
        tracing::debug!(endpoint = %endpoint, "closing socket opened after logout");
        let _ = ws.send(Message::Close(None)).await;
        return;
    }

    let (mut write, mut read) = ws.split();
    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                let Some(text) = outgoing else {
                    // Session dropped its sender: close politely.
                    let _ = write.send(Message::Close(None)).await;
                    break;
                };
                if let Err(e) = write.send(Message::Text(text)).await {
                    tracing::warn!(error = %e, "websocket write failed");
                    let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
                    break;
                }
            }
            incoming = read.next() => {
                let event = match incoming {
                    Some(Ok(Message::Text(text))) => TransportEvent::Frame(text),
                    Some(Ok(Message::Binary(data))) => {
                        tracing::debug!(len = data.len(), "ignoring binary frame");
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.into_owned())
                            .filter(|r| !r.is_empty());
                        let _ = inbound_tx.send(TransportEvent::Closed(reason));
                        break;
                    }
                    // ping/pong are answered by tungstenite itself
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                    None => {
                        let _ = inbound_tx.send(TransportEvent::Closed(None));
                        break;
                    }
                };
                if inbound_tx.send(event).is_err() {
                    break;
                }
            }
        }
    }
    tracing::debug!(endpoint = %endpoint, "websocket task finished");
}
