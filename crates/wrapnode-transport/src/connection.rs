//! axum-backed streaming connection.
//!
//! The connection is created while the HTTP upgrade request is still open.
//! `accept` completes the upgrade, `reject` answers the upgrade request with
//! 403 instead. The upgrade response travels back to the axum handler over a
//! oneshot channel, so the accept decision can be made on another task.

use axum::{
    Json,
    extract::ws::{CloseFrame, Message as WsMessage, Utf8Bytes, WebSocket, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use wrapnode_protocol::{
    CloseCode, ConnectInfo, Envelope, Inbound, Message, TransportError,
};

use crate::mount::RawConnection;

enum State {
    Pending {
        upgrade: WebSocketUpgrade,
        respond: oneshot::Sender<Response>,
    },
    Open(WebSocket),
    Rejected,
    Closed,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            Self::Pending { .. } => "pending",
            Self::Open(_) => "open",
            Self::Rejected => "rejected",
            Self::Closed => "closed",
        }
    }
}

enum Event {
    Message(Message),
    PeerClosed(CloseCode),
    Failed(String),
}

pub struct AxumConnection {
    info: ConnectInfo,
    state: State,
}

impl AxumConnection {
    /// Wrap a pending upgrade. The returned receiver yields the HTTP response
    /// for the upgrade request once `accept` or `reject` has been called.
    pub fn pending(upgrade: WebSocketUpgrade, info: ConnectInfo) -> (Self, oneshot::Receiver<Response>) {
        let (respond, response_rx) = oneshot::channel();
        let conn = Self {
            info,
            state: State::Pending { upgrade, respond },
        };
        (conn, response_rx)
    }

    fn not_open(&self) -> TransportError {
        match self.state {
            State::Closed => TransportError::Closed,
            ref other => TransportError::InvalidState(other.name()),
        }
    }
}

impl RawConnection for AxumConnection {
    fn info(&self) -> &ConnectInfo {
        &self.info
    }

    async fn accept(&mut self) -> Result<(), TransportError> {
        let (upgrade, respond) = match std::mem::replace(&mut self.state, State::Closed) {
            State::Pending { upgrade, respond } => (upgrade, respond),
            other => {
                let name = other.name();
                self.state = other;
                return Err(TransportError::InvalidState(name));
            }
        };

        let (socket_tx, socket_rx) = oneshot::channel();
        let response = upgrade
            .on_failed_upgrade(|e: axum::Error| warn!("WebSocket upgrade failed: {e}"))
            .on_upgrade(move |socket| async move {
                let _ = socket_tx.send(socket);
            });

        if respond.send(response).is_err() {
            return Err(TransportError::PeerGone);
        }

        let socket = socket_rx
            .await
            .map_err(|_| TransportError::UpgradeFailed("upgrade did not complete".into()))?;
        self.state = State::Open(socket);
        Ok(())
    }

    async fn reject(&mut self, code: CloseCode) -> Result<(), TransportError> {
        match std::mem::replace(&mut self.state, State::Rejected) {
            State::Pending { respond, .. } => {
                debug!("Rejecting upgrade for {} (code {code})", self.info.uri.path());
                let body = Envelope::error("Connection rejected", Some("connection_rejected".into()));
                respond
                    .send((StatusCode::FORBIDDEN, Json(body)).into_response())
                    .map_err(|_| TransportError::PeerGone)
            }
            other => {
                let name = other.name();
                self.state = other;
                Err(TransportError::InvalidState(name))
            }
        }
    }

    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        let State::Open(socket) = &mut self.state else {
            return Err(self.not_open());
        };
        let frame = match message {
            Message::Text(text) => WsMessage::Text(text.into()),
            Message::Binary(data) => WsMessage::Binary(data),
        };
        socket
            .send(frame)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn receive(&mut self) -> Result<Inbound, TransportError> {
        let event = match &mut self.state {
            State::Open(socket) => next_event(socket).await,
            _ => return Err(self.not_open()),
        };

        match event {
            Event::Message(message) => Ok(Inbound::Message(message)),
            Event::PeerClosed(code) => {
                self.state = State::Closed;
                Ok(Inbound::Closed(code))
            }
            Event::Failed(reason) => {
                self.state = State::Closed;
                Err(TransportError::Io(reason))
            }
        }
    }

    async fn close(&mut self, code: CloseCode) -> Result<(), TransportError> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Open(mut socket) => {
                let frame = CloseFrame {
                    code: code.code(),
                    reason: Utf8Bytes::from_static(""),
                };
                socket
                    .send(WsMessage::Close(Some(frame)))
                    .await
                    .map_err(|e| TransportError::Io(e.to_string()))
            }
            State::Closed => Ok(()),
            other => {
                let name = other.name();
                self.state = other;
                Err(TransportError::InvalidState(name))
            }
        }
    }
}

/// Read until an application message or the end of the connection. Pings are
/// answered by the WebSocket layer itself.
async fn next_event(socket: &mut WebSocket) -> Event {
    loop {
        match socket.recv().await {
            Some(Ok(WsMessage::Text(text))) => return Event::Message(Message::Text(text.as_str().to_owned())),
            Some(Ok(WsMessage::Binary(data))) => return Event::Message(Message::Binary(data)),
            Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => continue,
            Some(Ok(WsMessage::Close(frame))) => {
                let code = frame
                    .map(|f| CloseCode(f.code))
                    .unwrap_or(CloseCode::NO_STATUS);
                return Event::PeerClosed(code);
            }
            Some(Err(e)) => return Event::Failed(e.to_string()),
            None => return Event::PeerClosed(CloseCode::ABNORMAL),
        }
    }
}
