//! Handler-facing view of one streaming connection.

use std::sync::Arc;

use http::HeaderMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;
use wrapnode_protocol::{CloseCode, HandlerError, Inbound, Message, TransportError};
use wrapnode_transport::BoxConnection;

/// Who ended the connection, and with which code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Closure {
    /// The peer closed, vanished, or the transport failed underneath us.
    Peer(CloseCode),
    /// The handler or the engine closed it.
    Local(CloseCode),
}

impl Closure {
    pub(crate) fn code(&self) -> CloseCode {
        match *self {
            Self::Peer(code) | Self::Local(code) => code,
        }
    }
}

/// A streaming connection as seen by a `StreamHandler`.
///
/// Accepting and rejecting are reserved to the engine; by the time `handle`
/// runs the connection is open. Transport failures surface as
/// `Inbound::Closed(CloseCode::ABNORMAL)`.
pub struct Connection {
    id: String,
    route: Arc<str>,
    // Only ever accessed through `get_mut`; the mutex makes `&Connection`
    // shareable across await points in hook futures.
    raw: Mutex<BoxConnection>,
    headers: HeaderMap,
    uri: http::Uri,
    closure: Option<Closure>,
}

impl Connection {
    pub(crate) fn new(route: Arc<str>, raw: BoxConnection) -> Self {
        let info = raw.info_dyn().clone();
        Self {
            id: Uuid::new_v4().to_string(),
            route,
            raw: Mutex::new(raw),
            headers: info.headers,
            uri: info.uri,
            closure: None,
        }
    }

    /// Unique id of this connection.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The path the streaming route was registered at.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// The requested path.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_closed(&self) -> bool {
        self.closure.is_some()
    }

    pub(crate) fn closure(&self) -> Option<Closure> {
        self.closure
    }

    pub async fn send(&mut self, message: impl Into<Message>) -> Result<(), TransportError> {
        let message = message.into();
        if self.closure.is_some() {
            return Err(TransportError::Closed);
        }
        let result = self.raw.get_mut().send_dyn(message).await;
        if let Err(e) = &result {
            debug!(connection = %self.id, "Send failed: {e}");
            self.closure = Some(Closure::Peer(CloseCode::ABNORMAL));
        }
        result
    }

    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<(), TransportError> {
        self.send(Message::Text(text.into())).await
    }

    /// Serialize `value` and send it as a text frame.
    pub async fn send_json<T: Serialize + Sync + ?Sized>(&mut self, value: &T) -> Result<(), HandlerError> {
        let text = serde_json::to_string(value).map_err(|e| HandlerError::internal(e.to_string()))?;
        self.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Suspend until the next message, or until the connection is gone.
    pub async fn receive(&mut self) -> Inbound {
        if let Some(closure) = self.closure {
            return Inbound::Closed(closure.code());
        }
        match self.raw.get_mut().receive_dyn().await {
            Ok(Inbound::Message(message)) => Inbound::Message(message),
            Ok(Inbound::Closed(code)) => {
                debug!(connection = %self.id, "Peer closed ({code})");
                self.closure = Some(Closure::Peer(code));
                Inbound::Closed(code)
            }
            Err(e) => {
                debug!(connection = %self.id, "Receive failed: {e}");
                self.closure = Some(Closure::Peer(CloseCode::ABNORMAL));
                Inbound::Closed(CloseCode::ABNORMAL)
            }
        }
    }

    /// Next text message; binary frames are skipped. `None` once closed.
    pub async fn receive_text(&mut self) -> Option<String> {
        loop {
            match self.receive().await {
                Inbound::Message(Message::Text(text)) => return Some(text),
                Inbound::Message(Message::Binary(_)) => continue,
                Inbound::Closed(_) => return None,
            }
        }
    }

    /// Close the connection towards the peer. Closing twice is a no-op.
    pub async fn close(&mut self, code: CloseCode) -> Result<(), TransportError> {
        if self.closure.is_some() {
            return Ok(());
        }
        self.closure = Some(Closure::Local(code));
        self.raw.get_mut().close_dyn(code).await
    }

    pub(crate) async fn accept(&mut self) -> Result<(), TransportError> {
        self.raw.get_mut().accept_dyn().await
    }

    pub(crate) async fn reject(&mut self, code: CloseCode) -> Result<(), TransportError> {
        self.raw.get_mut().reject_dyn(code).await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("route", &self.route)
            .field("uri", &self.uri)
            .field("closure", &self.closure)
            .finish()
    }
}
