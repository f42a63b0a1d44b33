//! Streaming (WebSocket-style) message types and close codes.

use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, Uri};

/// One frame of application data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Bytes),
}

impl Message {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Bytes> for Message {
    fn from(data: Bytes) -> Self {
        Self::Binary(data)
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(data))
    }
}

/// WebSocket close status code (RFC 6455 §7.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    pub const NORMAL: CloseCode = CloseCode(1000);
    pub const GOING_AWAY: CloseCode = CloseCode(1001);
    /// Peer sent a close frame without a status.
    pub const NO_STATUS: CloseCode = CloseCode(1005);
    /// Sentinel for "the real code is unknown"; never sent on the wire.
    pub const ABNORMAL: CloseCode = CloseCode(1006);
    pub const POLICY_VIOLATION: CloseCode = CloseCode(1008);
    pub const INTERNAL_ERROR: CloseCode = CloseCode(1011);

    pub fn code(&self) -> u16 {
        self.0
    }

    pub fn is_normal(&self) -> bool {
        matches!(self.0, 1000 | 1001)
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a suspending receive: either the next message, or the fact that
/// the connection is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message(Message),
    Closed(CloseCode),
}

/// What is known about a streaming connection before it is accepted.
#[derive(Debug, Clone, Default)]
pub struct ConnectInfo {
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl ConnectInfo {
    pub fn new(uri: Uri, headers: HeaderMap) -> Self {
        Self { uri, headers }
    }
}
