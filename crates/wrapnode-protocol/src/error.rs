//! Handler and transport error types.

use http::StatusCode;
use thiserror::Error;

/// Well-known `error_code` values used by the engine's own failure path.
pub struct ErrorCodes;

impl ErrorCodes {
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const INVALID_BODY: &str = "invalid_body";
    pub const TRANSPORT_ERROR: &str = "transport_error";
}

/// A failure raised from inside a handler (`handle`, `on_connect`,
/// `on_disconnect`) or one of its lifecycle hooks.
///
/// The optional `status` is a hint for the request/response path: when it is
/// absent the dispatch shim answers with 500.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
    pub status: Option<StatusCode>,
    pub error_code: Option<String>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            error_code: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message).with_status(StatusCode::BAD_REQUEST)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message).with_status(StatusCode::NOT_FOUND)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message)
            .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            .with_code(ErrorCodes::INTERNAL_ERROR)
    }

    /// Status the shim should answer with.
    pub fn status_or_default(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<TransportError> for HandlerError {
    fn from(err: TransportError) -> Self {
        Self::new(err.to_string())
            .with_status(StatusCode::BAD_GATEWAY)
            .with_code(ErrorCodes::TRANSPORT_ERROR)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("Invalid JSON body: {err}")).with_code(ErrorCodes::INVALID_BODY)
    }
}

/// Faults originating below the engine boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection is closed")]
    Closed,
    #[error("connection is not open (state: {0})")]
    InvalidState(&'static str),
    #[error("upgrade failed: {0}")]
    UpgradeFailed(String),
    #[error("peer went away before the connection was accepted")]
    PeerGone,
    #[error("transport I/O error: {0}")]
    Io(String),
}
