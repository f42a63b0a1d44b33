//! Standard response envelopes.
//!
//! The engine emits the error envelope for every caught handler failure.
//! Handlers may use either envelope through the helpers below, but they are
//! free to return any payload they like.

use serde::{Deserialize, Serialize};

use crate::error::HandlerError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope {
    Success {
        data: serde_json::Value,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error_code: Option<String>,
    },
}

impl Envelope {
    pub fn success(data: serde_json::Value) -> Self {
        Self::Success { data }
    }

    pub fn error(message: impl Into<String>, error_code: Option<String>) -> Self {
        Self::Error {
            message: message.into(),
            error_code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<&HandlerError> for Envelope {
    fn from(err: &HandlerError) -> Self {
        Self::error(err.message.clone(), err.error_code.clone())
    }
}
