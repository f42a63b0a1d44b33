//! wrapnode protocol types
//!
//! Shared vocabulary between the dispatch engine and its transport: the HTTP
//! verb set, opaque request/response payloads, streaming messages and close
//! codes, the CORS policy, the standard envelopes and the error taxonomy.

pub mod cors;
pub mod envelope;
pub mod error;
pub mod payload;
pub mod stream;

pub use cors::CorsPolicy;
pub use envelope::Envelope;
pub use error::{ErrorCodes, HandlerError, TransportError};
pub use payload::{Method, Request, Response, UnknownMethod};
pub use stream::{CloseCode, ConnectInfo, Inbound, Message};

/// Boxed future used at every dynamic dispatch seam.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
