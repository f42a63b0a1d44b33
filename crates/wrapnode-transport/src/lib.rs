//! wrapnode transport layer
//!
//! The external collaborator of the dispatch engine. It provides:
//! - the mountable-application capability (`MountableApp`) the engine
//!   registers routes on, and the `RawConnection` handle streaming routes drive
//! - an axum implementation of both (HTTP routes, WebSocket upgrades, CORS)
//! - `TransportServer`, which binds a listener and serves the result
//! - an in-memory transport (`testing`, behind the `testing` feature) for
//!   driving the engine without sockets
//!
//! Socket I/O, HTTP parsing and WebSocket framing all stay on this side.

pub mod connection;
pub mod mount;
pub mod server;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use connection::AxumConnection;
pub use mount::{
    BoxConnection, HttpEndpoint, MountableApp, RawConnection, RawConnectionDyn, StreamEndpoint,
};
pub use server::{AxumApp, TransportServer, cors_layer};
