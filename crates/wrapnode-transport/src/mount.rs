//! The mountable-application capability.
//!
//! The dispatch engine never touches sockets. It registers async callables
//! through `MountableApp`, and streaming callables receive a boxed
//! `RawConnection` they drive through accept/reject/send/receive/close.

use std::sync::Arc;

use wrapnode_protocol::{
    BoxFuture, CloseCode, ConnectInfo, CorsPolicy, Inbound, Message, Method, Request, Response,
    TransportError,
};

/// A request/response endpoint. Must never fail: failures are turned into
/// responses before they reach the transport.
pub type HttpEndpoint = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// A streaming endpoint; called once per inbound connection attempt.
pub type StreamEndpoint = Arc<dyn Fn(BoxConnection) -> BoxFuture<'static, ()> + Send + Sync>;

pub type BoxConnection = Box<dyn RawConnectionDyn>;

/// Something routes can be registered on, producing a servable application.
pub trait MountableApp {
    type Output;

    /// Register `endpoint` for one `(path, method)` pair.
    fn mount_http(&mut self, path: &str, method: Method, endpoint: HttpEndpoint);

    /// Register a streaming endpoint at `path`.
    fn mount_stream(&mut self, path: &str, endpoint: StreamEndpoint);

    /// Install the cross-origin boundary check in front of all routes.
    fn apply_cors(&mut self, policy: &CorsPolicy);

    fn finish(self) -> Self::Output;
}

/// Transport-level connection handle for one streaming connection.
///
/// Lifecycle on the transport side: a connection starts pending; exactly one
/// of `accept` or `reject` may be called; `send`, `receive` and `close` are
/// only valid after a successful `accept`.
pub trait RawConnection: Send + 'static {
    fn info(&self) -> &ConnectInfo;

    fn accept(&mut self) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    fn reject(&mut self, code: CloseCode) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    fn send(&mut self, message: Message) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Suspends until the next message or until the connection is gone.
    fn receive(&mut self) -> impl std::future::Future<Output = Result<Inbound, TransportError>> + Send;

    fn close(&mut self, code: CloseCode) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;
}

/// Object-safe version of `RawConnection`.
pub trait RawConnectionDyn: Send {
    fn info_dyn(&self) -> &ConnectInfo;
    fn accept_dyn(&mut self) -> BoxFuture<'_, Result<(), TransportError>>;
    fn reject_dyn(&mut self, code: CloseCode) -> BoxFuture<'_, Result<(), TransportError>>;
    fn send_dyn(&mut self, message: Message) -> BoxFuture<'_, Result<(), TransportError>>;
    fn receive_dyn(&mut self) -> BoxFuture<'_, Result<Inbound, TransportError>>;
    fn close_dyn(&mut self, code: CloseCode) -> BoxFuture<'_, Result<(), TransportError>>;
}

impl<T: RawConnection> RawConnectionDyn for T {
    fn info_dyn(&self) -> &ConnectInfo {
        self.info()
    }

    fn accept_dyn(&mut self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(self.accept())
    }

    fn reject_dyn(&mut self, code: CloseCode) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(self.reject(code))
    }

    fn send_dyn(&mut self, message: Message) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(self.send(message))
    }

    fn receive_dyn(&mut self) -> BoxFuture<'_, Result<Inbound, TransportError>> {
        Box::pin(self.receive())
    }

    fn close_dyn(&mut self, code: CloseCode) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(self.close(code))
    }
}
