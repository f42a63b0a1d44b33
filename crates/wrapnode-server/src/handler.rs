//! Handler capability contracts.
//!
//! A request/response handler implements [`HttpHandler`], a streaming handler
//! implements [`StreamHandler`]. Both have one required operation and a set of
//! optional hooks with no-op defaults. The engine only calls the hooks a
//! handler lists in its `HOOKS` constant, so an undeclared `on_connect` means
//! "accept every connection" and an undeclared `on_disconnect` is never
//! scheduled.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use wrapnode_protocol::{BoxFuture, CloseCode, HandlerError, Request, Response};

use crate::connection::Connection;

/// Optional hooks a handler implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hooks {
    pub startup: bool,
    pub shutdown: bool,
    pub connect: bool,
    pub disconnect: bool,
}

impl Hooks {
    pub const NONE: Hooks = Hooks {
        startup: false,
        shutdown: false,
        connect: false,
        disconnect: false,
    };

    pub const fn with_startup(self) -> Self {
        Hooks { startup: true, ..self }
    }

    pub const fn with_shutdown(self) -> Self {
        Hooks { shutdown: true, ..self }
    }

    pub const fn with_connect(self) -> Self {
        Hooks { connect: true, ..self }
    }

    pub const fn with_disconnect(self) -> Self {
        Hooks { disconnect: true, ..self }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request/response
// ─────────────────────────────────────────────────────────────────────────────

/// A request/response handler.
///
/// `handle` may run concurrently for different requests; handlers bring their
/// own synchronization for shared state.
pub trait HttpHandler: Send + Sync + 'static {
    const HOOKS: Hooks = Hooks::NONE;

    fn handle(&self, request: Request) -> impl Future<Output = Result<Response, HandlerError>> + Send;

    fn on_startup(&self) -> impl Future<Output = Result<(), HandlerError>> + Send {
        async { Ok(()) }
    }

    fn on_shutdown(&self) -> impl Future<Output = Result<(), HandlerError>> + Send {
        async { Ok(()) }
    }

    /// Name used in logs and hook reports.
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming
// ─────────────────────────────────────────────────────────────────────────────

/// A duplex streaming handler. One `handle` call owns the message loop of
/// one accepted connection.
pub trait StreamHandler: Send + Sync + 'static {
    const HOOKS: Hooks = Hooks::NONE;

    fn handle(&self, conn: &mut Connection) -> impl Future<Output = Result<(), HandlerError>> + Send;

    /// Decide whether to accept a pending connection. Only called when
    /// `HOOKS.connect` is set.
    fn on_connect(&self, _conn: &Connection) -> impl Future<Output = Result<bool, HandlerError>> + Send {
        async { Ok(true) }
    }

    /// Called once after an accepted connection ends, however it ended.
    fn on_disconnect(
        &self,
        _conn: &Connection,
        _code: CloseCode,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send {
        async { Ok(()) }
    }

    fn on_startup(&self) -> impl Future<Output = Result<(), HandlerError>> + Send {
        async { Ok(()) }
    }

    fn on_shutdown(&self) -> impl Future<Output = Result<(), HandlerError>> + Send {
        async { Ok(()) }
    }

    fn name(&self) -> &str {
        short_type_name::<Self>()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Object-safe wrappers
// ─────────────────────────────────────────────────────────────────────────────

/// Object-safe version of `HttpHandler`.
pub(crate) trait HttpHandlerDyn: Send + Sync {
    fn hooks_dyn(&self) -> Hooks;
    fn name_dyn(&self) -> &str;
    fn handle_dyn(&self, request: Request) -> BoxFuture<'_, Result<Response, HandlerError>>;
    fn on_startup_dyn(&self) -> BoxFuture<'_, Result<(), HandlerError>>;
    fn on_shutdown_dyn(&self) -> BoxFuture<'_, Result<(), HandlerError>>;
}

impl<T: HttpHandler> HttpHandlerDyn for T {
    fn hooks_dyn(&self) -> Hooks {
        T::HOOKS
    }

    fn name_dyn(&self) -> &str {
        self.name()
    }

    fn handle_dyn(&self, request: Request) -> BoxFuture<'_, Result<Response, HandlerError>> {
        Box::pin(self.handle(request))
    }

    fn on_startup_dyn(&self) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(self.on_startup())
    }

    fn on_shutdown_dyn(&self) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(self.on_shutdown())
    }
}

/// Object-safe version of `StreamHandler`; all refs share lifetime `'a`.
pub(crate) trait StreamHandlerDyn: Send + Sync {
    fn hooks_dyn(&self) -> Hooks;
    fn name_dyn(&self) -> &str;
    fn handle_dyn<'a>(&'a self, conn: &'a mut Connection) -> BoxFuture<'a, Result<(), HandlerError>>;
    fn on_connect_dyn<'a>(&'a self, conn: &'a Connection) -> BoxFuture<'a, Result<bool, HandlerError>>;
    fn on_disconnect_dyn<'a>(
        &'a self,
        conn: &'a Connection,
        code: CloseCode,
    ) -> BoxFuture<'a, Result<(), HandlerError>>;
    fn on_startup_dyn(&self) -> BoxFuture<'_, Result<(), HandlerError>>;
    fn on_shutdown_dyn(&self) -> BoxFuture<'_, Result<(), HandlerError>>;
}

impl<T: StreamHandler> StreamHandlerDyn for T {
    fn hooks_dyn(&self) -> Hooks {
        T::HOOKS
    }

    fn name_dyn(&self) -> &str {
        self.name()
    }

    fn handle_dyn<'a>(&'a self, conn: &'a mut Connection) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(self.handle(conn))
    }

    fn on_connect_dyn<'a>(&'a self, conn: &'a Connection) -> BoxFuture<'a, Result<bool, HandlerError>> {
        Box::pin(self.on_connect(conn))
    }

    fn on_disconnect_dyn<'a>(
        &'a self,
        conn: &'a Connection,
        code: CloseCode,
    ) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(self.on_disconnect(conn, code))
    }

    fn on_startup_dyn(&self) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(self.on_startup())
    }

    fn on_shutdown_dyn(&self) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(self.on_shutdown())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure isolation
// ─────────────────────────────────────────────────────────────────────────────

/// How a handler invocation went wrong.
#[derive(Debug, Clone)]
pub(crate) enum Fault {
    Error(HandlerError),
    Panic(String),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(err) => write!(f, "{err}"),
            Self::Panic(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

/// Run a handler future, turning both `Err` and panics into a `Fault`.
pub(crate) async fn isolate<T>(fut: impl Future<Output = Result<T, HandlerError>>) -> Result<T, Fault> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(Fault::Error(err)),
        Err(payload) => Err(Fault::Panic(panic_message(payload.as_ref()).to_string())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// `my_crate::agents::EchoHandler` -> `EchoHandler`.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}
