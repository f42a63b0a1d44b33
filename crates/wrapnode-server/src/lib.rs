//! wrapnode server: route registration and handler lifecycle engine.
//!
//! A service is declared as a [`ServiceConfig`]: ordered request/response
//! routes and streaming routes, each bound to a handler, plus listener, CORS
//! and middleware options. Validation yields a [`ValidatedConfig`], which
//! [`compose`] mounts on any [`MountableApp`](wrapnode_transport::MountableApp).
//! [`AgentService`] does both against the axum transport and runs the
//! startup/shutdown hooks around the listener.

pub mod compose;
pub mod config;
pub mod connection;
pub mod handler;
pub mod lifecycle;
pub mod middleware;
pub mod route;
pub mod service;
pub mod session;
pub mod validate;

pub use compose::{ComposedApp, EndpointKind, RegisteredEndpoint, compose};
pub use config::{LogLevel, ServerOptions, ServiceConfig};
pub use connection::Connection;
pub use handler::{Hooks, HttpHandler, StreamHandler};
pub use lifecycle::{HookFailure, HookPhase, Lifecycle, LifecycleReport};
pub use middleware::{Middleware, MiddlewareChain, Next, RequestLog};
pub use route::{HttpRoute, StreamRoute};
pub use service::{AgentService, RunningService, ServiceError};
pub use session::ConnectionState;
pub use validate::{ConfigError, ValidatedConfig, ValidationErrors};

// Handlers work with these directly.
pub use wrapnode_protocol::{
    CloseCode, CorsPolicy, Envelope, HandlerError, Inbound, Message, Method, Request, Response,
};
