//! Dispatch composer.
//!
//! Turns a validated configuration into a mounted application. Every
//! request/response `(path, method)` pair gets one dispatch shim wrapped in
//! the middleware chain; every streaming route gets a shim that drives one
//! `ConnectionSession` per connection attempt.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, warn};
use wrapnode_protocol::{BoxFuture, HandlerError, Method, Request, Response};
use wrapnode_transport::{BoxConnection, HttpEndpoint, MountableApp, StreamEndpoint};

use crate::handler::{Fault, HttpHandlerDyn, StreamHandlerDyn, isolate};
use crate::lifecycle::Lifecycle;
use crate::session::ConnectionSession;
use crate::validate::ValidatedConfig;

pub const HEALTH_PATH: &str = "/health";
pub const FRAMEWORK_NAME: &str = "wrapnode";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Http,
    Stream,
    /// Mounted by the engine itself (the health endpoint).
    System,
}

/// One mounted endpoint, for diagnostics and startup listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredEndpoint {
    pub kind: EndpointKind,
    pub path: String,
    /// `None` for streaming endpoints.
    pub method: Option<Method>,
    pub handler: String,
    pub name: Option<String>,
    pub tags: Vec<String>,
    pub summary: Option<String>,
}

/// The result of composition.
pub struct ComposedApp<T> {
    pub app: T,
    pub endpoints: Vec<RegisteredEndpoint>,
    pub lifecycle: Lifecycle,
}

impl<T> ComposedApp<T> {
    pub fn http_endpoints(&self) -> impl Iterator<Item = &RegisteredEndpoint> {
        self.endpoints.iter().filter(|e| e.kind != EndpointKind::Stream)
    }

    pub fn stream_endpoints(&self) -> impl Iterator<Item = &RegisteredEndpoint> {
        self.endpoints.iter().filter(|e| e.kind == EndpointKind::Stream)
    }
}

/// Mount every route of `config` on `app`.
pub fn compose<A: MountableApp>(config: ValidatedConfig, mut app: A) -> ComposedApp<A::Output> {
    let config = config.into_inner();
    let mut endpoints = Vec::new();

    for route in &config.http_routes {
        let path: Arc<str> = Arc::from(route.path.as_str());
        for method in route.methods() {
            let shim = http_shim(path.clone(), method, route.handler.clone());
            app.mount_http(&route.path, method, config.middleware.wrap(shim));
            endpoints.push(RegisteredEndpoint {
                kind: EndpointKind::Http,
                path: route.path.clone(),
                method: Some(method),
                handler: route.handler_name().to_string(),
                name: None,
                tags: route.tags.clone(),
                summary: route.summary.clone(),
            });
        }
    }

    for route in &config.stream_routes {
        let path: Arc<str> = Arc::from(route.path.as_str());
        app.mount_stream(&route.path, stream_shim(path, route.handler.clone()));
        endpoints.push(RegisteredEndpoint {
            kind: EndpointKind::Stream,
            path: route.path.clone(),
            method: None,
            handler: route.handler_name().to_string(),
            name: route.name.clone(),
            tags: Vec::new(),
            summary: None,
        });
    }

    let health_claimed = endpoints
        .iter()
        .any(|e| e.path == HEALTH_PATH && e.method.is_none_or(|m| m == Method::Get));
    if config.health_endpoint && !health_claimed {
        let shim = health_shim(config.version.clone());
        app.mount_http(HEALTH_PATH, Method::Get, config.middleware.wrap(shim));
        endpoints.push(RegisteredEndpoint {
            kind: EndpointKind::System,
            path: HEALTH_PATH.to_string(),
            method: Some(Method::Get),
            handler: "health".to_string(),
            name: None,
            tags: vec!["system".to_string()],
            summary: Some("Service health check".to_string()),
        });
    }

    if let Some(policy) = &config.cors {
        debug!(?policy, "Applying CORS policy");
        app.apply_cors(policy);
    }

    let lifecycle = Lifecycle::new(&config.http_routes, &config.stream_routes);

    info!(
        "Composed {} ({} HTTP endpoints, {} streaming endpoints, {} middleware)",
        config.title,
        endpoints.iter().filter(|e| e.kind != EndpointKind::Stream).count(),
        config.stream_routes.len(),
        config.middleware.len()
    );

    ComposedApp {
        app: app.finish(),
        endpoints,
        lifecycle,
    }
}

/// Request/response dispatch: call the handler, turn any failure into the
/// error envelope.
fn http_shim(path: Arc<str>, method: Method, handler: Arc<dyn HttpHandlerDyn>) -> HttpEndpoint {
    Arc::new(move |request: Request| -> BoxFuture<'static, Response> {
        let path = path.clone();
        let handler = handler.clone();
        Box::pin(async move {
            match isolate(handler.handle_dyn(request)).await {
                Ok(response) => response,
                Err(Fault::Error(err)) => {
                    let status = err.status_or_default();
                    if status.is_server_error() {
                        error!(route = %path, %method, handler = handler.name_dyn(), "Handler failed: {err}");
                    } else {
                        warn!(route = %path, %method, handler = handler.name_dyn(), "Handler refused request: {err}");
                    }
                    Response::from_error(&err)
                }
                Err(Fault::Panic(msg)) => {
                    error!(route = %path, %method, handler = handler.name_dyn(), "Handler panicked: {msg}");
                    Response::from_error(&HandlerError::internal("Internal server error"))
                }
            }
        })
    })
}

/// Streaming dispatch: one session per connection attempt.
fn stream_shim(path: Arc<str>, handler: Arc<dyn StreamHandlerDyn>) -> StreamEndpoint {
    Arc::new(move |raw: BoxConnection| -> BoxFuture<'static, ()> {
        let session = ConnectionSession::new(path.clone(), handler.clone(), raw);
        Box::pin(async move {
            let outcome = session.run().await;
            debug!(?outcome, "Session finished");
        })
    })
}

fn health_shim(version: String) -> HttpEndpoint {
    Arc::new(move |_request: Request| -> BoxFuture<'static, Response> {
        let body = json!({
            "status": "healthy",
            "framework": FRAMEWORK_NAME,
            "version": version,
        });
        Box::pin(async move { Response::json(&body) })
    })
}
