//! Middleware chain for request/response dispatch.
//!
//! Middleware wraps every HTTP dispatch in configuration order: the first one
//! added sees the request first and the response last. Each middleware gets
//! the request plus a [`Next`] it may call zero or one time; not calling it
//! short-circuits the route. A panicking middleware answers with the generic
//! 500 envelope; the middleware outside it still sees that response.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};
use wrapnode_protocol::{BoxFuture, HandlerError, Request, Response};
use wrapnode_transport::HttpEndpoint;

use crate::handler::{isolate, short_type_name};

/// Trait for request middleware.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, request: Request, next: Next) -> impl Future<Output = Response> + Send;

    /// Middleware name for debugging.
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }
}

/// Object-safe version of `Middleware`.
trait MiddlewareDyn: Send + Sync {
    fn handle_dyn(&self, request: Request, next: Next) -> BoxFuture<'_, Response>;
    fn name_dyn(&self) -> &str;
}

impl<T: Middleware> MiddlewareDyn for T {
    fn handle_dyn(&self, request: Request, next: Next) -> BoxFuture<'_, Response> {
        Box::pin(self.handle(request, next))
    }

    fn name_dyn(&self) -> &str {
        self.name()
    }
}

/// The rest of the chain, ending in the route's dispatch.
#[derive(Clone)]
pub struct Next {
    chain: Arc<[Arc<dyn MiddlewareDyn>]>,
    index: usize,
    endpoint: HttpEndpoint,
}

impl Next {
    pub fn run(self, request: Request) -> BoxFuture<'static, Response> {
        match self.chain.get(self.index).cloned() {
            Some(middleware) => {
                let next = Next {
                    index: self.index + 1,
                    ..self
                };
                Box::pin(async move {
                    let call = async { Ok::<_, HandlerError>(middleware.handle_dyn(request, next).await) };
                    match isolate(call).await {
                        Ok(response) => response,
                        Err(fault) => {
                            error!(middleware = middleware.name_dyn(), "Middleware failed: {fault}");
                            Response::from_error(&HandlerError::internal("Internal server error"))
                        }
                    }
                })
            }
            None => (self.endpoint)(request),
        }
    }
}

/// An ordered list of middleware.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn MiddlewareDyn>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<M: Middleware>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.middlewares.iter().map(|m| m.name_dyn()).collect()
    }

    /// Wrap `endpoint` so every call runs through the chain first.
    pub(crate) fn wrap(&self, endpoint: HttpEndpoint) -> HttpEndpoint {
        if self.middlewares.is_empty() {
            return endpoint;
        }
        let chain: Arc<[Arc<dyn MiddlewareDyn>]> = self.middlewares.iter().cloned().collect();
        Arc::new(move |request: Request| -> BoxFuture<'static, Response> {
            Next {
                chain: chain.clone(),
                index: 0,
                endpoint: endpoint.clone(),
            }
            .run(request)
        })
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Built-in middleware
// ─────────────────────────────────────────────────────────────────────────────

/// Middleware built from a closure.
pub struct FnMiddleware<F> {
    name: String,
    f: F,
}

/// Wrap `f` as middleware.
pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FnMiddleware {
        name: name.into(),
        f,
    }
}

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle(&self, request: Request, next: Next) -> impl Future<Output = Response> + Send {
        (self.f)(request, next)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Logs one line per request with method, path, status and latency.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLog;

impl Middleware for RequestLog {
    async fn handle(&self, request: Request, next: Next) -> Response {
        let method = request.method();
        let path = request.path().to_string();
        let started = Instant::now();
        let response = next.run(request).await;
        info!(
            %method,
            %path,
            status = response.status().as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Request handled"
        );
        response
    }
}
