//! axum implementation of the mountable application, plus the server that
//! binds a listener and serves it.

use std::net::SocketAddr;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::WebSocketUpgrade,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    response::IntoResponse,
    routing::{MethodFilter, get, on},
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tracing::{debug, error, info, warn};
use wrapnode_protocol::{
    ConnectInfo, CorsPolicy, Envelope, ErrorCodes, Method, Request, Response,
};

use crate::connection::AxumConnection;
use crate::mount::{HttpEndpoint, MountableApp, StreamEndpoint};

// ─────────────────────────────────────────────────────────────────────────────
// Mountable application
// ─────────────────────────────────────────────────────────────────────────────

/// Builds an `axum::Router` from mounted endpoints.
#[derive(Default)]
pub struct AxumApp {
    router: Router,
    cors: Option<CorsLayer>,
}

impl AxumApp {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MountableApp for AxumApp {
    type Output = Router;

    fn mount_http(&mut self, path: &str, method: Method, endpoint: HttpEndpoint) {
        debug!("Mounting {method} {path}");
        // axum also routes HEAD to a GET-only route; the endpoint still sees
        // the method it was mounted for, and hyper drops the response body.
        let handler = move |uri: Uri, headers: HeaderMap, body: Bytes| {
            let endpoint = endpoint.clone();
            async move { dispatch_http(endpoint, method, uri, headers, body).await }
        };
        // Routes at an existing path are merged by method.
        let router = std::mem::take(&mut self.router);
        self.router = router.route(path, on(method_filter(method), handler));
    }

    fn mount_stream(&mut self, path: &str, endpoint: StreamEndpoint) {
        debug!("Mounting stream {path}");
        let handler = move |uri: Uri, headers: HeaderMap, upgrade: WebSocketUpgrade| {
            let endpoint = endpoint.clone();
            async move { dispatch_stream(endpoint, uri, headers, upgrade).await }
        };
        let router = std::mem::take(&mut self.router);
        self.router = router.route(path, get(handler));
    }

    fn apply_cors(&mut self, policy: &CorsPolicy) {
        self.cors = Some(cors_layer(policy));
    }

    fn finish(self) -> Router {
        match self.cors {
            Some(cors) => self.router.layer(cors),
            None => self.router,
        }
    }
}

fn method_filter(method: Method) -> MethodFilter {
    match method {
        Method::Get => MethodFilter::GET,
        Method::Post => MethodFilter::POST,
        Method::Put => MethodFilter::PUT,
        Method::Patch => MethodFilter::PATCH,
        Method::Delete => MethodFilter::DELETE,
        Method::Options => MethodFilter::OPTIONS,
        Method::Head => MethodFilter::HEAD,
    }
}

async fn dispatch_http(
    endpoint: HttpEndpoint,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let response = endpoint(Request::from_parts(method, uri, headers, body)).await;
    into_axum_response(response)
}

fn into_axum_response(response: Response) -> axum::response::Response {
    let (status, headers, body) = response.into_parts();
    let mut out = axum::response::Response::new(Body::from(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}

async fn dispatch_stream(
    endpoint: StreamEndpoint,
    uri: Uri,
    headers: HeaderMap,
    upgrade: WebSocketUpgrade,
) -> axum::response::Response {
    let (conn, response_rx) = AxumConnection::pending(upgrade, ConnectInfo::new(uri, headers));

    // The session outlives this request: it keeps running on the upgraded socket.
    tokio::spawn(endpoint(Box::new(conn)));

    match response_rx.await {
        Ok(response) => response,
        Err(_) => {
            warn!("Streaming session ended before deciding on the upgrade");
            let body = Envelope::error(
                "Internal server error",
                Some(ErrorCodes::INTERNAL_ERROR.to_string()),
            );
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CORS
// ─────────────────────────────────────────────────────────────────────────────

/// Translate a validated policy into a tower-http layer.
///
/// With credentials enabled, wildcard methods/headers are mirrored from the
/// preflight request (a literal `*` is not honoured by browsers then).
pub fn cors_layer(policy: &CorsPolicy) -> CorsLayer {
    let origins = if policy.any_origin() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            policy
                .allow_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    let methods = if policy.any_method() {
        if policy.allow_credentials {
            AllowMethods::mirror_request()
        } else {
            AllowMethods::from(Any)
        }
    } else {
        AllowMethods::list(
            policy
                .allow_methods
                .iter()
                .filter_map(|m| m.parse::<Method>().ok())
                .map(axum::http::Method::from),
        )
    };

    let headers = if policy.any_header() {
        if policy.allow_credentials {
            AllowHeaders::mirror_request()
        } else {
            AllowHeaders::from(Any)
        }
    } else {
        AllowHeaders::list(
            policy
                .allow_headers
                .iter()
                .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(policy.allow_credentials)
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// A running listener serving one composed application.
pub struct TransportServer {
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound address
    local_addr: SocketAddr,
}

impl TransportServer {
    /// Bind `host:port` and start serving `app`.
    pub async fn bind(host: &str, port: u16, app: Router) -> std::io::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        Self::serve(listener, app)
    }

    /// Start serving `app` on an already bound listener.
    pub fn serve(listener: TcpListener, app: Router) -> std::io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        info!("wrapnode transport listening on http://{local_addr}");

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = result {
                error!("Transport server error: {e}");
            }
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Stop accepting new connections and wait for in-flight requests.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("wrapnode transport stopped");
    }
}
