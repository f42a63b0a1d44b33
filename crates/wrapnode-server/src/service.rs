//! Runnable service: a composed application bound to a listener, with the
//! lifecycle hooks run around it.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};
use wrapnode_transport::{AxumApp, TransportServer};

use crate::compose::{ComposedApp, EndpointKind, RegisteredEndpoint, compose};
use crate::config::{ServerOptions, ServiceConfig};
use crate::lifecycle::{Lifecycle, LifecycleReport};
use crate::validate::{ValidatedConfig, ValidationErrors};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ValidationErrors),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// A composed service, ready to start.
pub struct AgentService {
    title: String,
    options: ServerOptions,
    composed: ComposedApp<Router>,
}

impl AgentService {
    /// Validate `config` and compose it against the axum transport.
    pub fn new(config: ServiceConfig) -> Result<Self, ValidationErrors> {
        Ok(Self::from_validated(config.validate()?))
    }

    pub fn from_validated(config: ValidatedConfig) -> Self {
        let title = config.config().title.clone();
        let options = config.server().clone();
        let composed = compose(config, AxumApp::new());
        Self {
            title,
            options,
            composed,
        }
    }

    pub fn endpoints(&self) -> &[RegisteredEndpoint] {
        &self.composed.endpoints
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// The composed router, for serving it some other way.
    pub fn router(&self) -> Router {
        self.composed.app.clone()
    }

    /// Run startup hooks, then bind the configured host and port.
    pub async fn start(self) -> Result<RunningService, ServiceError> {
        let addr = format!("{}:{}", self.options.host, self.options.port);
        let startup = self.composed.lifecycle.startup().await;
        match TcpListener::bind((self.options.host.as_str(), self.options.port)).await {
            Ok(listener) => self.serve(listener, startup),
            Err(source) => {
                error!("Failed to bind {addr}: {source}");
                self.composed.lifecycle.shutdown().await;
                Err(ServiceError::Bind { addr, source })
            }
        }
    }

    /// Run startup hooks, then serve on an already bound listener.
    pub async fn start_with_listener(self, listener: TcpListener) -> Result<RunningService, ServiceError> {
        let startup = self.composed.lifecycle.startup().await;
        self.serve(listener, startup)
    }

    /// Start, wait for `signal`, then stop. Returns the shutdown report.
    pub async fn run_until(self, signal: impl Future<Output = ()>) -> Result<LifecycleReport, ServiceError> {
        let running = self.start().await?;
        signal.await;
        info!("Shutdown signal received");
        Ok(running.stop().await)
    }

    fn serve(self, listener: TcpListener, startup: LifecycleReport) -> Result<RunningService, ServiceError> {
        let ComposedApp {
            app,
            endpoints,
            lifecycle,
        } = self.composed;
        let server = TransportServer::serve(listener, app)?;

        info!("{} listening on http://{}", self.title, server.local_addr());
        for endpoint in &endpoints {
            match endpoint.kind {
                EndpointKind::Stream => info!("  WS     {}  ({})", endpoint.path, endpoint.handler),
                _ => info!(
                    "  {:<6} {}  ({})",
                    endpoint.method.map(|m| m.as_str()).unwrap_or("-"),
                    endpoint.path,
                    endpoint.handler
                ),
            }
        }

        Ok(RunningService {
            server,
            lifecycle,
            endpoints,
            startup,
        })
    }
}

/// A service that is accepting connections.
pub struct RunningService {
    server: TransportServer,
    lifecycle: Lifecycle,
    endpoints: Vec<RegisteredEndpoint>,
    startup: LifecycleReport,
}

impl RunningService {
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn port(&self) -> u16 {
        self.server.port()
    }

    pub fn startup_report(&self) -> &LifecycleReport {
        &self.startup
    }

    pub fn endpoints(&self) -> &[RegisteredEndpoint] {
        &self.endpoints
    }

    /// Stop the listener gracefully, then run shutdown hooks.
    pub async fn stop(mut self) -> LifecycleReport {
        self.server.stop().await;
        self.lifecycle.shutdown().await
    }
}
