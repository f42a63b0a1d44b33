//! Service configuration: display metadata, ordered routes, listener options,
//! the CORS policy and the middleware chain.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use wrapnode_protocol::CorsPolicy;

use crate::middleware::{Middleware, MiddlewareChain};
use crate::route::{HttpRoute, StreamRoute};
use crate::validate::ConfigError;

pub const DEFAULT_TITLE: &str = "Agent API";
pub const DEFAULT_DESCRIPTION: &str = "AI Agent API powered by wrapnode";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

/// Log verbosity hint. The engine does not interpret it; binaries map it to
/// a tracing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Equivalent `tracing` filter directive. tracing has no level above
    /// `error`, so `critical` maps onto it.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::UnknownLogLevel(s.to_string()))
    }
}

/// Listener binding options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    pub log_level: LogLevel,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_level: LogLevel::default(),
        }
    }
}

/// Everything needed to compose a service. Validate it with
/// [`ServiceConfig::validate`] before composing.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub title: String,
    pub description: String,
    pub version: String,
    pub http_routes: Vec<HttpRoute>,
    pub stream_routes: Vec<StreamRoute>,
    pub server: ServerOptions,
    pub enable_cors: bool,
    /// Falls back to the permissive default when CORS is enabled and no
    /// policy is given.
    pub cors: Option<CorsPolicy>,
    pub middleware: MiddlewareChain,
    /// Mount the built-in `GET /health` endpoint unless a route claims it.
    pub health_endpoint: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            version: DEFAULT_VERSION.to_string(),
            http_routes: Vec::new(),
            stream_routes: Vec::new(),
            server: ServerOptions::default(),
            enable_cors: true,
            cors: None,
            middleware: MiddlewareChain::new(),
            health_endpoint: true,
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn http_route(mut self, route: HttpRoute) -> Self {
        self.http_routes.push(route);
        self
    }

    pub fn stream_route(mut self, route: StreamRoute) -> Self {
        self.stream_routes.push(route);
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.server.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.server.log_level = level;
        self
    }

    /// Enable CORS with an explicit policy.
    pub fn cors(mut self, policy: CorsPolicy) -> Self {
        self.enable_cors = true;
        self.cors = Some(policy);
        self
    }

    pub fn disable_cors(mut self) -> Self {
        self.enable_cors = false;
        self
    }

    /// Append a middleware. The first one added is the outermost.
    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn health_endpoint(mut self, enabled: bool) -> Self {
        self.health_endpoint = enabled;
        self
    }
}
