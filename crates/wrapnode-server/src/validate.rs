//! Configuration validation.
//!
//! Every check runs and every problem is collected, so a caller sees the whole
//! list at once. Composition only accepts the resulting `ValidatedConfig`,
//! which means a rejected configuration never has any route mounted.

use std::collections::HashSet;
use std::fmt;

use http::{HeaderName, Uri};
use thiserror::Error;
use wrapnode_protocol::cors::WILDCARD;
use wrapnode_protocol::{CorsPolicy, Method};

use crate::config::{ServerOptions, ServiceConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("route {path} declares no methods")]
    NoMethods { path: String },

    #[error("duplicate route: {method} {path}")]
    DuplicateRoute { path: String, method: Method },

    #[error("duplicate streaming route: {path}")]
    DuplicateStreamRoute { path: String },

    #[error("streaming route {path} collides with the GET route at the same path")]
    StreamCollision { path: String },

    #[error("route {path} conflicts with {existing}: parameters at the same position must share a name")]
    RouteConflict { path: String, existing: String },

    #[error("host must not be empty")]
    EmptyHost,

    #[error("invalid port {0}: must be in 1-65535")]
    InvalidPort(u16),

    #[error("CORS: allow_credentials cannot be combined with a wildcard origin")]
    CredentialsWithWildcardOrigin,

    #[error("CORS: invalid origin {0:?} (expected scheme://host[:port])")]
    InvalidOrigin(String),

    #[error("CORS: invalid method {0:?}")]
    InvalidCorsMethod(String),

    #[error("CORS: invalid header name {0:?}")]
    InvalidCorsHeader(String),

    #[error("unknown log level {0:?}")]
    UnknownLogLevel(String),
}

/// All problems found in one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ConfigError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[ConfigError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigError> {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid service configuration")?;
        for (i, err) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// A configuration that passed validation. The CORS policy is resolved:
/// present exactly when CORS is enabled.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub(crate) config: ServiceConfig,
}

impl ValidatedConfig {
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn server(&self) -> &ServerOptions {
        &self.config.server
    }

    pub fn cors(&self) -> Option<&CorsPolicy> {
        self.config.cors.as_ref()
    }

    pub(crate) fn into_inner(self) -> ServiceConfig {
        self.config
    }
}

impl ServiceConfig {
    /// Check the whole configuration, collecting every problem.
    pub fn validate(mut self) -> Result<ValidatedConfig, ValidationErrors> {
        let mut errors = Vec::new();

        check_routes(&self, &mut errors);
        check_server(&self.server, &mut errors);

        self.cors = if self.enable_cors {
            let policy = self.cors.take().unwrap_or_default();
            check_cors(&policy, &mut errors);
            Some(policy)
        } else {
            None
        };

        if errors.is_empty() {
            Ok(ValidatedConfig { config: self })
        } else {
            Err(ValidationErrors(errors))
        }
    }
}

fn check_routes(config: &ServiceConfig, errors: &mut Vec<ConfigError>) {
    let mut seen = HashSet::new();
    let mut get_paths = HashSet::new();

    for route in &config.http_routes {
        if let Err(reason) = check_path(&route.path) {
            errors.push(ConfigError::InvalidPath {
                path: route.path.clone(),
                reason,
            });
        }
        if route.methods.is_empty() {
            errors.push(ConfigError::NoMethods {
                path: route.path.clone(),
            });
        }
        for method in route.methods() {
            if !seen.insert((route.path.as_str(), method)) {
                errors.push(ConfigError::DuplicateRoute {
                    path: route.path.clone(),
                    method,
                });
            }
            if method == Method::Get {
                get_paths.insert(route.path.as_str());
            }
        }
    }

    let mut stream_paths = HashSet::new();
    for route in &config.stream_routes {
        if let Err(reason) = check_path(&route.path) {
            errors.push(ConfigError::InvalidPath {
                path: route.path.clone(),
                reason,
            });
        }
        if !stream_paths.insert(route.path.as_str()) {
            errors.push(ConfigError::DuplicateStreamRoute {
                path: route.path.clone(),
            });
        } else if get_paths.contains(route.path.as_str()) {
            errors.push(ConfigError::StreamCollision {
                path: route.path.clone(),
            });
        }
    }

    check_conflicts(config, errors);
}

/// Distinct templates the router cannot tell apart: a parameter (or
/// catch-all) at the same position as a differently named one, after an
/// identical prefix. `/agents/{id}` and `/agents/{name}` conflict;
/// `/agents/{id}` and `/agents/new` do not.
fn check_conflicts(config: &ServiceConfig, errors: &mut Vec<ConfigError>) {
    let mut paths: Vec<&str> = Vec::new();
    let all = config
        .http_routes
        .iter()
        .map(|r| r.path.as_str())
        .chain(config.stream_routes.iter().map(|r| r.path.as_str()));
    for path in all {
        if check_path(path).is_err() || paths.contains(&path) {
            continue;
        }
        if let Some(existing) = paths.iter().find(|existing| templates_conflict(existing, path)) {
            errors.push(ConfigError::RouteConflict {
                path: path.to_string(),
                existing: existing.to_string(),
            });
        }
        paths.push(path);
    }
}

fn templates_conflict(a: &str, b: &str) -> bool {
    for (left, right) in a.split('/').zip(b.split('/')) {
        match (is_capture(left), is_capture(right)) {
            (true, true) if left != right => return true,
            (true, true) => continue,
            (false, false) if left == right => continue,
            _ => return false,
        }
    }
    false
}

fn is_capture(segment: &str) -> bool {
    segment.starts_with('{')
}

/// Paths are matched by the transport; reject what it would refuse or
/// misinterpret. Parameters use the `{name}` capture syntax.
fn check_path(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Err("must not be empty");
    }
    if !path.starts_with('/') {
        return Err("must start with '/'");
    }
    if path.chars().any(|c| c.is_whitespace() || c == '?' || c == '#') {
        return Err("must not contain whitespace, '?' or '#'");
    }
    if path.split('/').any(|segment| segment.starts_with(':')) {
        return Err("use {name} for path parameters, not :name");
    }
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    for (i, segment) in segments.iter().enumerate() {
        if !segment.contains(['{', '}']) {
            continue;
        }
        let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
            return Err("a parameter must be a whole segment, such as {name}");
        };
        let (name, catch_all) = match inner.strip_prefix('*') {
            Some(name) => (name, true),
            None => (inner, false),
        };
        if name.is_empty() {
            return Err("parameter name must not be empty");
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err("parameter names may only contain letters, digits and '_'");
        }
        if catch_all && i + 1 != segments.len() {
            return Err("a catch-all {*name} must be the last segment");
        }
    }
    Ok(())
}

fn check_server(server: &ServerOptions, errors: &mut Vec<ConfigError>) {
    if server.host.trim().is_empty() {
        errors.push(ConfigError::EmptyHost);
    }
    if server.port == 0 {
        errors.push(ConfigError::InvalidPort(server.port));
    }
}

fn check_cors(policy: &CorsPolicy, errors: &mut Vec<ConfigError>) {
    if policy.allow_credentials && policy.any_origin() {
        errors.push(ConfigError::CredentialsWithWildcardOrigin);
    }
    for origin in policy.allow_origins.iter().filter(|o| *o != WILDCARD) {
        if !is_valid_origin(origin) {
            errors.push(ConfigError::InvalidOrigin(origin.clone()));
        }
    }
    for method in policy.allow_methods.iter().filter(|m| *m != WILDCARD) {
        if method.parse::<Method>().is_err() {
            errors.push(ConfigError::InvalidCorsMethod(method.clone()));
        }
    }
    for header in policy.allow_headers.iter().filter(|h| *h != WILDCARD) {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ConfigError::InvalidCorsHeader(header.clone()));
        }
    }
}

/// `scheme://host[:port]`, nothing else.
fn is_valid_origin(origin: &str) -> bool {
    if origin.ends_with('/') {
        return false;
    }
    match origin.parse::<Uri>() {
        Ok(uri) => {
            uri.scheme().is_some()
                && uri.authority().is_some()
                && uri
                    .path_and_query()
                    .is_none_or(|pq| pq.as_str().is_empty() || pq.as_str() == "/")
        }
        Err(_) => false,
    }
}
