//! Configuration defaults and validation.

use wrapnode_server::*;

struct Noop;

impl HttpHandler for Noop {
    async fn handle(&self, _request: Request) -> Result<Response, HandlerError> {
        Ok(Response::ok())
    }
}

struct Silent;

impl StreamHandler for Silent {
    async fn handle(&self, _conn: &mut Connection) -> Result<(), HandlerError> {
        Ok(())
    }
}

fn errors_of(config: ServiceConfig) -> Vec<ConfigError> {
    config.validate().expect_err("configuration should be rejected").0
}

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn defaults_match_documented_values() {
    let config = ServiceConfig::default();
    assert_eq!(config.title, "Agent API");
    assert_eq!(config.version, "1.0.0");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.server.log_level, LogLevel::Info);
    assert!(config.enable_cors);
    assert!(config.cors.is_none());
    assert!(config.middleware.is_empty());
    assert!(config.health_endpoint);
}

#[test]
fn empty_configuration_is_valid() {
    let validated = ServiceConfig::new().validate().unwrap();
    assert!(validated.config().http_routes.is_empty());
    assert!(validated.config().stream_routes.is_empty());
}

#[test]
fn enabled_cors_without_policy_gets_the_permissive_default() {
    let validated = ServiceConfig::new().validate().unwrap();
    assert_eq!(validated.cors(), Some(&CorsPolicy::default()));
}

#[test]
fn disabled_cors_resolves_to_no_policy() {
    let validated = ServiceConfig::new()
        .cors(CorsPolicy::for_origins(["https://app.example"]))
        .disable_cors()
        .validate()
        .unwrap();
    assert!(validated.cors().is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Routes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn same_path_with_disjoint_methods_is_valid() {
    let config = ServiceConfig::new()
        .http_route(HttpRoute::new("/x", [Method::Get], Noop))
        .http_route(HttpRoute::new("/x", [Method::Post], Noop));
    assert!(config.validate().is_ok());
}

#[test]
fn duplicate_path_and_method_is_rejected() {
    let errors = errors_of(
        ServiceConfig::new()
            .http_route(HttpRoute::new("/x", [Method::Get, Method::Post], Noop))
            .http_route(HttpRoute::new("/x", [Method::Post], Noop)),
    );
    assert_eq!(
        errors,
        vec![ConfigError::DuplicateRoute {
            path: "/x".into(),
            method: Method::Post
        }]
    );
}

#[test]
fn every_problem_is_reported() {
    let errors = errors_of(
        ServiceConfig::new()
            .http_route(HttpRoute::new("echo", [Method::Post], Noop))
            .http_route(HttpRoute::new("/none", [], Noop))
            .stream_route(StreamRoute::new("/ws", Silent))
            .stream_route(StreamRoute::new("/ws", Silent))
            .host("")
            .port(0),
    );
    assert!(errors.iter().any(|e| matches!(e, ConfigError::InvalidPath { path, .. } if path == "echo")));
    assert!(errors.contains(&ConfigError::NoMethods { path: "/none".into() }));
    assert!(errors.contains(&ConfigError::DuplicateStreamRoute { path: "/ws".into() }));
    assert!(errors.contains(&ConfigError::EmptyHost));
    assert!(errors.contains(&ConfigError::InvalidPort(0)));
    assert_eq!(errors.len(), 5);
}

#[test]
fn colon_parameters_are_rejected() {
    let errors = errors_of(ServiceConfig::new().http_route(HttpRoute::new("/agents/:id", [Method::Get], Noop)));
    assert!(matches!(&errors[..], [ConfigError::InvalidPath { .. }]));
}

#[test]
fn differently_named_parameters_at_one_position_conflict() {
    let errors = errors_of(
        ServiceConfig::new()
            .http_route(HttpRoute::new("/agents/{id}", [Method::Get], Noop))
            .http_route(HttpRoute::new("/agents/{name}", [Method::Post], Noop)),
    );
    assert_eq!(
        errors,
        vec![ConfigError::RouteConflict {
            path: "/agents/{name}".into(),
            existing: "/agents/{id}".into(),
        }]
    );
}

#[test]
fn stream_template_conflicts_with_http_template() {
    let errors = errors_of(
        ServiceConfig::new()
            .http_route(HttpRoute::new("/rooms/{room}/log", [Method::Get], Noop))
            .stream_route(StreamRoute::new("/rooms/{id}/live", Silent)),
    );
    assert!(matches!(&errors[..], [ConfigError::RouteConflict { .. }]));
}

#[test]
fn shared_parameter_names_and_static_siblings_are_valid() {
    let config = ServiceConfig::new()
        .http_route(HttpRoute::new("/agents/{id}", [Method::Get], Noop))
        .http_route(HttpRoute::new("/agents/{id}/chat", [Method::Post], Noop))
        .http_route(HttpRoute::new("/agents/new", [Method::Get], Noop))
        .stream_route(StreamRoute::new("/agents/{id}/live", Silent));
    assert!(config.validate().is_ok());
}

#[test]
fn empty_parameter_name_is_rejected() {
    let errors = errors_of(ServiceConfig::new().http_route(HttpRoute::new("/a/{}", [Method::Get], Noop)));
    assert_eq!(
        errors,
        vec![ConfigError::InvalidPath {
            path: "/a/{}".into(),
            reason: "parameter name must not be empty",
        }]
    );
}

#[test]
fn conflicting_templates_never_reach_the_router() {
    let result = AgentService::new(
        ServiceConfig::new()
            .http_route(HttpRoute::new("/agents/{id}", [Method::Get], Noop))
            .http_route(HttpRoute::new("/agents/{name}", [Method::Post], Noop))
            .http_route(HttpRoute::new("/a/{}", [Method::Get], Noop)),
    );
    let errors = result.err().expect("configuration should be rejected");
    assert_eq!(errors.len(), 2);
}

#[test]
fn stream_route_cannot_share_a_get_path() {
    let errors = errors_of(
        ServiceConfig::new()
            .http_route(HttpRoute::new("/live", [Method::Get], Noop))
            .stream_route(StreamRoute::new("/live", Silent)),
    );
    assert_eq!(errors, vec![ConfigError::StreamCollision { path: "/live".into() }]);
}

#[test]
fn stream_route_may_share_a_post_path() {
    let config = ServiceConfig::new()
        .http_route(HttpRoute::new("/live", [Method::Post], Noop))
        .stream_route(StreamRoute::new("/live", Silent));
    assert!(config.validate().is_ok());
}

// ─────────────────────────────────────────────────────────────────────────────
// CORS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn credentials_with_wildcard_origin_is_rejected() {
    let errors = errors_of(ServiceConfig::new().cors(CorsPolicy::default().with_credentials(true)));
    assert_eq!(errors, vec![ConfigError::CredentialsWithWildcardOrigin]);
}

#[test]
fn credentials_with_listed_origins_are_accepted() {
    let config = ServiceConfig::new().cors(CorsPolicy::for_origins(["https://app.example"]).with_credentials(true));
    assert!(config.validate().is_ok());
}

#[test]
fn malformed_cors_entries_are_rejected() {
    let errors = errors_of(
        ServiceConfig::new().cors(
            CorsPolicy::for_origins(["app.example"])
                .with_methods(["GET", "FETCH"])
                .with_headers(["x-ok", "bad header"]),
        ),
    );
    assert!(errors.contains(&ConfigError::InvalidOrigin("app.example".into())));
    assert!(errors.contains(&ConfigError::InvalidCorsMethod("FETCH".into())));
    assert!(errors.contains(&ConfigError::InvalidCorsHeader("bad header".into())));
    assert_eq!(errors.len(), 3);
}

// ─────────────────────────────────────────────────────────────────────────────
// Log level / options
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn log_level_parses_case_insensitively() {
    assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warning);
    assert_eq!("critical".parse::<LogLevel>().unwrap(), LogLevel::Critical);
    assert_eq!(
        "verbose".parse::<LogLevel>().unwrap_err(),
        ConfigError::UnknownLogLevel("verbose".into())
    );
    assert_eq!(LogLevel::Warning.as_filter(), "warn");
    assert_eq!(LogLevel::Critical.as_filter(), "error");
}

#[test]
fn server_options_deserialize_with_defaults() {
    let options: ServerOptions = serde_json::from_str(r#"{"port": 9001, "log_level": "debug"}"#).unwrap();
    assert_eq!(options.host, "0.0.0.0");
    assert_eq!(options.port, 9001);
    assert_eq!(options.log_level, LogLevel::Debug);
}
