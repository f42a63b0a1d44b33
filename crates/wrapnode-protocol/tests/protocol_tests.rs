//! Protocol layer tests: verbs, payload accessors, envelopes, close codes.

#[cfg(test)]
mod tests {
    use http::{StatusCode, Uri};
    use serde_json::{Value, json};
    use wrapnode_protocol::*;

    // ─────────────────────────────────────────────────────────────────────
    // Method
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("Post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!("OPTIONS".parse::<Method>().unwrap(), Method::Options);
    }

    #[test]
    fn method_rejects_unknown_verbs() {
        let err = "INVALID".parse::<Method>().unwrap_err();
        assert_eq!(err, UnknownMethod("INVALID".into()));
        assert!(err.to_string().contains("invalid HTTP method"));
        assert!("TRACE".parse::<Method>().is_err());
        assert!("".parse::<Method>().is_err());
    }

    #[test]
    fn method_converts_to_http_method() {
        for method in Method::ALL {
            let converted: http::Method = method.into();
            assert_eq!(converted.as_str(), method.as_str());
            assert_eq!(Method::try_from(&converted).unwrap(), method);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Request / Response
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn request_json_accessor() {
        let req = Request::new(Method::Post, Uri::from_static("/echo?verbose=1"))
            .with_json(&json!({"x": 1}))
            .unwrap();
        assert_eq!(req.path(), "/echo");
        assert_eq!(req.query(), Some("verbose=1"));
        assert_eq!(req.header("content-type"), Some("application/json"));

        let body: Value = req.json().unwrap();
        assert_eq!(body, json!({"x": 1}));
    }

    #[test]
    fn request_invalid_json_is_a_bad_request() {
        let req = Request::new(Method::Post, Uri::from_static("/echo")).with_body("{not json");
        let err = req.json::<Value>().unwrap_err();
        assert_eq!(err.status, Some(StatusCode::BAD_REQUEST));
        assert_eq!(err.error_code.as_deref(), Some(ErrorCodes::INVALID_BODY));
    }

    #[test]
    fn response_from_error_uses_status_hint() {
        let err = HandlerError::not_found("no such agent").with_code("agent_missing");
        let resp = Response::from_error(&err);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: Value = resp.json_body().unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "no such agent");
        assert_eq!(body["error_code"], "agent_missing");
    }

    #[test]
    fn response_from_error_defaults_to_500() {
        let resp = Response::from_error(&HandlerError::new("boom"));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = resp.json_body().unwrap();
        assert!(body.get("error_code").is_none());
    }

    #[test]
    fn response_success_helper() {
        let resp = Response::success(json!({"answer": 42}));
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json_body().unwrap();
        assert_eq!(body, json!({"status": "success", "data": {"answer": 42}}));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Envelope
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn error_envelope_wire_format() {
        let env = Envelope::error("Internal server error", Some("internal_error".into()));
        assert!(env.is_error());
        let wire = serde_json::to_value(&env).unwrap();
        assert_eq!(
            wire,
            json!({"status": "error", "message": "Internal server error", "error_code": "internal_error"})
        );
    }

    #[test]
    fn envelope_deserializes_from_wire() {
        let env: Envelope =
            serde_json::from_str(r#"{"status":"error","message":"nope"}"#).unwrap();
        assert_eq!(env, Envelope::error("nope", None));

        let env: Envelope =
            serde_json::from_str(r#"{"status":"success","data":[1,2]}"#).unwrap();
        assert!(env.is_success());
    }

    #[test]
    fn transport_error_converts_to_handler_error() {
        let err: HandlerError = TransportError::Closed.into();
        assert_eq!(err.error_code.as_deref(), Some(ErrorCodes::TRANSPORT_ERROR));
        assert_eq!(err.status_or_default(), StatusCode::BAD_GATEWAY);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Stream types
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn close_code_constants() {
        assert_eq!(CloseCode::NORMAL.code(), 1000);
        assert_eq!(CloseCode::ABNORMAL.code(), 1006);
        assert_eq!(CloseCode::INTERNAL_ERROR.code(), 1011);
        assert!(CloseCode::NORMAL.is_normal());
        assert!(!CloseCode::ABNORMAL.is_normal());
    }

    #[test]
    fn message_text_accessors() {
        let msg = Message::from("hi");
        assert_eq!(msg.as_text(), Some("hi"));
        assert_eq!(Message::from(vec![1u8, 2]).as_text(), None);
    }

    // ─────────────────────────────────────────────────────────────────────
    // CorsPolicy
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn cors_default_is_permissive_without_credentials() {
        let policy = CorsPolicy::default();
        assert!(policy.any_origin());
        assert!(policy.any_method());
        assert!(policy.any_header());
        assert!(!policy.allow_credentials);
    }

    #[test]
    fn cors_policy_deserializes_with_defaults() {
        let policy: CorsPolicy =
            serde_json::from_value(json!({"allow_origins": ["https://app.example"]})).unwrap();
        assert!(!policy.any_origin());
        assert!(policy.any_method());
        assert!(!policy.allow_credentials);
    }
}
