//! Behaviour of the fully layered router, driven without a socket.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::DateTime;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use common::{
    app, app_with_readiness, base_env, body_json, get_request, json_request, ALLOWED_ORIGIN,
};
use storagie_api::config::{load_config_from, ConfigError};
use storagie_api::health::{Readiness, StaticProbe};

#[tokio::test]
async fn test_generates_request_id() {
    let response = app(&[]).oneshot(get_request("/api/v1/health")).await.unwrap();
    let id = response.headers()["x-request-id"].to_str().unwrap();
    assert!(Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn test_echoes_inbound_request_id_on_errors() {
    let request = Request::builder()
        .uri("/api/v1/missing")
        .header("x-request-id", "trace-42")
        .body(Body::empty())
        .unwrap();
    let response = app(&[]).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-request-id"], "trace-42");
}

#[tokio::test]
async fn test_health() {
    let response = app(&[]).oneshot(get_request("/api/v1/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "test");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime"].as_f64().unwrap() > 0.0);
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(timestamp.ends_with('Z'));
    assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_uptime_counts_from_process_start() {
    let _first = app(&[]);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // A router built later still reports time since the process started.
    let response = app(&[]).oneshot(get_request("/api/v1/health")).await.unwrap();
    let uptime = body_json(response).await["uptime"].as_f64().unwrap();
    assert!(uptime >= 0.05, "uptime {uptime}");
}

#[test]
fn test_wildcard_origin_is_a_config_error() {
    let mut env = base_env();
    env.insert("ALLOWED_ORIGINS".to_string(), "*".to_string());
    match load_config_from(|key| env.get(key).cloned()) {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|error| error.variable == "ALLOWED_ORIGINS"));
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_readiness_with_placeholder_probes() {
    let response = app(&[])
        .oneshot(get_request("/api/v1/health/ready"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "ready": true, "services": { "database": true, "redis": true } })
    );
}

#[tokio::test]
async fn test_readiness_reports_failing_dependency() {
    let readiness = Readiness::new()
        .with_probe(StaticProbe::new("database", false))
        .with_probe(StaticProbe::new("redis", true));
    let response = app_with_readiness(&[], readiness)
        .oneshot(get_request("/api/v1/health/ready"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    // A 503 readiness report is a normal answer, not a failure.
    let body = body_json(response).await;
    assert_eq!(body["ready"], false);
    assert_eq!(body["services"]["database"], false);
}

#[tokio::test]
async fn test_unknown_route() {
    let response = app(&[]).oneshot(get_request("/api/v1/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "ROUTE_NOT_FOUND");
    assert_eq!(body["error"]["message"], "Route GET:/api/v1/nope not found");
    assert_eq!(body["error"]["path"], "/api/v1/nope");
    assert!(body["error"].get("stack").is_none());
}

#[tokio::test]
async fn test_routes_outside_prefix_are_not_found() {
    let response = app(&[]).oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "ROUTE_NOT_FOUND");
}

#[tokio::test]
async fn test_custom_prefix() {
    let router = app(&[("PREFIX", "/api/v2")]);
    let response = router
        .clone()
        .oneshot(get_request("/api/v2/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router.oneshot(get_request("/api/v1/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_domain_error_envelope() {
    let id = Uuid::new_v4();
    let path = format!("/api/v1/users/{id}");
    let response = app(&[]).oneshot(get_request(&path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(
        body["error"]["message"],
        format!("User with identifier '{id}' not found")
    );
    assert_eq!(body["error"]["path"], path);
    assert!(body["error"].get("details").is_none());
    assert!(body["error"].get("stack").is_none());
}

#[tokio::test]
async fn test_domain_error_carries_stack_in_development() {
    let id = Uuid::new_v4();
    let response = app(&[("NODE_ENV", "development")])
        .oneshot(get_request(&format!("/api/v1/users/{id}")))
        .await
        .unwrap();
    let body = body_json(response).await;
    let stack = body["error"]["stack"].as_str().unwrap();
    assert!(stack.starts_with("NotFoundError: User with identifier"));
}

#[tokio::test]
async fn test_invalid_path_params() {
    let response = app(&[])
        .oneshot(get_request("/api/v1/users/not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "Invalid request params");
    assert_eq!(
        body["error"]["details"],
        json!({ "formErrors": [], "fieldErrors": { "id": ["Invalid ID format"] } })
    );
}

#[tokio::test]
async fn test_body_validation() {
    let response = app(&[])
        .oneshot(json_request(
            "POST",
            "/api/v1/sign-up",
            r#"{"email":"not-an-email","password":"Str0ng!pass"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "Invalid request body");
    assert_eq!(
        body["error"]["details"]["fieldErrors"]["email"],
        json!(["Invalid email format"])
    );
}

#[tokio::test]
async fn test_malformed_json() {
    let response = app(&[])
        .oneshot(json_request("POST", "/api/v1/sign-up", "{\"email\":"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["formErrors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_query_validation() {
    let response = app(&[])
        .oneshot(get_request("/api/v1/users?page=0&limit=500"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "Invalid query params");
    assert_eq!(
        body["error"]["details"]["fieldErrors"],
        json!({
            "page": ["Number must be greater than 0"],
            "limit": ["Number must be less than or equal to 100"]
        })
    );

    let response = app(&[])
        .oneshot(get_request("/api/v1/users?page=2&limit=20"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["meta"]["page"], 2);
    assert_eq!(body["meta"]["limit"], 20);
}

#[tokio::test]
async fn test_bare_extractor_rejections_keep_their_codes() {
    let router = app(&[]);

    let response = router
        .clone()
        .oneshot(json_request("POST", "/api/v1/echo", "{\"broken\":"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "JSON_SYNTAX_ERROR");
    assert!(body["error"].get("details").is_none());

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/search?limit=many"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "INVALID_QUERY_STRING");

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/orders/abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "INVALID_PATH_PARAMS");

    let response = router
        .oneshot(json_request("POST", "/api/v1/echo", r#"{"ok":true}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"ok": true}));
}

#[tokio::test]
async fn test_valid_body_reaches_handler() {
    let response = app(&[])
        .oneshot(json_request(
            "POST",
            "/api/v1/sign-up",
            r#"{"email":"new@storagie.com","password":"Str0ng!pass"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["email"], "new@storagie.com");
}

#[tokio::test]
async fn test_conflict() {
    let response = app(&[])
        .oneshot(json_request(
            "POST",
            "/api/v1/sign-up",
            r#"{"email":"taken@storagie.com","password":"Str0ng!pass"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert_eq!(body["error"]["message"], "Email already registered");
}

#[tokio::test]
async fn test_unexpected_error_is_redacted_in_production() {
    let response = app(&[("NODE_ENV", "production")])
        .oneshot(get_request("/api/v1/broken"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INTERNAL_SERVER_ERROR");
    assert_eq!(body["error"]["message"], "An unexpected error occurred");
    assert!(body["error"].get("stack").is_none());
}

#[tokio::test]
async fn test_unexpected_error_is_exposed_in_development() {
    let response = app(&[("NODE_ENV", "development")])
        .oneshot(get_request("/api/v1/broken"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "connection pool exhausted");
    assert!(body["error"]["stack"]
        .as_str()
        .unwrap()
        .starts_with("Error: connection pool exhausted"));
}

#[tokio::test]
async fn test_panic_becomes_internal_error() {
    let response = app(&[]).oneshot(get_request("/api/v1/boom")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "INTERNAL_SERVER_ERROR");
    assert_eq!(body["error"]["message"], "An unexpected error occurred");
}

#[tokio::test]
async fn test_method_not_allowed_is_a_framework_error() {
    let response = app(&[])
        .oneshot(json_request("POST", "/api/v1/health", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(response.headers().contains_key("allow"));

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "FRAMEWORK_ERROR");
    assert_eq!(body["error"]["path"], "/api/v1/health");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let payload = "x".repeat(2 * 1024 * 1024);
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/sign-up")
        .header("content-type", "application/json")
        .header("content-length", payload.len())
        .body(Body::from(payload))
        .unwrap();
    let response = app(&[]).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_request_timeout() {
    let response = app(&[("REQUEST_TIMEOUT_SECS", "1")])
        .oneshot(get_request("/api/v1/slow"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body_json(response).await["error"]["code"], "FRAMEWORK_ERROR");
}

#[tokio::test]
async fn test_disallowed_origin() {
    let request = Request::builder()
        .uri("/api/v1/health")
        .header("origin", "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app(&[]).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "CORS_ERROR");
    assert_eq!(
        body["error"]["message"],
        "Origin https://evil.example is not allowed by CORS"
    );
}

#[tokio::test]
async fn test_allowed_origin() {
    let request = Request::builder()
        .uri("/api/v1/health")
        .header("origin", ALLOWED_ORIGIN)
        .body(Body::empty())
        .unwrap();
    let response = app(&[]).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        ALLOWED_ORIGIN
    );
}

#[tokio::test]
async fn test_rate_limit() {
    let router = app(&[("RATE_LIMIT_MAX", "2")]);
    let limited_request = || {
        Request::builder()
            .uri("/api/v1/health")
            .header("x-real-ip", "203.0.113.7")
            .body(Body::empty())
            .unwrap()
    };

    for expected_remaining in ["1", "0"] {
        let response = router.clone().oneshot(limited_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "2");
        assert_eq!(response.headers()["x-ratelimit-remaining"], expected_remaining);
    }

    let response = router.clone().oneshot(limited_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "TOO_MANY_REQUESTS");
    assert_eq!(
        body["error"]["message"],
        "Rate limit exceeded. Max 2 requests per 1 minute"
    );

    // Requests without client headers fall back to loopback, which is exempt.
    for _ in 0..5 {
        let response = router
            .clone()
            .oneshot(get_request("/api/v1/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }
}

#[tokio::test]
async fn test_forwarded_loopback_is_not_exempt() {
    let router = app(&[("RATE_LIMIT_MAX", "1")]);
    let spoofed = || {
        Request::builder()
            .uri("/api/v1/health")
            .header("x-real-ip", "127.0.0.1")
            .body(Body::empty())
            .unwrap()
    };

    let response = router.clone().oneshot(spoofed()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = router.oneshot(spoofed()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_security_headers_on_success_and_failure() {
    let router = app(&[]);
    for path in ["/api/v1/health", "/api/v1/nope"] {
        let response = router.clone().oneshot(get_request(path)).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
        assert_eq!(headers["referrer-policy"], "no-referrer");
        assert!(headers.contains_key("content-security-policy"));
    }
}

#[tokio::test]
async fn test_openapi_document() {
    let response = app(&[]).oneshot(get_request("/docs/json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc = body_json(response).await;
    assert_eq!(doc["info"]["title"], "Storagie API");
    assert_eq!(doc["servers"][0]["url"], "http://0.0.0.0:3000/api/v1");
    assert!(doc["paths"].get("/health").is_some());
    assert!(doc["paths"].get("/health/ready").is_some());
    assert!(doc["components"]["securitySchemes"].get("bearerAuth").is_some());
}

#[tokio::test]
async fn test_unknown_docs_asset_is_route_not_found() {
    let response = app(&[])
        .oneshot(get_request("/docs/no-such-file"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "ROUTE_NOT_FOUND");
    assert_eq!(body["error"]["message"], "Route GET:/docs/no-such-file not found");
}
