//! Cross-origin request policy.
//!
//! Requests without an `Origin` header pass untouched (curl, server-to-server).
//! Allowed origins get the usual `access-control-*` headers from
//! [`cors_layer`]; any other origin is rejected by [`enforce_origin`] with a
//! `CORS_ERROR` before it reaches a handler.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::validation::WILDCARD_ORIGIN;
use crate::config::CorsConfig;
use crate::error::{DomainError, Failure};

const EXPOSED_HEADERS: [HeaderName; 3] = [
    HeaderName::from_static("x-total-count"),
    HeaderName::from_static("x-page"),
    HeaderName::from_static("x-limit"),
];

const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::OPTIONS,
];

/// `tower-http` CORS layer for the configured allow-list.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| {
            if origin == WILDCARD_ORIGIN {
                tracing::warn!(%origin, "Ignoring wildcard CORS origin");
                return None;
            }
            match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(error) => {
                    tracing::warn!(%origin, %error, "Ignoring unusable CORS origin");
                    None
                }
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers(EXPOSED_HEADERS)
}

/// Middleware rejecting requests whose `Origin` is not allow-listed.
pub async fn enforce_origin(
    State(config): State<Arc<CorsConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(origin) = request.headers().get(header::ORIGIN) else {
        return next.run(request).await;
    };

    let origin = String::from_utf8_lossy(origin.as_bytes()).into_owned();
    if config.is_allowed(&origin) {
        return next.run(request).await;
    }

    tracing::debug!(%origin, "Rejected cross-origin request");
    Failure::from(DomainError::cors(format!(
        "Origin {origin} is not allowed by CORS"
    )))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        let config = CorsConfig {
            allowed_origins: vec!["https://app.storagie.com".to_string()],
        };
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(cors_layer(&config))
            .layer(middleware::from_fn_with_state(Arc::new(config), enforce_origin))
    }

    fn request(origin: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/");
        if let Some(origin) = origin {
            builder = builder.header("origin", origin);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_no_origin_passes() {
        let response = app().oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), 200);
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_allowed_origin_is_echoed() {
        let response = app()
            .oneshot(request(Some("https://app.storagie.com")))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://app.storagie.com"
        );
        assert_eq!(response.headers()["access-control-allow-credentials"], "true");
    }

    #[tokio::test]
    async fn test_unknown_origin_is_rejected() {
        let response = app()
            .oneshot(request(Some("https://evil.example")))
            .await
            .unwrap();
        assert_eq!(response.status(), 403);

        let failure = response.extensions().get::<Failure>().unwrap();
        match failure {
            Failure::Domain(error) => {
                assert_eq!(error.code(), "CORS_ERROR");
                assert_eq!(
                    error.message(),
                    "Origin https://evil.example is not allowed by CORS"
                );
            }
            other => panic!("unexpected failure {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wildcard_entry_is_skipped() {
        let config = CorsConfig {
            allowed_origins: vec!["*".to_string(), "https://app.storagie.com".to_string()],
        };
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(cors_layer(&config));

        let response = app
            .oneshot(request(Some("https://app.storagie.com")))
            .await
            .unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://app.storagie.com"
        );
    }

    #[tokio::test]
    async fn test_preflight_for_allowed_origin() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/")
            .header("origin", "https://app.storagie.com")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), 200);
        let methods = response.headers()["access-control-allow-methods"]
            .to_str()
            .unwrap()
            .to_string();
        assert!(methods.contains("PATCH"));
    }
}
