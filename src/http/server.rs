//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the health routes under the API prefix
//! - Wire up middleware (request ID, tracing, metrics, security, errors)
//! - Serve Swagger UI and the OpenAPI document
//! - Bind server to listener and drain on shutdown
//!
//! # Middleware Order (outermost first)
//! ```text
//! RequestIdLayer          → every later layer sees the request id
//! TraceLayer              → span per request (request_id, method, path)
//! track_requests          → request counters and latency
//! apply_security_headers  → hardening headers on every response
//! normalize_errors        → canonical error envelope, logged once
//! enforce_origin          → 403 CORS_ERROR for unknown origins
//! CorsLayer               → preflights and access-control-* headers
//! enforce_rate_limit      → 429 TOO_MANY_REQUESTS
//! RequestBodyLimitLayer   → 413 for oversized bodies
//! TimeoutLayer            → 408 when a handler runs too long
//! CatchPanicLayer         → panics become unexpected failures
//! ```

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::error::{Failure, UnexpectedError};
use crate::health::{self, Readiness};
use crate::lifecycle;
use crate::http::docs::{self, DOCS_JSON_PATH, DOCS_PATH};
use crate::http::errors::{capture_path_params, normalize_errors, route_not_found};
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::observability::metrics;
use crate::security::{
    apply_security_headers, cors_layer, enforce_origin, enforce_rate_limit, RateLimiter,
    SecurityHeaders,
};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub readiness: Arc<Readiness>,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to read listener address: {0}")]
    LocalAddr(#[source] std::io::Error),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// HTTP server for the API.
pub struct HttpServer {
    router: Router,
    config: Arc<AppConfig>,
}

impl HttpServer {
    /// Create a server with placeholder readiness probes.
    pub fn new(config: AppConfig) -> Self {
        Self::with_readiness(config, Readiness::placeholder())
    }

    pub fn with_readiness(config: AppConfig, readiness: Readiness) -> Self {
        Self::with_routes(config, readiness, Router::new())
    }

    /// Create a server with extra API routes mounted next to the health
    /// routes, under the same prefix and middleware stack.
    pub fn with_routes(config: AppConfig, readiness: Readiness, routes: Router<AppState>) -> Self {
        lifecycle::mark_process_start();
        let config = Arc::new(config);
        let state = AppState {
            config: config.clone(),
            readiness: Arc::new(readiness),
        };
        let router = Self::build_router(&config, state, routes);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &Arc<AppConfig>, state: AppState, extra: Router<AppState>) -> Router {
        let api = health::routes()
            .merge(extra)
            .route_layer(middleware::from_fn(capture_path_params));

        let prefix = config.server.normalized_prefix();
        let routes = if prefix.is_empty() {
            Router::new().merge(api)
        } else {
            Router::new().nest(prefix, api)
        };

        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let security_headers = Arc::new(SecurityHeaders::for_environment(config.environment));

        routes
            .merge(SwaggerUi::new(DOCS_PATH).url(DOCS_JSON_PATH, docs::openapi(config)))
            .fallback(route_not_found)
            .with_state(state)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.server.request_timeout_secs,
            )))
            .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
            .layer(middleware::from_fn_with_state(limiter, enforce_rate_limit))
            .layer(cors_layer(&config.cors))
            .layer(middleware::from_fn_with_state(
                Arc::new(config.cors.clone()),
                enforce_origin,
            ))
            .layer(middleware::from_fn_with_state(config.clone(), normalize_errors))
            .layer(middleware::from_fn_with_state(
                security_headers,
                apply_security_headers,
            ))
            .layer(middleware::from_fn(metrics::track_requests))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .request_id()
                    .map(|id| id.to_string())
                    .unwrap_or_default();
                tracing::info_span!(
                    "request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }))
            .layer(RequestIdLayer)
    }

    /// The fully layered router, for driving the service without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;
        tracing::info!(
            address = %addr,
            prefix = %self.config.server.normalized_prefix(),
            environment = %self.config.environment,
            "HTTP server starting"
        );
        tracing::info!(address = %addr, "API documentation available at {DOCS_PATH}");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await
            .map_err(ServerError::Serve)?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    Failure::Unexpected(UnexpectedError::from_panic(payload)).into_response()
}
