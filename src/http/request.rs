//! Request identity and correlation.
//!
//! # Responsibilities
//! - Reuse the inbound `x-request-id` when present, otherwise generate one
//! - Attach a [`RequestContext`] to the request for the rest of its lifecycle
//! - Echo the identifier on the response
//!
//! # Design Decisions
//! - Request ID added as early as possible so every span and log line for the
//!   request carries it ([`RequestIdLayer`] is the outermost layer)
//! - Blank or non-visible-ASCII inbound values are replaced, not rejected

use std::fmt;
use std::task::{Context, Poll};

use axum::http::{HeaderName, HeaderValue, Method, Request, Response};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};
use uuid::Uuid;

/// Header carrying the correlation id in both directions.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation identifier for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Fresh random identifier (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept an inbound header value if it is usable as-is.
    pub fn from_header(value: Option<&HeaderValue>) -> Option<Self> {
        let value = value?.to_str().ok()?;
        if value.trim().is_empty() {
            return None;
        }
        Some(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-request identity, stored in the request extensions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
}

/// Access to the request identity from any request type.
pub trait RequestIdExt {
    fn request_context(&self) -> Option<&RequestContext>;

    fn request_id(&self) -> Option<&RequestId> {
        self.request_context().map(|ctx| &ctx.request_id)
    }
}

impl<B> RequestIdExt for Request<B> {
    fn request_context(&self) -> Option<&RequestContext> {
        self.extensions().get::<RequestContext>()
    }
}

/// Layer assigning or forwarding `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

/// Service produced by [`RequestIdLayer`].
#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestIdService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let request_id = RequestId::from_header(request.headers().get(&X_REQUEST_ID))
            .unwrap_or_else(RequestId::generate);

        let header_value = match HeaderValue::from_str(request_id.as_str()) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::error!(%error, request_id = %request_id, "Failed to encode request id header");
                None
            }
        };
        if let Some(value) = &header_value {
            request.headers_mut().insert(X_REQUEST_ID, value.clone());
        }

        let context = RequestContext {
            request_id,
            method: request.method().clone(),
            path: request.uri().path().to_string(),
        };
        request.extensions_mut().insert(context);

        let future = self.inner.call(request);
        Box::pin(async move {
            let mut response = future.await?;
            if let Some(value) = header_value {
                response.headers_mut().insert(X_REQUEST_ID, value);
            }
            Ok(response)
        })
    }
}
