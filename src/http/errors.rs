//! Error normalization.
//!
//! # Responsibilities
//! - Turn every raised [`Failure`] into one canonical JSON envelope
//! - Redact internals (raw messages, stacks) outside development
//! - Log each failure once with the request that caused it
//! - Answer unmatched routes with `ROUTE_NOT_FOUND`
//!
//! # Design Decisions
//! - Handlers never format error bodies; they return `Failure` and
//!   [`normalize_errors`] rewrites the response on the way out
//! - Plain-text error responses produced by the HTTP stack itself
//!   (405, 408, 413, ...) are treated as framework errors; a bare 404 (e.g.
//!   from the docs router) gets the `ROUTE_NOT_FOUND` envelope
//! - Headers set by inner layers on the failed response are preserved

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{RawPathParams, Request, State},
    extract::rejection::RawPathParamsRejection,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::AppConfig;
use crate::error::{Failure, FrameworkError};
use crate::http::request::RequestIdExt;
use crate::http::response::{format_timestamp, ErrorBody, ErrorEnvelope};
use crate::observability::metrics;

/// Message returned for unexpected failures outside development.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Code of the unmatched-route response.
pub const ROUTE_NOT_FOUND: &str = "ROUTE_NOT_FOUND";

/// Largest plain-text framework error body read back as a message.
const MAX_FRAMEWORK_BODY: usize = 16 * 1024;

const REDACTED_HEADERS: [&str; 3] = ["authorization", "cookie", "set-cookie"];

/// Map a failure to its status and envelope.
///
/// Pure: the same inputs always produce the same output.
pub fn normalize(
    failure: &Failure,
    path: &str,
    development: bool,
    now: DateTime<Utc>,
) -> (StatusCode, ErrorEnvelope) {
    let timestamp = format_timestamp(now);
    let path = path.to_string();

    let (status, body) = match failure {
        Failure::Domain(error) => (
            error.status(),
            ErrorBody {
                code: error.code().to_string(),
                message: error.message().to_string(),
                details: error.details().cloned(),
                timestamp,
                path,
                stack: development.then(|| error.stack()),
            },
        ),
        Failure::Framework(error) => (
            error.status(),
            ErrorBody {
                code: error.code().to_string(),
                message: error.message().to_string(),
                details: None,
                timestamp,
                path,
                stack: development.then(|| error.stack()),
            },
        ),
        Failure::Unexpected(error) => {
            let (message, stack) = if development {
                (error.message().to_string(), Some(error.stack().to_string()))
            } else {
                (GENERIC_ERROR_MESSAGE.to_string(), None)
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    code: "INTERNAL_SERVER_ERROR".to_string(),
                    message,
                    details: None,
                    timestamp,
                    path,
                    stack,
                },
            )
        }
    };

    (status, ErrorEnvelope::new(body))
}

/// Path parameters of the matched route, kept for error logging.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PathParams(pub BTreeMap<String, String>);

/// Route-level middleware copying matched path parameters onto error
/// responses so the normalizer can log them.
pub async fn capture_path_params(
    params: Result<RawPathParams, RawPathParamsRejection>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    if response.status().is_client_error() || response.status().is_server_error() {
        let params = params
            .map(|params| {
                params
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        response.extensions_mut().insert(PathParams(params));
    }
    response
}

/// What gets logged about the failed request.
#[derive(Debug, Serialize)]
struct RequestRecord<'a> {
    method: &'a str,
    path: &'a str,
    params: &'a BTreeMap<String, String>,
    query: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
}

fn query_map(uri: &Uri) -> BTreeMap<String, String> {
    uri.query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if REDACTED_HEADERS.contains(&name.as_str()) {
                "[REDACTED]".to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.as_str().to_string(), value)
        })
        .collect()
}

/// Whether a response without a parked failure is a bare error produced by
/// the HTTP stack rather than by this service.
fn is_framework_error(response: &Response) -> bool {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return false;
    }
    !response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

async fn framework_failure(response: Response) -> (Response, Failure) {
    let status = response.status();
    let (parts, body) = response.into_parts();
    let text = match to_bytes(body, MAX_FRAMEWORK_BODY).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(_) => String::new(),
    };
    let message = if text.is_empty() {
        status.canonical_reason().unwrap_or("Error").to_string()
    } else {
        text
    };
    let failure = Failure::Framework(FrameworkError::new(status, message));
    (Response::from_parts(parts, Body::empty()), failure)
}

fn log_failure(failure: &Failure, record: &RequestRecord<'_>, request_id: &str) {
    let request = serde_json::to_string(record).unwrap_or_default();
    match failure {
        Failure::Domain(error) if error.is_operational() => tracing::warn!(
            request_id,
            code = error.code(),
            status = error.status().as_u16(),
            err = %error.to_log_record(),
            request = %request,
            "{}",
            error
        ),
        Failure::Domain(error) => tracing::error!(
            request_id,
            code = error.code(),
            status = error.status().as_u16(),
            err = %error.to_log_record(),
            stack = %error.stack(),
            request = %request,
            "{}",
            error
        ),
        Failure::Framework(error) if error.status().is_client_error() => tracing::warn!(
            request_id,
            code = error.code(),
            status = error.status().as_u16(),
            request = %request,
            "{}",
            error
        ),
        Failure::Framework(error) => tracing::error!(
            request_id,
            code = error.code(),
            status = error.status().as_u16(),
            request = %request,
            "{}",
            error
        ),
        Failure::Unexpected(error) => tracing::error!(
            request_id,
            stack = %error.stack(),
            request = %request,
            "Unhandled error: {}",
            error
        ),
    }
}

/// Middleware running the normalizer once for every failed request.
pub async fn normalize_errors(
    State(config): State<Arc<AppConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = request.headers().clone();
    let request_id = request
        .request_id()
        .map(|id| id.to_string())
        .unwrap_or_default();

    let mut response = next.run(request).await;

    let (response, failure) = match response.extensions_mut().remove::<Failure>() {
        Some(failure) => (response, failure),
        None if response.status() == StatusCode::NOT_FOUND && is_framework_error(&response) => {
            let mut normalized = not_found_response(&method, uri.path());
            carry_headers(&response, &mut normalized);
            return normalized;
        }
        None if is_framework_error(&response) => framework_failure(response).await,
        None => return response,
    };

    let params = response
        .extensions()
        .get::<PathParams>()
        .cloned()
        .unwrap_or_default();
    let record = RequestRecord {
        method: method.as_str(),
        path: uri.path(),
        params: &params.0,
        query: query_map(&uri),
        headers: header_map(&headers),
    };
    log_failure(&failure, &record, &request_id);

    let (status, envelope) = normalize(&failure, uri.path(), config.is_development(), Utc::now());
    metrics::record_error(&envelope.error.code, status.as_u16());

    let mut normalized = (status, Json(envelope)).into_response();
    carry_headers(&response, &mut normalized);
    normalized
}

/// Copy headers inner layers set on `from`, except the body framing ones.
fn carry_headers(from: &Response, to: &mut Response) {
    for (name, value) in from.headers() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            to.headers_mut().append(name.clone(), value.clone());
        }
    }
}

/// Fallback for requests no route matched.
pub async fn route_not_found(method: Method, uri: Uri) -> Response {
    not_found_response(&method, uri.path())
}

fn not_found_response(method: &Method, path: &str) -> Response {
    tracing::info!(method = %method, path = %path, "Route not found");

    let envelope = ErrorEnvelope::new(ErrorBody {
        code: ROUTE_NOT_FOUND.to_string(),
        message: format!("Route {method}:{path} not found"),
        details: None,
        timestamp: format_timestamp(Utc::now()),
        path: path.to_string(),
        stack: None,
    });
    (StatusCode::NOT_FOUND, Json(envelope)).into_response()
}
