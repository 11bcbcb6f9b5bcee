//! Domain error taxonomy.
//!
//! Every expected failure is a [`DomainError`] tagged with an [`ErrorKind`].
//! The kind alone decides the HTTP status and the stable code; both are
//! looked up from a const table and cannot drift after construction.

use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};

/// Closed set of domain error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Validation,
    BadRequest,
    Unauthorized,
    Forbidden,
    Cors,
    NotFound,
    Conflict,
    TooManyRequests,
    InternalServerError,
    ServiceUnavailable,
}

/// Fixed attributes of a kind.
struct KindAttrs {
    status: StatusCode,
    code: &'static str,
    default_message: &'static str,
    operational: bool,
}

const fn attrs(
    status: StatusCode,
    code: &'static str,
    default_message: &'static str,
    operational: bool,
) -> KindAttrs {
    KindAttrs {
        status,
        code,
        default_message,
        operational,
    }
}

impl ErrorKind {
    /// All kinds, in table order.
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::Validation,
        ErrorKind::BadRequest,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::Cors,
        ErrorKind::NotFound,
        ErrorKind::Conflict,
        ErrorKind::TooManyRequests,
        ErrorKind::InternalServerError,
        ErrorKind::ServiceUnavailable,
    ];

    const fn attrs(self) -> KindAttrs {
        match self {
            ErrorKind::Validation => {
                attrs(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "Validation failed", true)
            }
            ErrorKind::BadRequest => {
                attrs(StatusCode::BAD_REQUEST, "BAD_REQUEST", "Bad request", true)
            }
            ErrorKind::Unauthorized => {
                attrs(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Unauthorized access", true)
            }
            ErrorKind::Forbidden => {
                attrs(StatusCode::FORBIDDEN, "FORBIDDEN", "Access forbidden", true)
            }
            ErrorKind::Cors => attrs(StatusCode::FORBIDDEN, "CORS_ERROR", "Not allowed by CORS", true),
            ErrorKind::NotFound => {
                attrs(StatusCode::NOT_FOUND, "NOT_FOUND", "Resource not found", true)
            }
            ErrorKind::Conflict => attrs(StatusCode::CONFLICT, "CONFLICT", "Resource conflict", true),
            ErrorKind::TooManyRequests => attrs(
                StatusCode::TOO_MANY_REQUESTS,
                "TOO_MANY_REQUESTS",
                "Too many requests",
                true,
            ),
            ErrorKind::InternalServerError => attrs(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "Internal server error",
                false,
            ),
            ErrorKind::ServiceUnavailable => attrs(
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Service temporarily unavailable",
                true,
            ),
        }
    }

    /// HTTP status returned for this kind.
    pub const fn status(self) -> StatusCode {
        self.attrs().status
    }

    /// Stable machine-readable code.
    pub const fn code(self) -> &'static str {
        self.attrs().code
    }

    /// Message used when the caller does not supply one.
    pub const fn default_message(self) -> &'static str {
        self.attrs().default_message
    }

    /// Whether errors of this kind are expected (client-caused) by default.
    pub const fn is_operational_by_default(self) -> bool {
        self.attrs().operational
    }

    /// Type-style name used in log records, e.g. `NotFoundError`.
    pub const fn name(self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::BadRequest => "BadRequestError",
            ErrorKind::Unauthorized => "UnauthorizedError",
            ErrorKind::Forbidden => "ForbiddenError",
            ErrorKind::Cors => "CorsError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Conflict => "ConflictError",
            ErrorKind::TooManyRequests => "TooManyRequestsError",
            ErrorKind::InternalServerError => "InternalServerError",
            ErrorKind::ServiceUnavailable => "ServiceUnavailableError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An expected, classifiable failure with a fixed status and stable code.
///
/// Fields are private: the kind is fixed at construction, and with it the
/// status and code. `created_at` is stamped once and never changes.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct DomainError {
    kind: ErrorKind,
    message: String,
    created_at: DateTime<Utc>,
    operational: bool,
    details: Option<Value>,
    trace: Arc<Backtrace>,
}

impl DomainError {
    /// Create an error of `kind` with a caller-supplied message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            created_at: Utc::now(),
            operational: kind.is_operational_by_default(),
            details: None,
            trace: Arc::new(Backtrace::capture()),
        }
    }

    /// Create an error of `kind` carrying the kind's default message.
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind, kind.default_message())
    }

    pub fn validation(message: impl Into<String>, details: Option<Value>) -> Self {
        let error = Self::new(ErrorKind::Validation, message);
        match details {
            Some(details) => error.with_details(details),
            None => error,
        }
    }

    /// `"{resource} not found"`, or `"{resource} with identifier '{id}' not found"`.
    pub fn not_found(resource: &str, identifier: Option<&str>) -> Self {
        let message = match identifier {
            Some(id) => format!("{resource} with identifier '{id}' not found"),
            None => format!("{resource} not found"),
        };
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn unauthorized() -> Self {
        Self::from_kind(ErrorKind::Unauthorized)
    }

    pub fn forbidden() -> Self {
        Self::from_kind(ErrorKind::Forbidden)
    }

    pub fn cors(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cors, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TooManyRequests, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalServerError, message)
    }

    pub fn service_unavailable() -> Self {
        Self::from_kind(ErrorKind::ServiceUnavailable)
    }

    /// Attach an opaque structured payload.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Override the kind's default operational flag.
    pub fn with_operational(mut self, operational: bool) -> Self {
        self.operational = operational;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// `"{Name}: {message}"` followed by the construction-site backtrace
    /// when backtraces are enabled.
    pub fn stack(&self) -> String {
        super::failure::render_stack(
            format!("{}: {}", self.kind.name(), self.message),
            &self.trace,
        )
    }

    /// Structured representation for log sinks.
    pub fn to_log_record(&self) -> Value {
        json!({
            "name": self.kind.name(),
            "message": self.message,
            "code": self.code(),
            "statusCode": self.status().as_u16(),
            "timestamp": self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "isOperational": self.operational,
        })
    }
}

impl From<ErrorKind> for DomainError {
    fn from(kind: ErrorKind) -> Self {
        Self::from_kind(kind)
    }
}
