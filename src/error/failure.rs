//! Raised failures.
//!
//! A handler or middleware that cannot produce a response returns a
//! [`Failure`]. Turning it into a response only sets the status and parks the
//! failure in the response extensions; the error normalizer picks it up from
//! there and writes the canonical body.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::taxonomy::DomainError;

/// Code reported for framework errors that carry no code of their own.
pub const FRAMEWORK_ERROR: &str = "FRAMEWORK_ERROR";

/// Any failure raised while handling a request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Failure {
    /// Expected, classified failure.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Failure raised by the HTTP stack itself (extractor rejections,
    /// timeouts, body limits).
    #[error(transparent)]
    Framework(#[from] FrameworkError),

    /// Anything else: boxed errors bubbling out of handlers, panics.
    #[error(transparent)]
    Unexpected(#[from] UnexpectedError),
}

impl Failure {
    /// Wrap an arbitrary error as an unexpected failure.
    pub fn unexpected<E>(error: E) -> Self
    where
        E: StdError + 'static,
    {
        Failure::Unexpected(UnexpectedError::from_error(&error))
    }

    /// Status the failure maps to before normalization.
    pub fn status(&self) -> StatusCode {
        match self {
            Failure::Domain(e) => e.status(),
            Failure::Framework(e) => e.status(),
            Failure::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<Box<dyn StdError + Send + Sync>> for Failure {
    fn from(error: Box<dyn StdError + Send + Sync>) -> Self {
        Failure::Unexpected(UnexpectedError::from_error(error.as_ref()))
    }
}

impl From<JsonRejection> for Failure {
    fn from(rejection: JsonRejection) -> Self {
        Failure::Framework(rejection.into())
    }
}

impl From<QueryRejection> for Failure {
    fn from(rejection: QueryRejection) -> Self {
        Failure::Framework(rejection.into())
    }
}

impl From<PathRejection> for Failure {
    fn from(rejection: PathRejection) -> Self {
        Failure::Framework(rejection.into())
    }
}

/// A failure that carries a transport-level status.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct FrameworkError {
    status: StatusCode,
    code: Option<String>,
    message: String,
}

impl FrameworkError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The error's own code, or [`FRAMEWORK_ERROR`].
    pub fn code(&self) -> &str {
        self.code.as_deref().unwrap_or(FRAMEWORK_ERROR)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack(&self) -> String {
        format!("FrameworkError [{}]: {}", self.code(), self.message)
    }
}

impl From<JsonRejection> for FrameworkError {
    fn from(rejection: JsonRejection) -> Self {
        let code = match &rejection {
            JsonRejection::JsonDataError(_) => "JSON_DATA_ERROR",
            JsonRejection::JsonSyntaxError(_) => "JSON_SYNTAX_ERROR",
            JsonRejection::MissingJsonContentType(_) => "UNSUPPORTED_MEDIA_TYPE",
            JsonRejection::BytesRejection(_) => "BODY_READ_ERROR",
            _ => FRAMEWORK_ERROR,
        };
        Self::new(rejection.status(), rejection.body_text()).with_code(code)
    }
}

impl From<QueryRejection> for FrameworkError {
    fn from(rejection: QueryRejection) -> Self {
        let code = match &rejection {
            QueryRejection::FailedToDeserializeQueryString(_) => "INVALID_QUERY_STRING",
            _ => FRAMEWORK_ERROR,
        };
        Self::new(rejection.status(), rejection.body_text()).with_code(code)
    }
}

impl From<PathRejection> for FrameworkError {
    fn from(rejection: PathRejection) -> Self {
        let code = match &rejection {
            PathRejection::FailedToDeserializePathParams(_) => "INVALID_PATH_PARAMS",
            PathRejection::MissingPathParams(_) => "MISSING_PATH_PARAMS",
            _ => FRAMEWORK_ERROR,
        };
        Self::new(rejection.status(), rejection.body_text()).with_code(code)
    }
}

/// An unclassified failure. Its message and stack are internal details.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct UnexpectedError {
    message: String,
    stack: String,
}

impl UnexpectedError {
    /// Capture an error, its `source()` chain and, when enabled, a backtrace.
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut header = format!("Error: {error}");
        let mut source = error.source();
        while let Some(cause) = source {
            header.push_str(&format!("\n    caused by: {cause}"));
            source = cause.source();
        }

        Self {
            message: error.to_string(),
            stack: render_stack(header, &Backtrace::capture()),
        }
    }

    /// Capture a panic payload caught by the HTTP stack.
    pub fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else {
            "handler panicked".to_string()
        };

        Self {
            stack: format!("panic: {message}"),
            message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }
}

pub(crate) fn render_stack(header: String, trace: &Backtrace) -> String {
    if trace.status() == BacktraceStatus::Captured {
        format!("{header}\n{trace}")
    } else {
        header
    }
}
