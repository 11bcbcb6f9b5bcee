//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (add request ID, request context)
//!     → handler (health, docs) via validation.rs / extract.rs extractors
//!     → errors.rs (failures normalized into the error envelope)
//!     → response.rs (envelopes)
//!     → Send to client
//! ```

pub mod docs;
pub mod errors;
pub mod extract;
pub mod request;
pub mod response;
pub mod server;
pub mod validation;

pub use extract::{JsonBody, QueryParams, RouteParams};
pub use request::{RequestContext, RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use response::{ApiResponse, ErrorBody, ErrorEnvelope, Paginated, PaginationMeta};
pub use server::{AppState, HttpServer, ServerError};
pub use validation::{FieldErrors, ValidatedJson, ValidatedPath, ValidatedQuery};
