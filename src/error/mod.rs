//! Error subsystem.
//!
//! # Data Flow
//! ```text
//! handler / middleware
//!     → taxonomy.rs (DomainError: kind → status, code)
//!     → failure.rs (Failure: domain | framework | unexpected)
//!     → http::errors (single normalizer: log, redact, envelope)
//!     → client
//! ```

pub mod failure;
pub mod taxonomy;

pub use failure::{Failure, FrameworkError, UnexpectedError, FRAMEWORK_ERROR};
pub use taxonomy::{DomainError, ErrorKind};
