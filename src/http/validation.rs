//! Request validation.
//!
//! [`ValidatedJson`], [`ValidatedQuery`] and [`ValidatedPath`] deserialize a
//! request part and run its `validator` rules. Any problem becomes a
//! `Validation` domain error whose details are [`FieldErrors`]:
//! `{ "formErrors": [...], "fieldErrors": { "field": [...] } }`.

use std::borrow::Cow;
use std::collections::BTreeMap;

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::{DomainError, Failure};

/// Key `validator` files struct-level (schema) errors under.
const FORM_ERRORS_KEY: &str = "__all__";

/// Collected validation problems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldErrors {
    pub form_errors: Vec<String>,
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    /// Problem not tied to one field (e.g. malformed body).
    pub fn form(message: impl Into<String>) -> Self {
        Self {
            form_errors: vec![message.into()],
            ..Self::default()
        }
    }

    fn collect(&mut self, prefix: Option<&str>, errors: &ValidationErrors) {
        for (field, kind) in errors.errors() {
            let field = field.to_string();
            let path = match prefix {
                Some(prefix) => format!("{prefix}.{field}"),
                None => field.clone(),
            };
            match kind {
                ValidationErrorsKind::Field(errors) if prefix.is_none() && field == FORM_ERRORS_KEY => {
                    self.form_errors.extend(errors.iter().map(error_message));
                }
                ValidationErrorsKind::Field(errors) => self
                    .field_errors
                    .entry(path)
                    .or_default()
                    .extend(errors.iter().map(error_message)),
                ValidationErrorsKind::Struct(nested) => self.collect(Some(&path), nested),
                ValidationErrorsKind::List(items) => {
                    for (index, nested) in items {
                        self.collect(Some(&format!("{path}.{index}")), nested);
                    }
                }
            }
        }
    }

    fn into_failure(self, message: &str) -> Failure {
        let details = serde_json::to_value(&self).unwrap_or(Value::Null);
        DomainError::validation(message, Some(details)).into()
    }
}

impl From<&ValidationErrors> for FieldErrors {
    fn from(errors: &ValidationErrors) -> Self {
        let mut flattened = Self::default();
        flattened.collect(None, errors);
        flattened
    }
}

fn error_message(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => format!("Invalid value ({})", error.code),
    }
}

fn check<T: Validate>(value: &T, message: &str) -> Result<(), Failure> {
    value
        .validate()
        .map_err(|errors| FieldErrors::from(&errors).into_failure(message))
}

/// JSON body that deserialized and passed its `validator` rules.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Failure;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        const MESSAGE: &str = "Invalid request body";
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| FieldErrors::form(rejection.body_text()).into_failure(MESSAGE))?;
        check(&value, MESSAGE)?;
        Ok(Self(value))
    }
}

/// Query string that deserialized and passed its `validator` rules.
#[derive(Debug, Clone)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        const MESSAGE: &str = "Invalid query params";
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| FieldErrors::form(rejection.body_text()).into_failure(MESSAGE))?;
        check(&value, MESSAGE)?;
        Ok(Self(value))
    }
}

/// Path parameters that deserialized and passed their `validator` rules.
#[derive(Debug, Clone)]
pub struct ValidatedPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedPath<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        const MESSAGE: &str = "Invalid request params";
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| FieldErrors::form(rejection.body_text()).into_failure(MESSAGE))?;
        check(&value, MESSAGE)?;
        Ok(Self(value))
    }
}

fn rule(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

/// Largest page size a client may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

/// `?page=&limit=&orderBy=&order=`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "Number must be greater than 0"))]
    pub page: u32,
    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,
    pub order_by: Option<String>,
    #[serde(default)]
    pub order: SortOrder,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            order_by: None,
            order: SortOrder::default(),
        }
    }
}

impl PaginationQuery {
    /// Number of rows to skip for this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

fn validate_limit(limit: u32) -> Result<(), ValidationError> {
    match limit {
        0 => Err(rule("range", "Number must be greater than 0")),
        limit if limit > MAX_PAGE_LIMIT => Err(rule(
            "range",
            format!("Number must be less than or equal to {MAX_PAGE_LIMIT}"),
        )),
        _ => Ok(()),
    }
}

/// `/:id` where `id` must be a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
pub struct IdParam {
    #[validate(custom(function = "validate_uuid"))]
    pub id: String,
}

fn validate_uuid(value: &str) -> Result<(), ValidationError> {
    Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| rule("uuid", "Invalid ID format"))
}

/// Character-class rules for passwords. Pair with `length(min = 8)`:
/// `#[validate(length(min = 8), custom(function = "validate_password"))]`.
/// Reports the first class that is missing.
pub fn validate_password(value: &str) -> Result<(), ValidationError> {
    if !value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(rule(
            "password",
            "Password must contain at least one uppercase letter",
        ));
    }
    if !value.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(rule(
            "password",
            "Password must contain at least one lowercase letter",
        ));
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return Err(rule("password", "Password must contain at least one number"));
    }
    if value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(rule(
            "password",
            "Password must contain at least one special character",
        ));
    }
    Ok(())
}
