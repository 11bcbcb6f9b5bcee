//! Security response headers.
//!
//! Every response gets a fixed hardening set; `content-security-policy` and
//! `cross-origin-embedder-policy` are added outside development only. Headers
//! a handler already set are left alone.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::config::Environment;

pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self';style-src 'self' 'unsafe-inline';\
script-src 'self' 'unsafe-inline';img-src 'self' data: https:;font-src 'self' https: data:";

const BASELINE: [(&str, &str); 11] = [
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Header set applied to responses.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn for_environment(environment: Environment) -> Self {
        let mut pairs: Vec<(&'static str, &'static str)> = BASELINE.to_vec();
        if environment != Environment::Development {
            pairs.push(("content-security-policy", CONTENT_SECURITY_POLICY));
            pairs.push(("cross-origin-embedder-policy", "require-corp"));
        }

        let headers = pairs
            .into_iter()
            .map(|(name, value)| {
                (
                    HeaderName::from_static(name),
                    HeaderValue::from_static(value),
                )
            })
            .collect();
        Self { headers }
    }

    fn apply(&self, response: &mut Response) {
        let target = response.headers_mut();
        for (name, value) in &self.headers {
            if !target.contains_key(name) {
                target.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Middleware adding [`SecurityHeaders`] to every response.
pub async fn apply_security_headers(
    State(headers): State<Arc<SecurityHeaders>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    headers.apply(&mut response);
    response
}
