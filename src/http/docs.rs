//! OpenAPI documentation.
//!
//! [`ApiDoc`] describes the routes under the API prefix plus the shared
//! response schemas. [`openapi`] points the document's server entry at the
//! configured host, port and prefix; Swagger UI serves it at `/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::ServerBuilder;
use utoipa::{Modify, OpenApi};

use crate::config::AppConfig;
use crate::health::{HealthStatus, ReadinessReport};
use crate::http::response::{ErrorBody, ErrorEnvelope, PaginationMeta};

pub const DOCS_PATH: &str = "/docs";
pub const DOCS_JSON_PATH: &str = "/docs/json";

/// Registers the `bearerAuth` JWT scheme.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&BearerAuth),
    info(
        title = "Storagie API",
        description = "Backend API for the Storagie",
        contact(
            name = "Storagie Team",
            email = "admin@storagie.com",
            url = "https://storagie.com"
        ),
        license(name = "ISC", url = "https://opensource.org/licenses/ISC")
    ),
    external_docs(url = "https://docs.storagie.com", description = "Find more info here"),
    paths(
        crate::health::handlers::health,
        crate::health::handlers::ready,
    ),
    components(schemas(HealthStatus, ReadinessReport, ErrorEnvelope, ErrorBody, PaginationMeta)),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "User management endpoints"),
        (name = "auth", description = "Authentication endpoints")
    )
)]
pub struct ApiDoc;

/// Document with the server URL for this deployment.
pub fn openapi(config: &AppConfig) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    let server = &config.server;
    let url = format!(
        "http://{}:{}{}",
        server.host,
        server.port,
        server.normalized_prefix()
    );
    doc.servers = Some(vec![ServerBuilder::new()
        .url(url)
        .description(Some(format!("{} server", capitalize(config.environment.as_str()))))
        .build()]);
    doc
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
