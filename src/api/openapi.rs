//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the flickr-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the flickr-dl REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "flickr-dl REST API",
        version = "0.1.0",
        description = "Background jobs that download many Flickr photos into one ZIP archive, with live progress over server-sent events",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5000/api/v1", description = "Local development server")
    ),
    paths(
        // Jobs
        crate::api::routes::submit_job,
        crate::api::routes::list_jobs,
        crate::api::routes::get_job,
        crate::api::routes::job_events,
        crate::api::routes::cancel_job,
        crate::api::routes::download_archive,
        crate::api::routes::preview,

        // Users
        crate::api::routes::resolve_user,

        // Configuration
        crate::api::routes::get_config,
        crate::api::routes::get_request_rate,
        crate::api::routes::set_request_rate,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::JobId,
        crate::types::JobState,
        crate::types::JobInfo,
        crate::types::Event,
        crate::types::PhotoSize,
        crate::types::TagMode,
        crate::types::SortOrder,
        crate::types::AlbumSelection,
        crate::types::DownloadTarget,
        crate::types::DownloadOptions,
        crate::types::DownloadRequest,
        crate::types::Preview,
        crate::types::PreviewItem,
        crate::types::UserAlbums,
        crate::source::Album,

        // Config types from config.rs
        crate::config::Config,
        crate::config::DownloadConfig,
        crate::config::RetryConfig,
        crate::config::RetentionConfig,
        crate::config::FlickrConfig,
        crate::config::ServerIntegrationConfig,
        crate::config::ApiConfig,
        crate::config::RateLimitConfig,

        // API request/response types from routes
        crate::api::routes::JobCreated,
        crate::api::routes::CancelResponse,
        crate::api::routes::ResolveUserRequest,
        crate::api::routes::RequestRate,
        crate::api::routes::Health,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "jobs", description = "Download jobs - Submit, follow, cancel and collect archives"),
        (name = "users", description = "Users - Resolve Flickr users and list their albums"),
        (name = "config", description = "Configuration - Inspect settings and adjust request pacing"),
        (name = "system", description = "System endpoints - Health checks and OpenAPI spec"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security addon to add API key authentication scheme to OpenAPI spec
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "api_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-Api-Key"),
                    ),
                ),
            );
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_lists_job_paths() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&str> = spec.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/api/v1/jobs",
            "/api/v1/jobs/{id}",
            "/api/v1/jobs/{id}/events",
            "/api/v1/jobs/{id}/cancel",
            "/api/v1/jobs/{id}/archive",
            "/api/v1/preview",
            "/api/v1/users/resolve",
            "/api/v1/health",
        ] {
            assert!(paths.contains(&expected), "missing path {expected}");
        }
    }

    #[test]
    fn test_openapi_spec_has_schemas_and_tags() {
        let spec = ApiDoc::openapi();

        let components = spec.components.unwrap();
        assert!(components.schemas.contains_key("DownloadRequest"));
        assert!(components.schemas.contains_key("Event"));
        assert!(components.security_schemes.contains_key("api_key"));

        let tags = spec.tags.unwrap();
        let tag_names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tag_names, vec!["jobs", "users", "config", "system"]);
    }

    #[test]
    fn test_openapi_spec_info() {
        let spec = ApiDoc::openapi();

        assert_eq!(spec.info.title, "flickr-dl REST API");
        assert!(spec.info.description.is_some());

        let json = serde_json::to_value(&spec).expect("Should serialize to JSON");
        let version = json.get("openapi").and_then(|v| v.as_str()).unwrap();
        assert!(version.starts_with("3."), "Should use OpenAPI 3.x version");
    }
}
