//! Liveness and API description.

use super::Health;
use crate::api::AppState;
use axum::{Json, extract::State};

/// GET /health - Liveness plus a summary of job activity
///
/// Always answers 200 while the process serves requests; `status` turns to
/// `shutting_down` once new jobs are refused.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "system",
    responses(
        (status = 200, description = "Server is up", body = Health)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<Health> {
    let accepting_jobs = state.downloader.is_accepting();
    Json(Health {
        status: if accepting_jobs { "ok" } else { "shutting_down" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        accepting_jobs,
        running_jobs: state.downloader.active_jobs().await,
        requests_per_second: state.downloader.request_rate(),
    })
}

/// GET /openapi.json - Generated OpenAPI document
#[utoipa::path(
    get,
    path = "/api/v1/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI document for this server")
    )
)]
pub async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}
