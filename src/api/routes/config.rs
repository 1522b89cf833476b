//! Configuration handlers.

use super::RequestRate;
use crate::api::AppState;
use crate::config::Config;
use crate::error::Error;
use axum::{Json, extract::State};

const REDACTED: &str = "***REDACTED***";

/// GET /config - Get current config (secrets redacted)
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Current configuration", body = Config)
    )
)]
pub async fn get_config(State(state): State<AppState>) -> Json<Config> {
    let mut config = (*state.config).clone();

    if config.flickr.api_key.is_some() {
        config.flickr.api_key = Some(REDACTED.to_string());
    }
    if config.server.api.api_key.is_some() {
        config.server.api.api_key = Some(REDACTED.to_string());
    }

    // reflect runtime changes to the request rate
    config.download.requests_per_second = state.downloader.request_rate();
    Json(config)
}

/// GET /config/request-rate - Get the shared Flickr request rate
#[utoipa::path(
    get,
    path = "/api/v1/config/request-rate",
    tag = "config",
    responses(
        (status = 200, description = "Current request rate", body = RequestRate)
    )
)]
pub async fn get_request_rate(State(state): State<AppState>) -> Json<RequestRate> {
    Json(RequestRate {
        requests_per_second: state.downloader.request_rate(),
    })
}

/// PUT /config/request-rate - Change the shared Flickr request rate
#[utoipa::path(
    put,
    path = "/api/v1/config/request-rate",
    tag = "config",
    request_body = RequestRate,
    responses(
        (status = 200, description = "Request rate updated", body = RequestRate),
        (status = 400, description = "Rate of zero", body = crate::error::ApiError)
    )
)]
pub async fn set_request_rate(
    State(state): State<AppState>,
    Json(request): Json<RequestRate>,
) -> Result<Json<RequestRate>, Error> {
    if request.requests_per_second == Some(0) {
        return Err(Error::InvalidRequest(
            "requests_per_second must be at least 1; use null for unlimited".into(),
        ));
    }

    state.downloader.set_request_rate(request.requests_per_second);
    Ok(Json(RequestRate {
        requests_per_second: state.downloader.request_rate(),
    }))
}
