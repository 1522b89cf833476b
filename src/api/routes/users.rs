//! User lookup handlers.

use super::ResolveUserRequest;
use crate::api::AppState;
use crate::error::Error;
use crate::types::UserAlbums;
use axum::{Json, extract::State};

/// POST /users/resolve - Resolve a username and list its albums
#[utoipa::path(
    post,
    path = "/api/v1/users/resolve",
    tag = "users",
    request_body = ResolveUserRequest,
    responses(
        (status = 200, description = "User and their albums", body = UserAlbums),
        (status = 400, description = "Unknown or empty username", body = crate::error::ApiError),
        (status = 502, description = "Flickr unavailable", body = crate::error::ApiError)
    )
)]
pub async fn resolve_user(
    State(state): State<AppState>,
    Json(request): Json<ResolveUserRequest>,
) -> Result<Json<UserAlbums>, Error> {
    Ok(Json(state.downloader.resolve_user(&request.username).await?))
}
