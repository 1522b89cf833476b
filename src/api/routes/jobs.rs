//! Job handlers.

use super::{CancelResponse, JobCreated};
use crate::api::AppState;
use crate::error::Error;
use crate::types::{DownloadRequest, JobId, JobInfo, Preview};
use crate::utils::archive_file_name;
use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use std::convert::Infallible;
use tokio_stream::StreamExt;

/// POST /jobs - Start a download job
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    tag = "jobs",
    request_body = DownloadRequest,
    responses(
        (status = 201, description = "Job started", body = JobCreated),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 429, description = "Too many running jobs", body = crate::error::ApiError),
        (status = 502, description = "Flickr unavailable", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<(StatusCode, Json<JobCreated>), Error> {
    let job_id = state.downloader.submit(request).await?;
    Ok((StatusCode::CREATED, Json(JobCreated { job_id })))
}

/// GET /jobs - List known jobs
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "jobs",
    responses(
        (status = 200, description = "All jobs still held", body = Vec<JobInfo>)
    )
)]
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobInfo>> {
    Json(state.downloader.list_jobs().await)
}

/// GET /jobs/:id - Get one job
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job details", body = JobInfo),
        (status = 404, description = "Job not found", body = crate::error::ApiError),
        (status = 410, description = "Job result expired", body = crate::error::ApiError)
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Json<JobInfo>, Error> {
    Ok(Json(state.downloader.job_info(&id).await?))
}

/// GET /jobs/:id/events - Server-sent progress stream of one job
///
/// Replays every event published so far, then follows the job live. The
/// stream closes after the terminal event.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}/events",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Event stream (text/event-stream)", content_type = "text/event-stream"),
        (status = 404, description = "Job not found", body = crate::error::ApiError),
        (status = 410, description = "Job result expired", body = crate::error::ApiError)
    )
)]
pub async fn job_events(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>>, Error> {
    let subscription = state.downloader.subscribe(&id).await?;

    let sse_stream = subscription
        .into_stream()
        .filter_map(move |event| match serde_json::to_string(&event) {
            Ok(json_data) => Some(Ok(SseEvent::default().event(event.kind()).data(json_data))),
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Failed to serialize event to JSON");
                None
            }
        });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

/// POST /jobs/:id/cancel - Request cancellation
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{id}/cancel",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Cancellation requested", body = CancelResponse)
    )
)]
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Json<CancelResponse>, Error> {
    state.downloader.cancel(&id).await?;
    Ok(Json(CancelResponse { ok: true }))
}

/// GET /jobs/:id/archive - Download the finished ZIP archive
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}/archive",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "ZIP archive", content_type = "application/zip"),
        (status = 404, description = "Job not found", body = crate::error::ApiError),
        (status = 409, description = "Job has no archive yet", body = crate::error::ApiError),
        (status = 410, description = "Archive expired", body = crate::error::ApiError)
    )
)]
pub async fn download_archive(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Response, Error> {
    let archive = state.downloader.retrieve(&id).await?;

    let bytes = match tokio::fs::read(&archive.path).await {
        Ok(bytes) => bytes,
        // swept between retrieve and read
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::ResultExpired(id));
        }
        Err(e) => return Err(e.into()),
    };

    let disposition = format!(
        "attachment; filename=\"{}\"",
        archive_file_name(id.as_str())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// POST /preview - Build the work plan without starting a job
#[utoipa::path(
    post,
    path = "/api/v1/preview",
    tag = "jobs",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Plan total and its first items", body = Preview),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 502, description = "Flickr unavailable", body = crate::error::ApiError)
    )
)]
pub async fn preview(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<Json<Preview>, Error> {
    Ok(Json(state.downloader.preview(request).await?))
}
