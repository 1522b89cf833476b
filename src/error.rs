//! Error types for flickr-dl
//!
//! This module provides error handling for the library, including:
//! - The job-level taxonomy (invalid request, source outage, job failure, retrieval errors)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use crate::source::SourceError;
use crate::types::{JobId, JobState};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for flickr-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for flickr-dl
#[derive(Debug, Error)]
pub enum Error {
    /// The download request is malformed or references something that does not exist.
    /// Surfaced immediately, the job never starts.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The photo source failed while the work plan was being built
    #[error("photo source unavailable: {0}")]
    SourceUnavailable(String),

    /// A single item could not be fetched (non-fatal to the job)
    #[error("failed to fetch photo {photo_id}: {reason}")]
    ItemFetchFailed {
        /// Identifier of the photo that failed
        photo_id: String,
        /// Why the fetch failed
        reason: String,
    },

    /// Plan-level or infrastructure failure while a job was running
    #[error("job failed: {0}")]
    JobFailed(String),

    /// The job was cancelled by the user
    #[error("job cancelled")]
    Cancelled,

    /// No job with this id is known
    #[error("job {0} not found")]
    JobNotFound(JobId),

    /// The job exists but has no archive to hand out yet
    #[error("job {id} is not ready (state: {state})")]
    NotReady {
        /// The job that was queried
        id: JobId,
        /// Its state at the time of the request
        state: JobState,
    },

    /// The job finished but its result has already been evicted
    #[error("result of job {0} has expired")]
    ResultExpired(JobId),

    /// Too many jobs are running at once
    #[error("too many concurrent downloads (limit {limit}), please wait")]
    TooManyJobs {
        /// The configured concurrency limit
        limit: usize,
    },

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.workers")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Archive packaging error
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<SourceError> for Error {
    fn from(error: SourceError) -> Self {
        Error::SourceUnavailable(error.to_string())
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "job_not_found",
///     "message": "job 3fa85f6457 not found",
///     "details": { "job_id": "3fa85f6457" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "job_not_found", "invalid_request")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::InvalidRequest(_) => 400,
            Error::Config { .. } => 400,

            // 404 / 410 - Retrieval-time lookups
            Error::JobNotFound(_) => 404,
            Error::ResultExpired(_) => 410,

            // 409 Conflict - Job not in a state that has a result
            Error::NotReady { .. } => 409,
            Error::Cancelled => 409,

            // 429 Too Many Requests
            Error::TooManyJobs { .. } => 429,

            // 502 Bad Gateway - Photo source errors
            Error::SourceUnavailable(_) => 502,
            Error::ItemFetchFailed { .. } => 502,
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,

            // 500 Internal Server Error - Server-side issues
            Error::JobFailed(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::Archive(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidRequest(_) => "invalid_request",
            Error::SourceUnavailable(_) => "source_unavailable",
            Error::ItemFetchFailed { .. } => "item_fetch_failed",
            Error::JobFailed(_) => "job_failed",
            Error::Cancelled => "cancelled",
            Error::JobNotFound(_) => "job_not_found",
            Error::NotReady { .. } => "not_ready",
            Error::ResultExpired(_) => "result_expired",
            Error::TooManyJobs { .. } => "too_many_jobs",
            Error::ShuttingDown => "shutting_down",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Archive(_) => "archive_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::JobNotFound(id) | Error::ResultExpired(id) => Some(serde_json::json!({
                "job_id": id,
            })),
            Error::NotReady { id, state } => Some(serde_json::json!({
                "job_id": id,
                "state": state,
            })),
            Error::TooManyJobs { limit } => Some(serde_json::json!({
                "limit": limit,
            })),
            Error::ItemFetchFailed { photo_id, .. } => Some(serde_json::json!({
                "photo_id": photo_id,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    /// Returns a vec of (Error, expected_status_code, expected_error_code) for
    /// every match arm in ToHttpStatus that can be built without I/O.
    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        let id = JobId::from("abc123def456");
        vec![
            (
                Error::InvalidRequest("count must be positive".into()),
                400,
                "invalid_request",
            ),
            (
                Error::Config {
                    message: "workers must be at least 1".into(),
                    key: Some("download.workers".into()),
                },
                400,
                "config_error",
            ),
            (Error::JobNotFound(id.clone()), 404, "job_not_found"),
            (Error::ResultExpired(id.clone()), 410, "result_expired"),
            (
                Error::NotReady {
                    id: id.clone(),
                    state: JobState::Running,
                },
                409,
                "not_ready",
            ),
            (Error::Cancelled, 409, "cancelled"),
            (Error::TooManyJobs { limit: 2 }, 429, "too_many_jobs"),
            (
                Error::SourceUnavailable("connection refused".into()),
                502,
                "source_unavailable",
            ),
            (
                Error::ItemFetchFailed {
                    photo_id: "5".into(),
                    reason: "404".into(),
                },
                502,
                "item_fetch_failed",
            ),
            (Error::ShuttingDown, 503, "shutting_down"),
            (Error::JobFailed("disk full".into()), 500, "job_failed"),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                500,
                "io_error",
            ),
            (
                Error::ApiServerError("bind failed".into()),
                500,
                "api_server_error",
            ),
            (Error::Other("unknown".into()), 500, "internal_error"),
        ]
    }

    #[test]
    fn every_variant_maps_to_expected_status_and_code() {
        for (error, status, code) in all_error_variants() {
            assert_eq!(error.status_code(), status, "status for {error:?}");
            assert_eq!(error.error_code(), code, "code for {error:?}");
        }
    }

    #[test]
    fn not_ready_carries_job_and_state_details() {
        let error = Error::NotReady {
            id: JobId::from("feedfacecafe"),
            state: JobState::Running,
        };
        let api_error: ApiError = error.into();

        assert_eq!(api_error.error.code, "not_ready");
        let details = api_error.error.details.unwrap();
        assert_eq!(details["job_id"], "feedfacecafe");
        assert_eq!(details["state"], "running");
    }

    #[test]
    fn too_many_jobs_reports_limit() {
        let api_error: ApiError = Error::TooManyJobs { limit: 2 }.into();
        assert!(api_error.error.message.contains("limit 2"));
        assert_eq!(api_error.error.details.unwrap()["limit"], 2);
    }

    #[test]
    fn source_errors_become_source_unavailable() {
        let error: Error = SourceError::Unavailable {
            status: 503,
            message: "maintenance".into(),
        }
        .into();
        assert!(matches!(error, Error::SourceUnavailable(_)));
        assert!(error.to_string().contains("maintenance"));
    }

    #[test]
    fn plain_errors_have_no_details() {
        let api_error: ApiError = Error::ShuttingDown.into();
        assert!(api_error.error.details.is_none());
    }
}
