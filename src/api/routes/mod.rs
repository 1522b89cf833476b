//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`] — Job submission, status, progress stream, cancellation and archives
//! - [`users`] — Flickr user lookup
//! - [`config`] — Configuration and request pacing
//! - [`system`] — Health and OpenAPI

use crate::types::JobId;
use serde::{Deserialize, Serialize};

mod config;
mod jobs;
mod system;
mod users;

// Re-export all handlers so `routes::function_name` continues to work
pub use config::*;
pub use jobs::*;
pub use system::*;
pub use users::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Response for POST /jobs
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct JobCreated {
    /// Id of the started job
    pub job_id: JobId,
}

/// Response for POST /jobs/:id/cancel
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CancelResponse {
    /// Always true; cancelling an unknown or finished job is a no-op
    pub ok: bool,
}

/// Request body for POST /users/resolve
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ResolveUserRequest {
    /// Username, profile URL or NSID
    pub username: String,
}

/// Body of PUT /config/request-rate and response of GET /config/request-rate
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct RequestRate {
    /// Requests per second to Flickr across all jobs. Use null for unlimited.
    pub requests_per_second: Option<u32>,
}

/// Response for GET /health
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct Health {
    /// `ok`, or `shutting_down` once new jobs are refused
    pub status: String,
    /// Crate version
    pub version: String,
    /// Whether POST /jobs is currently accepted
    pub accepting_jobs: bool,
    /// Jobs that have not reached a terminal state
    pub running_jobs: usize,
    /// Current Flickr request pacing; null means unlimited
    pub requests_per_second: Option<u32>,
}
