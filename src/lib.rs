//! # flickr-dl
//!
//! Background jobs that download many Flickr photos at once and hand them back
//! as a single ZIP archive.
//!
//! A request (a day of the interestingness feed, a photo search, or a user's
//! photostream or album) is resolved into a work plan up front. A job then
//! fetches every planned photo at a shared, rate-limited pace, optionally
//! attaches title, description and tags as an XMP sidecar, and packages the
//! result. Progress is published as an ordered event stream that late
//! subscribers receive from the beginning, so a client can reconnect at any
//! time without missing anything.
//!
//! ## Quick Start
//!
//! ```no_run
//! use flickr_dl::{Config, DownloadRequest, DownloadTarget, PhotoDownloader};
//! use flickr_dl::types::{SortOrder, TagMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.flickr.api_key = Some("your-api-key".to_string());
//!
//!     let downloader = PhotoDownloader::new(config).await?;
//!
//!     let request = DownloadRequest::new(DownloadTarget::Search {
//!         text: "lighthouse".to_string(),
//!         tags: vec![],
//!         tag_mode: TagMode::Any,
//!         sort: SortOrder::Relevance,
//!         licenses: vec![],
//!         user_id: None,
//!     })
//!     .with_count(20);
//!     let job_id = downloader.submit(request).await?;
//!
//!     // Follow the job until it ends
//!     let mut events = downloader.subscribe(&job_id).await?;
//!     while let Some(event) = events.next().await {
//!         println!("Event: {:?}", event);
//!     }
//!
//!     let archive = downloader.retrieve(&job_id).await?;
//!     println!("Archive at {}", archive.path.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// ZIP packaging of finished jobs
pub mod archive;
/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Per-job state and cancellation
pub mod job;
/// Metadata embedding for fetched photos
pub mod metadata;
/// Resolution of requests into work plans
pub mod plan;
/// Replayable per-job event logs
pub mod progress;
/// Pacing of outgoing Flickr requests
pub mod rate_limiter;
/// Job registry with admission control and retention
pub mod registry;
/// Retry logic with exponential backoff
pub mod retry;
/// Photo sources (Flickr)
pub mod source;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use archive::{ArchivePackager, ArchiveRef, ZipPackager};
pub use config::Config;
pub use downloader::PhotoDownloader;
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use metadata::{MetadataEmbedder, NoOpEmbedder, PhotoMetadata, XmpSidecarEmbedder};
pub use progress::Subscription;
pub use source::{FlickrSource, PhotoSource, SourceError};
pub use types::{
    DownloadOptions, DownloadRequest, DownloadTarget, Event, JobId, JobInfo, JobState, PhotoSize,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal, then stops accepting jobs and cancels the
/// running ones via [`PhotoDownloader::shutdown`].
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use flickr_dl::{PhotoDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let downloader = PhotoDownloader::new(config).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: PhotoDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // registration can fail in restricted environments (containers, tests)
    let mut sigterm = signal(SignalKind::terminate())
        .inspect_err(|e| tracing::warn!(error = %e, "Could not register SIGTERM handler"))
        .ok();
    let mut sigint = signal(SignalKind::interrupt())
        .inspect_err(|e| tracing::warn!(error = %e, "Could not register SIGINT handler"))
        .ok();

    if sigterm.is_none() && sigint.is_none() {
        tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
        tokio::signal::ctrl_c().await.ok();
        return;
    }

    tokio::select! {
        Some(_) = async { sigterm.as_mut()?.recv().await } => {
            tracing::info!("Received SIGTERM signal");
        }
        Some(_) = async { sigint.as_mut()?.recv().await } => {
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        else => tracing::warn!("Signal streams closed"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
