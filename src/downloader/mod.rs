//! Core downloader implementation split into focused submodules.
//!
//! The `PhotoDownloader` struct and its methods are organized by domain:
//! - [`submit`] - Request intake, previews and user lookup
//! - [`job_task`] - Background job execution
//! - [`control`] - Subscription, cancellation and retrieval
//! - [`lifecycle`] - Shutdown coordination
//! - [`services`] - Background service starters

mod control;
mod job_task;
mod lifecycle;
mod services;
mod submit;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::archive::{ArchivePackager, ZipPackager};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::metadata::{MetadataEmbedder, XmpSidecarEmbedder};
use crate::plan::PlanBuilder;
use crate::rate_limiter::RequestLimiter;
use crate::registry::JobRegistry;
use crate::source::{FlickrSource, PhotoSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Pluggable collaborators of the job runner
#[derive(Clone)]
pub(crate) struct Components {
    /// Where photos and listings come from
    pub(crate) source: Arc<dyn PhotoSource>,
    /// Attaches metadata to fetched JPEGs (trait object for pluggable implementations)
    pub(crate) embedder: Arc<dyn MetadataEmbedder>,
    /// Packages finished jobs
    pub(crate) packager: Arc<dyn ArchivePackager>,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct PhotoDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Every job known to this process
    pub(crate) registry: Arc<JobRegistry>,
    /// Source, embedder and packager
    pub(crate) components: Components,
    /// Request pacing shared by all jobs and plan building
    pub(crate) limiter: RequestLimiter,
    /// Resolves requests into work plans
    pub(crate) planner: PlanBuilder,
    /// Flag to indicate whether new jobs are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl PhotoDownloader {
    /// Create a downloader talking to Flickr
    ///
    /// Uses [`FlickrSource`], [`XmpSidecarEmbedder`] and [`ZipPackager`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid settings or a missing API key, and
    /// [`Error::Io`] when the work directory cannot be created.
    pub async fn new(config: Config) -> Result<Self> {
        let source = FlickrSource::new(&config.flickr)?;
        Self::with_components(
            config,
            Arc::new(source),
            Arc::new(XmpSidecarEmbedder),
            Arc::new(ZipPackager),
        )
        .await
    }

    /// Create a downloader with custom collaborators
    ///
    /// This is how tests and embedders swap the photo source or packaging.
    pub async fn with_components(
        config: Config,
        source: Arc<dyn PhotoSource>,
        embedder: Arc<dyn MetadataEmbedder>,
        packager: Arc<dyn ArchivePackager>,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.work_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create work directory '{}': {}",
                        config.download.work_dir.display(),
                        e
                    ),
                ))
            })?;

        let limiter = RequestLimiter::new(config.download.requests_per_second);
        let planner = PlanBuilder::new(Arc::clone(&source), config.retry.clone(), limiter.clone());
        let registry = Arc::new(JobRegistry::new(config.download.max_concurrent_jobs));

        tracing::info!(
            source = source.name(),
            embedder = embedder.name(),
            packager = packager.name(),
            max_concurrent_jobs = config.download.max_concurrent_jobs,
            workers = config.download.workers,
            "Photo downloader initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            registry,
            components: Components {
                source,
                embedder,
                packager,
            },
            limiter,
            planner,
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Current shared request rate (None = unlimited)
    pub fn request_rate(&self) -> Option<u32> {
        self.limiter.get_limit()
    }

    /// Change the shared request rate at runtime (None = unlimited)
    pub fn set_request_rate(&self, per_second: Option<u32>) {
        self.limiter.set_limit(per_second);
        tracing::info!(?per_second, "request rate updated");
    }

    pub(crate) fn ensure_accepting(&self) -> Result<()> {
        if self.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }
}
