//! Job control: status, subscription, cancellation and archive retrieval.

use crate::archive::ArchiveRef;
use crate::error::{Error, Result};
use crate::progress::Subscription;
use crate::types::{JobId, JobInfo, JobState};
use chrono::Utc;

use super::PhotoDownloader;

impl PhotoDownloader {
    /// Observe a job's events, starting with everything already published
    ///
    /// # Errors
    ///
    /// [`Error::JobNotFound`] or [`Error::ResultExpired`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use flickr_dl::*;
    /// # async fn example(downloader: PhotoDownloader, id: JobId) -> Result<()> {
    /// let mut events = downloader.subscribe(&id).await?;
    /// while let Some(event) = events.next().await {
    ///     println!("{}: {:?}", event.kind(), event);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn subscribe(&self, id: &JobId) -> Result<Subscription> {
        Ok(self.registry.get(id).await?.subscribe())
    }

    /// Ask a job to stop
    ///
    /// Only sets the job's cancellation flag; the job task stops at the next
    /// item boundary and publishes `cancelled`. Cancelling an unknown, expired
    /// or already finished job does nothing.
    pub async fn cancel(&self, id: &JobId) -> Result<()> {
        match self.registry.request_cancel(id).await {
            Ok(true) => {
                tracing::info!(job_id = %id, "cancellation requested");
                Ok(())
            }
            Ok(false) => {
                tracing::debug!(job_id = %id, "cancel ignored, job already finished");
                Ok(())
            }
            Err(Error::JobNotFound(_) | Error::ResultExpired(_)) => {
                tracing::debug!(job_id = %id, "cancel ignored, unknown job");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Hand out the archive of a completed job
    ///
    /// The first retrieval starts the job's retention grace period.
    ///
    /// # Errors
    ///
    /// - [`Error::NotReady`] while the job runs, or when it failed or was cancelled
    /// - [`Error::JobNotFound`] / [`Error::ResultExpired`] for unknown or evicted jobs
    pub async fn retrieve(&self, id: &JobId) -> Result<ArchiveRef> {
        let job = self.registry.get(id).await?;

        match (job.state(), job.archive()) {
            (JobState::Completed, Some(archive)) => {
                if !tokio::fs::try_exists(&archive.path).await.unwrap_or(false) {
                    tracing::warn!(job_id = %id, path = %archive.path.display(), "archive missing on disk");
                    return Err(Error::ResultExpired(id.clone()));
                }
                job.mark_retrieved(Utc::now());
                tracing::info!(job_id = %id, size_bytes = archive.size_bytes, "archive retrieved");
                Ok(archive)
            }
            (state, _) => Err(Error::NotReady {
                id: id.clone(),
                state,
            }),
        }
    }

    /// Status snapshot of one job
    pub async fn job_info(&self, id: &JobId) -> Result<JobInfo> {
        Ok(self.registry.get(id).await?.info())
    }

    /// Status snapshots of every job, oldest first
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        self.registry
            .list()
            .await
            .iter()
            .map(|job| job.info())
            .collect()
    }

    /// Number of jobs currently running
    pub async fn active_jobs(&self) -> usize {
        self.registry.active_count().await
    }
}
