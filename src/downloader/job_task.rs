//! Background job execution.
//!
//! One task per job walks the work plan in order, fetches each photo through the
//! shared request limiter with retries, attaches metadata, and finally packages
//! everything that was fetched. Only this task writes to the job.

use crate::error::{Error, Result};
use crate::job::Job;
use crate::plan::{WorkItem, WorkPlan};
use crate::registry::remove_quietly;
use crate::retry::{IsRetryable, retry_until_cancelled};
use crate::source::SourceError;
use crate::types::{Event, JobId};
use crate::utils::{archive_path, is_jpeg, staging_dir};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::PhotoDownloader;

/// Result of processing one work item
enum ItemOutcome {
    /// The photo is on disk; `files` are the entries to package
    Saved {
        files: Vec<PathBuf>,
        embed_error: Option<String>,
    },
    /// The photo could not be fetched
    Failed { reason: String, retryable: bool },
    /// Cancellation arrived before the fetch was attempted
    Abandoned,
}

/// How the item loop ended
enum LoopEnd {
    Finished {
        files: Vec<PathBuf>,
        succeeded: usize,
        failed: usize,
    },
    Cancelled,
}

/// Fetch failure, or cancellation while waiting to fetch
#[derive(Debug)]
enum FetchError {
    Source(SourceError),
    Cancelled,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Source(e) => e.fmt(f),
            FetchError::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Source(e) if e.is_retryable())
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            FetchError::Source(e) => e.retry_after(),
            FetchError::Cancelled => None,
        }
    }
}

impl PhotoDownloader {
    /// Start a job for an already built plan
    ///
    /// Returns as soon as the job is registered; the work happens in a background
    /// task. Fails only when too many jobs are running or during shutdown.
    pub async fn start(&self, plan: WorkPlan) -> Result<JobId> {
        self.ensure_accepting()?;

        let id = JobId::generate();
        let staging = staging_dir(&self.config.download.work_dir, id.as_str());
        let job = Arc::new(Job::new(id.clone(), plan.label.clone(), plan.total(), staging));
        self.registry.register(Arc::clone(&job)).await?;

        tracing::info!(job_id = %id, label = %plan.label, total = plan.total(), "job started");

        let downloader = self.clone();
        tokio::spawn(async move {
            downloader.run_job(job, plan).await;
        });

        Ok(id)
    }

    /// Drive a job to its terminal state
    async fn run_job(&self, job: Arc<Job>, plan: WorkPlan) {
        let job_id = job.id().clone();

        let (files, succeeded, failed) = match self.process_items(&job, &plan).await {
            Ok(LoopEnd::Finished {
                files,
                succeeded,
                failed,
            }) => (files, succeeded, failed),
            Ok(LoopEnd::Cancelled) => {
                job.mark_cancelled();
                tracing::info!(job_id = %job_id, current = job.current(), "job cancelled");
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "job failed");
                job.fail(e.to_string());
                return;
            }
        };

        // a cancel that arrived during the last item still wins over packaging
        if job.is_cancel_requested() {
            job.mark_cancelled();
            tracing::info!(job_id = %job_id, "job cancelled before packaging");
            return;
        }

        job.publish(Event::Zipping);
        let dest = archive_path(&self.config.download.work_dir, job_id.as_str());

        match self.components.packager.package(&files, &dest).await {
            Ok(archive) => {
                // the archive holds everything now
                remove_quietly(job.staging_dir(), true).await;
                let message = format!("Downloaded {succeeded}, failed {failed}.");
                tracing::info!(
                    job_id = %job_id,
                    succeeded,
                    failed,
                    size_bytes = archive.size_bytes,
                    "job completed"
                );
                job.complete(archive, message);
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "packaging failed");
                job.fail(format!("Packaging failed: {e}"));
            }
        }
    }

    /// Fetch every item in plan order, emitting progress from this single loop
    async fn process_items(&self, job: &Job, plan: &WorkPlan) -> Result<LoopEnd> {
        let staging = job.staging_dir().to_path_buf();
        tokio::fs::create_dir_all(&staging).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create staging directory '{}': {}",
                    staging.display(),
                    e
                ),
            ))
        })?;

        let cancel = job.cancel_token();
        let workers = self.config.download.workers.max(1);
        let threshold = self.config.download.outage_threshold;

        let staging = staging.as_path();
        let cancel = &cancel;
        let embed_metadata = plan.embed_metadata;
        let mut outcomes = futures::stream::iter(0..plan.items.len())
            .map(|index| {
                let item = &plan.items[index];
                async move {
                    let outcome = self
                        .process_item(staging, item, embed_metadata, cancel)
                        .await;
                    (index, outcome)
                }
            })
            .buffered(workers);

        let mut files = Vec::new();
        let mut succeeded = 0;
        let mut failed = 0;
        // consecutive retryable failures from the start of the plan; None once broken
        let mut outage_streak = Some(0usize);

        loop {
            if cancel.is_cancelled() {
                return Ok(LoopEnd::Cancelled);
            }
            let Some((index, outcome)) = outcomes.next().await else {
                break;
            };
            let item = &plan.items[index];

            match outcome? {
                ItemOutcome::Abandoned => return Ok(LoopEnd::Cancelled),
                ItemOutcome::Saved {
                    files: saved,
                    embed_error,
                } => {
                    succeeded += 1;
                    outage_streak = None;
                    files.extend(saved);
                    if let Some(reason) = embed_error {
                        job.publish(Event::Log {
                            message: format!(
                                "Could not add metadata to {}: {reason}",
                                item.filename
                            ),
                        });
                    }
                }
                ItemOutcome::Failed { reason, retryable } => {
                    failed += 1;
                    tracing::warn!(
                        job_id = %job.id(),
                        photo_id = %item.photo_id,
                        error = %reason,
                        "photo fetch failed"
                    );
                    job.publish(Event::Log {
                        message: format!("Failed to download {}: {reason}", item.photo_id),
                    });
                    outage_streak = outage_streak.filter(|_| retryable).map(|n| n + 1);
                }
            }

            let current = job.advance();
            job.publish(Event::Progress {
                current,
                total: job.total(),
            });

            if threshold > 0 && outage_streak.is_some_and(|n| n >= threshold) {
                return Err(Error::SourceUnavailable(format!(
                    "the first {threshold} photos all failed, giving up"
                )));
            }
        }

        Ok(LoopEnd::Finished {
            files,
            succeeded,
            failed,
        })
    }

    /// Fetch, store and annotate one photo
    ///
    /// Only staging I/O errors are returned as `Err`; they fail the whole job.
    async fn process_item(
        &self,
        staging: &Path,
        item: &WorkItem,
        embed_metadata: bool,
        cancel: &CancellationToken,
    ) -> Result<ItemOutcome> {
        let Some(url) = item.url.as_deref() else {
            return Ok(ItemOutcome::Failed {
                reason: "no downloadable size".into(),
                retryable: false,
            });
        };

        let bytes = match self.fetch(url, cancel).await {
            Ok(bytes) => bytes,
            Err(FetchError::Cancelled) => return Ok(ItemOutcome::Abandoned),
            Err(FetchError::Source(e)) => {
                return Ok(ItemOutcome::Failed {
                    reason: e.to_string(),
                    retryable: e.is_retryable(),
                });
            }
        };

        let path = staging.join(&item.filename);
        tokio::fs::write(&path, &bytes).await?;
        tracing::debug!(photo_id = %item.photo_id, bytes = bytes.len(), "photo saved");

        let mut files = vec![path.clone()];
        let mut embed_error = None;

        if embed_metadata && is_jpeg(&path) {
            match self
                .components
                .embedder
                .embed(&path, &item.metadata())
                .await
            {
                Ok(Some(sidecar)) => files.push(sidecar),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(photo_id = %item.photo_id, error = %e, "metadata embedding failed");
                    embed_error = Some(e.to_string());
                }
            }
        }

        Ok(ItemOutcome::Saved { files, embed_error })
    }

    /// Fetch bytes behind the shared limiter, retrying transient failures
    ///
    /// Waiting for a limiter slot and backoff sleeps end early on cancellation;
    /// an attempt already in flight runs to completion.
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        let source = &self.components.source;
        let limiter = &self.limiter;

        let result = retry_until_cancelled(&self.config.retry, cancel, || async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = limiter.acquire() => {}
            }
            source.fetch_bytes(url).await.map_err(FetchError::Source)
        })
        .await;

        match result {
            // backoff was cut short by a cancel; the item was never fetched
            Err(FetchError::Source(_)) if cancel.is_cancelled() => Err(FetchError::Cancelled),
            other => other,
        }
    }
}
