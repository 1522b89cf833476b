//! A single download job

use crate::archive::ArchiveRef;
use crate::config::RetentionConfig;
use crate::progress::{EventLog, Subscription};
use crate::types::{Event, JobId, JobInfo, JobState};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

struct Status {
    state: JobState,
    archive: Option<ArchiveRef>,
    finished_at: Option<DateTime<Utc>>,
    retrieved_at: Option<DateTime<Utc>>,
}

/// Shared state of one job
///
/// Only the job's own task advances progress, publishes events and moves the
/// state out of `Running`; everybody else reads. The terminal transition
/// happens exactly once, and the state is updated before the matching
/// terminal event is published, so an observer that sees `complete` can
/// retrieve the archive right away.
pub struct Job {
    id: JobId,
    label: String,
    total: usize,
    current: AtomicUsize,
    status: Mutex<Status>,
    cancel: CancellationToken,
    events: Arc<EventLog>,
    created_at: DateTime<Utc>,
    staging_dir: PathBuf,
}

impl Job {
    /// Create a running job for a plan of `total` items
    pub fn new(id: JobId, label: impl Into<String>, total: usize, staging_dir: PathBuf) -> Self {
        Self {
            id,
            label: label.into(),
            total,
            current: AtomicUsize::new(0),
            status: Mutex::new(Status {
                state: JobState::Running,
                archive: None,
                finished_at: None,
                retrieved_at: None,
            }),
            cancel: CancellationToken::new(),
            events: Arc::new(EventLog::new()),
            created_at: Utc::now(),
            staging_dir,
        }
    }

    fn status(&self) -> MutexGuard<'_, Status> {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Job identifier
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Human-readable description of the work
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Items in the work plan
    pub fn total(&self) -> usize {
        self.total
    }

    /// Items processed so far
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// Current lifecycle state
    pub fn state(&self) -> JobState {
        self.status().state
    }

    /// When the job was started
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the job reached its terminal state
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.status().finished_at
    }

    /// When the archive was first retrieved
    pub fn retrieved_at(&self) -> Option<DateTime<Utc>> {
        self.status().retrieved_at
    }

    /// Directory holding the fetched files
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// The archive, once the job completed
    pub fn archive(&self) -> Option<ArchiveRef> {
        self.status().archive.clone()
    }

    /// Token observed by the job task between items
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ask the job to stop; returns whether it was still running
    ///
    /// Only sets the flag. The job task notices it at the next item boundary.
    pub fn request_cancel(&self) -> bool {
        let running = !self.state().is_terminal();
        if running {
            self.cancel.cancel();
        }
        running
    }

    /// Whether cancellation was requested
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The job's event log
    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    /// Observe the job's events from the beginning
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    /// Publish a non-terminal event
    pub(crate) fn publish(&self, event: Event) {
        self.events.publish(event);
    }

    /// Count one more processed item and return the new count
    pub(crate) fn advance(&self) -> usize {
        self.current.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Mark the job completed with its archive and publish `complete`
    pub(crate) fn complete(&self, archive: ArchiveRef, message: String) -> bool {
        let job_id = self.id.clone();
        self.finish(
            JobState::Completed,
            Some(archive),
            Event::Complete {
                message,
                file_ready: true,
                job_id,
            },
        )
    }

    /// Mark the job failed and publish `error`
    pub(crate) fn fail(&self, message: String) -> bool {
        self.finish(JobState::Failed, None, Event::Error { message })
    }

    /// Mark the job cancelled and publish `cancelled`
    pub(crate) fn mark_cancelled(&self) -> bool {
        self.finish(JobState::Cancelled, None, Event::Cancelled)
    }

    /// Leave `Running`; returns false if the job had already finished
    fn finish(&self, state: JobState, archive: Option<ArchiveRef>, event: Event) -> bool {
        {
            let mut status = self.status();
            if status.state.is_terminal() {
                return false;
            }
            status.state = state;
            status.archive = archive;
            status.finished_at = Some(Utc::now());
        }
        self.events.publish(event);
        true
    }

    /// Record a retrieval; only the first one counts for retention
    pub fn mark_retrieved(&self, at: DateTime<Utc>) {
        let mut status = self.status();
        if status.retrieved_at.is_none() {
            status.retrieved_at = Some(at);
        }
    }

    /// Point in time after which the job may be evicted, if any
    ///
    /// - running: never
    /// - completed: first retrieval + grace period, or finish + unclaimed TTL
    ///   when one is configured, whichever comes first
    /// - failed / cancelled: finish + grace period
    pub fn expires_at(&self, retention: &RetentionConfig) -> Option<DateTime<Utc>> {
        let status = self.status();
        let finished = status.finished_at?;
        let grace = chrono::Duration::from_std(retention.grace_period).ok()?;

        match status.state {
            JobState::Running => None,
            JobState::Failed | JobState::Cancelled => Some(finished + grace),
            JobState::Completed => {
                let after_retrieval = status.retrieved_at.map(|at| at + grace);
                let unclaimed = retention
                    .unclaimed_ttl
                    .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
                    .map(|ttl| finished + ttl);
                match (after_retrieval, unclaimed) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                }
            }
        }
    }

    /// Snapshot for status queries
    pub fn info(&self) -> JobInfo {
        let status = self.status();
        JobInfo {
            id: self.id.clone(),
            label: self.label.clone(),
            state: status.state,
            current: self.current(),
            total: self.total,
            file_ready: status.archive.is_some(),
            created_at: self.created_at,
            finished_at: status.finished_at,
            retrieved_at: status.retrieved_at,
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("current", &self.current())
            .field("total", &self.total)
            .finish()
    }
}
