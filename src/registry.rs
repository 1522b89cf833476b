//! Registry of jobs known to this process

use crate::config::RetentionConfig;
use crate::error::{Error, Result};
use crate::job::Job;
use crate::types::JobId;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Number of evicted ids remembered for [`Error::ResultExpired`] answers
pub const REMEMBERED_EXPIRED_IDS: usize = 10_000;

/// Evicted ids, oldest first, bounded to a fixed capacity
#[derive(Default)]
struct ExpiredIds {
    set: HashSet<JobId>,
    order: VecDeque<JobId>,
    capacity: usize,
}

impl ExpiredIds {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    fn insert(&mut self, id: JobId) {
        if !self.set.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
    }

    fn contains(&self, id: &JobId) -> bool {
        self.set.contains(id)
    }
}

/// Maps job ids to jobs for status queries, subscription, cancellation and retrieval
///
/// Admission is checked under the same write lock that inserts the job, so
/// concurrent submissions can never exceed `max_running`. Evicted ids are
/// remembered so late lookups report [`Error::ResultExpired`] instead of
/// [`Error::JobNotFound`]; only the most recent [`REMEMBERED_EXPIRED_IDS`]
/// are kept.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
    expired: RwLock<ExpiredIds>,
    max_running: usize,
}

impl JobRegistry {
    /// Create a registry admitting at most `max_running` concurrently running jobs
    pub fn new(max_running: usize) -> Self {
        Self::with_expired_capacity(max_running, REMEMBERED_EXPIRED_IDS)
    }

    fn with_expired_capacity(max_running: usize, capacity: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            expired: RwLock::new(ExpiredIds::with_capacity(capacity)),
            max_running,
        }
    }

    /// Add a job, unless too many are already running
    pub async fn register(&self, job: Arc<Job>) -> Result<()> {
        let mut jobs = self.jobs.write().await;

        let running = jobs.values().filter(|j| !j.state().is_terminal()).count();
        if running >= self.max_running {
            return Err(Error::TooManyJobs {
                limit: self.max_running,
            });
        }

        jobs.insert(job.id().clone(), job);
        Ok(())
    }

    /// Look up a job
    pub async fn get(&self, id: &JobId) -> Result<Arc<Job>> {
        if let Some(job) = self.jobs.read().await.get(id) {
            return Ok(Arc::clone(job));
        }
        if self.expired.read().await.contains(id) {
            return Err(Error::ResultExpired(id.clone()));
        }
        Err(Error::JobNotFound(id.clone()))
    }

    /// All jobs, oldest first
    pub async fn list(&self) -> Vec<Arc<Job>> {
        let mut jobs: Vec<_> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at());
        jobs
    }

    /// Set the cancellation flag of a job; returns whether it was still running
    pub async fn request_cancel(&self, id: &JobId) -> Result<bool> {
        let job = self.get(id).await?;
        Ok(job.request_cancel())
    }

    /// Number of jobs currently running
    pub async fn active_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| !j.state().is_terminal())
            .count()
    }

    /// Request cancellation of every running job
    pub async fn cancel_all(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| job.request_cancel())
            .count()
    }

    /// Remove jobs whose retention ran out at `now` and delete their files
    ///
    /// Returns the ids that were evicted. Running jobs are never evicted.
    pub async fn evict_expired(
        &self,
        now: DateTime<Utc>,
        retention: &RetentionConfig,
    ) -> Vec<JobId> {
        let evicted: Vec<Arc<Job>> = {
            let mut jobs = self.jobs.write().await;
            let due: Vec<JobId> = jobs
                .values()
                .filter(|job| job.expires_at(retention).is_some_and(|at| at <= now))
                .map(|job| job.id().clone())
                .collect();
            if due.is_empty() {
                return Vec::new();
            }

            // recorded before `jobs` is released, so a lookup finds the job or its record
            let mut expired = self.expired.write().await;
            for id in &due {
                expired.insert(id.clone());
            }
            due.iter().filter_map(|id| jobs.remove(id)).collect()
        };

        for job in &evicted {
            remove_job_files(job).await;
            tracing::info!(job_id = %job.id(), state = %job.state(), "evicted expired job");
        }

        evicted.iter().map(|job| job.id().clone()).collect()
    }
}

async fn remove_job_files(job: &Job) {
    if let Some(archive) = job.archive() {
        remove_quietly(&archive.path, false).await;
    }
    remove_quietly(job.staging_dir(), true).await;
}

/// Delete a file or directory tree, logging anything but `NotFound`
pub(crate) async fn remove_quietly(path: &Path, dir: bool) {
    let result = if dir {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    match result {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove job files"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveRef;
    use crate::types::JobState;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::tempdir;

    fn retention() -> RetentionConfig {
        RetentionConfig {
            grace_period: Duration::from_secs(600),
            unclaimed_ttl: None,
            sweep_interval: Duration::from_secs(60),
        }
    }

    fn new_job(staging: PathBuf) -> Arc<Job> {
        Arc::new(Job::new(JobId::generate(), "test", 1, staging))
    }

    #[tokio::test]
    async fn admission_is_limited_to_running_jobs() {
        let registry = JobRegistry::new(2);
        let first = new_job(PathBuf::new());
        registry.register(Arc::clone(&first)).await.unwrap();
        registry.register(new_job(PathBuf::new())).await.unwrap();

        let third = registry.register(new_job(PathBuf::new())).await;
        assert!(matches!(third, Err(Error::TooManyJobs { limit: 2 })));

        // a finished job frees its slot
        first.fail("done".into());
        registry.register(new_job(PathBuf::new())).await.unwrap();
        assert_eq!(registry.active_count().await, 2);
        assert_eq!(registry.list().await.len(), 3);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let registry = JobRegistry::new(2);
        let result = registry.get(&JobId::from("000000000000")).await;
        assert!(matches!(result, Err(Error::JobNotFound(_))));
        assert!(registry.request_cancel(&JobId::from("x")).await.is_err());
    }

    #[tokio::test]
    async fn cancel_sets_the_flag_only() {
        let registry = JobRegistry::new(2);
        let job = new_job(PathBuf::new());
        registry.register(Arc::clone(&job)).await.unwrap();

        assert!(registry.request_cancel(job.id()).await.unwrap());
        assert!(job.is_cancel_requested());
        assert_eq!(job.state(), JobState::Running);
    }

    #[tokio::test]
    async fn eviction_respects_retention_and_deletes_files() {
        let dir = tempdir().unwrap();
        let registry = JobRegistry::new(4);

        let staging = dir.path().join("job_a");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("1.jpg"), b"x").unwrap();
        let zip_path = dir.path().join("a.zip");
        std::fs::write(&zip_path, b"zip").unwrap();

        let completed = new_job(staging.clone());
        completed.complete(
            ArchiveRef {
                path: zip_path.clone(),
                size_bytes: 3,
                entries: 1,
            },
            "ok".into(),
        );
        let running = new_job(PathBuf::new());
        let cancelled = new_job(dir.path().join("job_c"));
        cancelled.mark_cancelled();

        for job in [&completed, &running, &cancelled] {
            registry.register(Arc::clone(job)).await.unwrap();
        }

        // well past every grace period, but the completed job was never retrieved
        let later = Utc::now() + chrono::Duration::hours(2);
        let evicted = registry.evict_expired(later, &retention()).await;
        assert_eq!(evicted, vec![cancelled.id().clone()]);
        assert!(matches!(
            registry.get(cancelled.id()).await,
            Err(Error::ResultExpired(_))
        ));
        assert!(registry.get(running.id()).await.is_ok());

        // retrieval starts the grace period of the completed job
        completed.mark_retrieved(Utc::now());
        let evicted = registry.evict_expired(later, &retention()).await;
        assert_eq!(evicted, vec![completed.id().clone()]);
        assert!(!zip_path.exists());
        assert!(!staging.exists());
        assert!(matches!(
            registry.get(completed.id()).await,
            Err(Error::ResultExpired(_))
        ));
    }

    #[tokio::test]
    async fn nothing_expires_before_the_grace_period() {
        let registry = JobRegistry::new(2);
        let job = new_job(PathBuf::new());
        job.fail("x".into());
        registry.register(Arc::clone(&job)).await.unwrap();

        let evicted = registry.evict_expired(Utc::now(), &retention()).await;
        assert!(evicted.is_empty());
        assert!(registry.get(job.id()).await.is_ok());
    }

    #[tokio::test]
    async fn evicted_ids_are_remembered_up_to_capacity() {
        let registry = JobRegistry::with_expired_capacity(4, 2);
        let jobs: Vec<_> = (0..3).map(|_| new_job(PathBuf::new())).collect();
        for job in &jobs {
            job.fail("x".into());
            registry.register(Arc::clone(job)).await.unwrap();
        }

        let later = Utc::now() + chrono::Duration::hours(2);
        assert_eq!(registry.evict_expired(later, &retention()).await.len(), 3);

        let mut expired = 0;
        let mut forgotten = 0;
        for job in &jobs {
            match registry.get(job.id()).await {
                Err(Error::ResultExpired(_)) => expired += 1,
                Err(Error::JobNotFound(_)) => forgotten += 1,
                other => panic!("unexpected lookup result {other:?}"),
            }
        }
        assert_eq!((expired, forgotten), (2, 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn lookup_during_eviction_never_reports_not_found() {
        let registry = Arc::new(JobRegistry::new(64));
        let jobs: Vec<_> = (0..32).map(|_| new_job(PathBuf::new())).collect();
        for job in &jobs {
            job.fail("x".into());
            registry.register(Arc::clone(job)).await.unwrap();
        }

        let lookups = {
            let registry = Arc::clone(&registry);
            let ids: Vec<JobId> = jobs.iter().map(|job| job.id().clone()).collect();
            tokio::spawn(async move {
                for _ in 0..50 {
                    for id in &ids {
                        assert!(!matches!(
                            registry.get(id).await,
                            Err(Error::JobNotFound(_))
                        ));
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let later = Utc::now() + chrono::Duration::hours(2);
        registry.evict_expired(later, &retention()).await;
        lookups.await.unwrap();
    }

    #[tokio::test]
    async fn cancel_all_only_counts_running_jobs() {
        let registry = JobRegistry::new(3);
        let done = new_job(PathBuf::new());
        done.fail("x".into());
        registry.register(done).await.unwrap();
        registry.register(new_job(PathBuf::new())).await.unwrap();

        assert_eq!(registry.cancel_all().await, 1);
    }
}
