//! Shutdown coordination.

use crate::error::Result;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::PhotoDownloader;

/// How long shutdown waits for running jobs to reach a terminal state
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl PhotoDownloader {
    /// Gracefully shut down the downloader
    ///
    /// 1. Stops accepting new jobs
    /// 2. Requests cancellation of every running job
    /// 3. Waits (up to 30 seconds) for them to publish their terminal event
    ///
    /// Finished archives stay retrievable until the process exits.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        let cancelled = self.registry.cancel_all().await;
        tracing::info!(cancelled, "Signaled cancellation to running jobs");

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_running_jobs()).await {
            Ok(()) => tracing::info!("All running jobs stopped"),
            Err(_) => {
                tracing::warn!("Timeout waiting for jobs to stop, proceeding with shutdown")
            }
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether the downloader still accepts new jobs
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    async fn wait_for_running_jobs(&self) {
        loop {
            let active_count = self.registry.active_count().await;
            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for running jobs to stop");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
