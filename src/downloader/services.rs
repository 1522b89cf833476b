//! Background service starters: retention sweeper and the REST API server.

use crate::error::Result;
use crate::types::JobId;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::PhotoDownloader;

impl PhotoDownloader {
    /// Evict every job whose retention ran out, deleting its files
    ///
    /// Returns the evicted ids. Later lookups of these ids fail with
    /// [`Error::ResultExpired`](crate::Error::ResultExpired).
    pub async fn evict_expired(&self) -> Vec<JobId> {
        self.registry
            .evict_expired(Utc::now(), &self.config.retention)
            .await
    }

    /// Start the retention sweeper
    ///
    /// Runs [`evict_expired`](Self::evict_expired) every `retention.sweep_interval`
    /// until the downloader stops accepting jobs.
    pub fn start_cleanup_task(&self) -> tokio::task::JoinHandle<()> {
        let downloader = self.clone();
        let interval = self.config.retention.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if !downloader.accepting_new.load(Ordering::SeqCst) {
                    tracing::info!("Cleanup task stopping due to shutdown");
                    break;
                }

                let evicted = downloader.evict_expired().await;
                if !evicted.is_empty() {
                    tracing::info!(count = evicted.len(), "Evicted expired jobs");
                }
            }
        });

        tracing::info!(interval_secs = interval.as_secs(), "Cleanup task started");

        handle
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server listens on `server.api.bind_address` (default: 127.0.0.1:5000)
    /// and runs concurrently with job processing.
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = Arc::clone(self);
        let config = Arc::clone(&self.config);

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
