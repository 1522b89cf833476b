//! Test configuration helpers for building downloaders over fixtures or live Flickr

use super::fixtures::FixtureSource;
use flickr_dl::{Config, PhotoDownloader, XmpSidecarEmbedder, ZipPackager};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Config rooted in `temp_dir` with fast retries and no request pacing
pub fn fixture_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.work_dir = temp_dir.path().join("work");
    config.download.requests_per_second = None;
    config.retry.max_attempts = 2;
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(5);
    config.retry.jitter = false;
    config
}

/// Downloader over `source`; the tempdir must be kept alive
pub async fn create_fixture_downloader(
    source: Arc<FixtureSource>,
    adjust: impl FnOnce(&mut Config),
) -> (PhotoDownloader, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = fixture_config(&temp_dir);
    adjust(&mut config);

    let downloader = PhotoDownloader::with_components(
        config,
        source,
        Arc::new(XmpSidecarEmbedder),
        Arc::new(ZipPackager),
    )
    .await
    .unwrap();
    (downloader, temp_dir)
}

/// Whether `FLICKR_API_KEY` is available (from the environment or `.env`)
pub fn has_live_credentials() -> bool {
    dotenvy::dotenv().ok();
    std::env::var("FLICKR_API_KEY").is_ok_and(|key| !key.is_empty())
}

/// Downloader talking to the real Flickr API, paced at one request per second
pub async fn create_live_downloader() -> Option<(PhotoDownloader, TempDir)> {
    if !has_live_credentials() {
        return None;
    }
    let temp_dir = tempfile::tempdir().ok()?;
    let mut config = fixture_config(&temp_dir);
    config.flickr = flickr_dl::config::FlickrConfig::from_env();
    config.download.requests_per_second = Some(1);
    config.retry = flickr_dl::config::RetryConfig::default();

    let downloader = PhotoDownloader::new(config).await.ok()?;
    Some((downloader, temp_dir))
}
