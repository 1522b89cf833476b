//! Shared test helpers: a scripted photo source and test downloader construction.

use crate::archive::ZipPackager;
use crate::config::{Config, RetryConfig};
use crate::downloader::PhotoDownloader;
use crate::metadata::XmpSidecarEmbedder;
use crate::source::{
    Album, Photo, PhotoSource, SearchParams, SizeUrl, SourceError, SourceResult, UserInfo,
};
use crate::types::{Event, JobId, PhotoSize};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Bytes served for `.jpg` URLs (JPEG magic followed by filler)
pub(crate) const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// A photo with a single large JPEG URL at `https://img.test/{id}.jpg`
pub(crate) fn mock_photo(id: &str) -> Photo {
    let mut photo = Photo {
        id: id.to_string(),
        title: format!("photo {id}"),
        owner_name: "walker".into(),
        owner_id: "1234@N01".into(),
        description: "shot at dawn".into(),
        tags: vec!["coast".into(), "fog".into()],
        date_taken: Some("2024-03-01 06:12:00".into()),
        ..Default::default()
    };
    photo
        .urls
        .insert(PhotoSize::Large, format!("https://img.test/{id}.jpg"));
    photo
}

/// Photos with ids "1" to "n"
pub(crate) fn mock_photos(n: usize) -> Vec<Photo> {
    (1..=n).map(|i| mock_photo(&i.to_string())).collect()
}

/// Photo id encoded in a mock URL (`.../{id}.ext` or `.../{id}_suffix.ext`)
fn photo_id_from_url(url: &str) -> String {
    let file = url.rsplit('/').next().unwrap_or(url);
    let stem = file.split('.').next().unwrap_or(file);
    stem.split('_').next().unwrap_or(stem).to_string()
}

/// Handles for holding a fetch open until the test releases it
pub(crate) struct FetchGate {
    /// Notified when the gated fetch has started
    pub(crate) reached: Arc<Notify>,
    /// Notify to let the gated fetch finish
    pub(crate) release: Arc<Notify>,
}

struct Gate {
    photo_id: String,
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

/// In-memory photo source with scripted failures
#[derive(Default)]
pub(crate) struct MockSource {
    photos: Vec<Photo>,
    users: HashMap<String, UserInfo>,
    albums: Vec<Album>,
    sizes: HashMap<String, Vec<SizeUrl>>,
    listing_failure: Option<SourceError>,
    fetch_failures: Mutex<HashMap<String, VecDeque<SourceError>>>,
    always_failing: Mutex<HashMap<String, SourceError>>,
    gate: Mutex<Option<Gate>>,
    fetch_calls: AtomicUsize,
    last_limit: Mutex<Option<usize>>,
    last_search: Mutex<Option<SearchParams>>,
}

impl MockSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_photos(mut self, photos: Vec<Photo>) -> Self {
        self.photos = photos;
        self
    }

    pub(crate) fn with_user(mut self, query: &str, nsid: &str) -> Self {
        self.users.insert(
            query.to_string(),
            UserInfo {
                nsid: nsid.to_string(),
                username: query.to_string(),
            },
        );
        self
    }

    pub(crate) fn with_albums(mut self, albums: Vec<Album>) -> Self {
        self.albums = albums;
        self
    }

    pub(crate) fn with_sizes(mut self, photo_id: &str, sizes: Vec<SizeUrl>) -> Self {
        self.sizes.insert(photo_id.to_string(), sizes);
        self
    }

    /// Every listing call fails with `error`
    pub(crate) fn fail_listings(mut self, error: SourceError) -> Self {
        self.listing_failure = Some(error);
        self
    }

    /// The next fetches of `photo_id` fail with `errors`, in order, then succeed
    pub(crate) fn fail_fetch(self, photo_id: &str, errors: Vec<SourceError>) -> Self {
        self.fetch_failures
            .lock()
            .unwrap()
            .insert(photo_id.to_string(), errors.into());
        self
    }

    /// Every fetch of `photo_id` fails with `error`
    pub(crate) fn fail_fetch_always(self, photo_id: &str, error: SourceError) -> Self {
        self.always_failing
            .lock()
            .unwrap()
            .insert(photo_id.to_string(), error);
        self
    }

    /// Hold the next fetch of `photo_id` until the returned gate is released
    pub(crate) fn gate(&self, photo_id: &str) -> FetchGate {
        let reached = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Gate {
            photo_id: photo_id.to_string(),
            reached: Arc::clone(&reached),
            release: Arc::clone(&release),
        });
        FetchGate { reached, release }
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_limit(&self) -> Option<usize> {
        *self.last_limit.lock().unwrap()
    }

    pub(crate) fn last_search(&self) -> Option<SearchParams> {
        self.last_search.lock().unwrap().clone()
    }

    fn listing(&self, limit: Option<usize>) -> SourceResult<Vec<Photo>> {
        if let Some(error) = &self.listing_failure {
            return Err(error.clone());
        }
        *self.last_limit.lock().unwrap() = limit;
        let photos = self.photos.iter().take(limit.unwrap_or(usize::MAX));
        Ok(photos.cloned().collect())
    }
}

#[async_trait]
impl PhotoSource for MockSource {
    async fn resolve_user(&self, query: &str) -> SourceResult<UserInfo> {
        if let Some(error) = &self.listing_failure {
            return Err(error.clone());
        }
        self.users
            .get(query)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("user {query}")))
    }

    async fn list_albums(&self, _user_id: &str) -> SourceResult<Vec<Album>> {
        if let Some(error) = &self.listing_failure {
            return Err(error.clone());
        }
        Ok(self.albums.clone())
    }

    async fn search(&self, params: &SearchParams) -> SourceResult<Vec<Photo>> {
        *self.last_search.lock().unwrap() = Some(params.clone());
        self.listing(Some(params.limit))
    }

    async fn list_album(&self, _user_id: &str, album_id: &str) -> SourceResult<Vec<Photo>> {
        if album_id == "missing" {
            return Err(SourceError::NotFound(format!("album {album_id}")));
        }
        self.listing(None)
    }

    async fn list_photostream(&self, _user_id: &str, limit: usize) -> SourceResult<Vec<Photo>> {
        self.listing(Some(limit))
    }

    async fn list_interestingness(
        &self,
        _date: NaiveDate,
        limit: usize,
    ) -> SourceResult<Vec<Photo>> {
        self.listing(Some(limit))
    }

    async fn photo_sizes(&self, photo_id: &str) -> SourceResult<Vec<SizeUrl>> {
        self.sizes
            .get(photo_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("sizes of {photo_id}")))
    }

    async fn fetch_bytes(&self, url: &str) -> SourceResult<Vec<u8>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let photo_id = photo_id_from_url(url);

        // one-shot: only the first fetch of the gated photo is held
        let gate = {
            let mut gate = self.gate.lock().unwrap();
            if gate.as_ref().is_some_and(|g| g.photo_id == photo_id) {
                gate.take().map(|g| (g.reached, g.release))
            } else {
                None
            }
        };
        if let Some((reached, release)) = gate {
            reached.notify_one();
            release.notified().await;
        }

        if let Some(error) = self.always_failing.lock().unwrap().get(&photo_id) {
            return Err(error.clone());
        }
        let scripted = self
            .fetch_failures
            .lock()
            .unwrap()
            .get_mut(&photo_id)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }

        if url.ends_with(".jpg") {
            Ok(JPEG_BYTES.to_vec())
        } else {
            Ok(format!("image {photo_id}").into_bytes())
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Fast retries without jitter
pub(crate) fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Test config rooted in `dir`: unlimited request rate, fast retries
pub(crate) fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.download.work_dir = dir.join("work");
    config.download.requests_per_second = None;
    config.retry = fast_retry();
    config
}

/// Helper to create a test PhotoDownloader over `source`.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader(
    source: Arc<MockSource>,
) -> (PhotoDownloader, tempfile::TempDir) {
    create_test_downloader_with(source, |_| {}).await
}

/// Like [`create_test_downloader`], with a hook to adjust the config
pub(crate) async fn create_test_downloader_with(
    source: Arc<MockSource>,
    adjust: impl FnOnce(&mut Config),
) -> (PhotoDownloader, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
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

/// Collect a job's events until its terminal event (5 second timeout)
pub(crate) async fn collect_events(downloader: &PhotoDownloader, id: &JobId) -> Vec<Event> {
    let subscription = downloader.subscribe(id).await.unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        subscription.into_stream().collect::<Vec<_>>(),
    )
    .await
    .expect("job did not finish in time")
}
