//! In-memory photo source for driving jobs without a network

use async_trait::async_trait;
use chrono::NaiveDate;
use flickr_dl::PhotoSize;
use flickr_dl::source::{
    Album, Photo, PhotoSource, SearchParams, SizeUrl, SourceError, SourceResult, UserInfo,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Minimal JPEG header; enough for the sidecar embedder to treat a file as JPEG
pub const FIXTURE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// A photo with a single large JPEG URL
pub fn fixture_photo(id: &str, title: &str) -> Photo {
    Photo {
        id: id.to_string(),
        title: title.to_string(),
        owner_name: "fixture".to_string(),
        owner_id: "99@N07".to_string(),
        description: format!("description of {title}"),
        tags: vec!["fixture".to_string()],
        date_taken: Some("2024-05-01 12:00:00".to_string()),
        urls: BTreeMap::from([(PhotoSize::Large, format!("https://fixtures.test/{id}.jpg"))]),
    }
}

/// `n` photos titled after a common stem, ids `1..=n`
pub fn fixture_photos(stem: &str, n: usize) -> Vec<Photo> {
    (1..=n)
        .map(|i| fixture_photo(&i.to_string(), &format!("{stem} {i}")))
        .collect()
}

/// Photo source answering every listing with the same photos
#[derive(Default)]
pub struct FixtureSource {
    photos: Vec<Photo>,
    broken: HashSet<String>,
    fetches: AtomicUsize,
    searches: Mutex<Vec<SearchParams>>,
}

impl FixtureSource {
    pub fn new(photos: Vec<Photo>) -> Self {
        Self {
            photos,
            ..Self::default()
        }
    }

    /// Fetching this photo always fails with a permanent error
    pub fn broken(mut self, photo_id: &str) -> Self {
        self.broken.insert(photo_id.to_string());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> Vec<SearchParams> {
        self.searches.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn first(&self, limit: usize) -> Vec<Photo> {
        self.photos.iter().take(limit).cloned().collect()
    }
}

#[async_trait]
impl PhotoSource for FixtureSource {
    async fn resolve_user(&self, query: &str) -> SourceResult<UserInfo> {
        Ok(UserInfo {
            nsid: "99@N07".to_string(),
            username: query.to_string(),
        })
    }

    async fn list_albums(&self, _user_id: &str) -> SourceResult<Vec<Album>> {
        Ok(vec![Album {
            id: "1000".to_string(),
            title: "Everything".to_string(),
            photos: self.photos.len() as u32,
        }])
    }

    async fn search(&self, params: &SearchParams) -> SourceResult<Vec<Photo>> {
        if let Ok(mut searches) = self.searches.lock() {
            searches.push(params.clone());
        }
        Ok(self.first(params.limit))
    }

    async fn list_album(&self, _user_id: &str, _album_id: &str) -> SourceResult<Vec<Photo>> {
        Ok(self.photos.clone())
    }

    async fn list_photostream(&self, _user_id: &str, limit: usize) -> SourceResult<Vec<Photo>> {
        Ok(self.first(limit))
    }

    async fn list_interestingness(
        &self,
        _date: NaiveDate,
        limit: usize,
    ) -> SourceResult<Vec<Photo>> {
        Ok(self.first(limit))
    }

    async fn photo_sizes(&self, photo_id: &str) -> SourceResult<Vec<SizeUrl>> {
        Err(SourceError::NotFound(format!("sizes of {photo_id}")))
    }

    async fn fetch_bytes(&self, url: &str) -> SourceResult<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let photo_id = url
            .rsplit('/')
            .next()
            .and_then(|name| name.split('.').next())
            .unwrap_or_default();

        if self.broken.contains(photo_id) {
            return Err(SourceError::NotFound(format!("photo {photo_id}")));
        }
        Ok(FIXTURE_JPEG.to_vec())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
