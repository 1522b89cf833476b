//! Work plan construction
//!
//! Turns a [`DownloadRequest`] into an ordered, immutable list of items to fetch.
//! All listing calls happen here, before a job exists, so a bad request or an
//! unreachable source is reported to the caller directly.

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::metadata::PhotoMetadata;
use crate::rate_limiter::RequestLimiter;
use crate::retry::download_with_retry;
use crate::source::{Photo, PhotoSource, SearchParams, SourceError, SourceResult};
use crate::types::{
    AlbumSelection, DownloadOptions, DownloadRequest, DownloadTarget, PhotoSize, UserAlbums,
};
use crate::utils::{extension_from_url, render_filename, DEFAULT_EXTENSION};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// One photo to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Source identifier of the photo
    pub photo_id: String,
    /// Title
    pub title: String,
    /// Owner display name (or account id when the name is unknown)
    pub owner: String,
    /// Description
    pub description: String,
    /// Tags
    pub tags: Vec<String>,
    /// When the photo was taken
    pub date_taken: Option<String>,
    /// Smallest offered thumbnail, for previews
    pub thumb_url: Option<String>,
    /// URL to fetch; `None` when no size could be resolved
    pub url: Option<String>,
    /// Size behind `url`
    pub size: Option<PhotoSize>,
    /// Unique filename inside the job, with extension
    pub filename: String,
}

impl WorkItem {
    /// Metadata to embed into the fetched file
    pub fn metadata(&self) -> PhotoMetadata {
        PhotoMetadata {
            title: self.title.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            author: self.owner.clone(),
        }
    }
}

/// Ordered list of items of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkPlan {
    /// Human-readable description of the work
    pub label: String,
    /// Items in fetch order
    pub items: Vec<WorkItem>,
    /// Whether fetched JPEGs get metadata attached
    pub embed_metadata: bool,
}

impl WorkPlan {
    /// Progress denominator
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Whether there is nothing to fetch
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Builds work plans by querying a [`PhotoSource`]
///
/// Listing calls go through the shared request limiter and are retried like
/// photo fetches.
#[derive(Clone)]
pub struct PlanBuilder {
    source: Arc<dyn PhotoSource>,
    retry: RetryConfig,
    limiter: RequestLimiter,
}

impl PlanBuilder {
    /// Create a builder over `source`
    pub fn new(source: Arc<dyn PhotoSource>, retry: RetryConfig, limiter: RequestLimiter) -> Self {
        Self {
            source,
            retry,
            limiter,
        }
    }

    /// Resolve a request into a work plan
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] for a zero count, an empty or unknown user,
    ///   a missing or unknown album, or a search without any criteria
    /// - [`Error::SourceUnavailable`] when the source cannot be reached
    pub async fn build(&self, request: &DownloadRequest) -> Result<WorkPlan> {
        let options = &request.options;
        if options.count == 0 {
            return Err(Error::InvalidRequest("count must be at least 1".into()));
        }
        let limit = request
            .target
            .count_ceiling()
            .map_or(options.count, |ceiling| options.count.min(ceiling)) as usize;

        let (label, photos) = match &request.target {
            DownloadTarget::Interestingness { date, user_id } => {
                let source = &self.source;
                let mut photos = self
                    .paced(|| source.list_interestingness(*date, limit))
                    .await
                    .map_err(listing_error)?;

                let mut label = format!("Interestingness {}", date.format("%Y-%m-%d"));
                if let Some(user_id) = user_id.as_deref().filter(|u| !u.trim().is_empty()) {
                    photos.retain(|p| p.owner_id == user_id);
                    debug!(user_id, kept = photos.len(), "filtered interestingness by owner");
                    label.push_str(&format!(" by {user_id}"));
                }
                (label, photos)
            }

            DownloadTarget::Search {
                text,
                tags,
                tag_mode,
                sort,
                licenses,
                user_id,
            } => {
                let tags: Vec<String> = tags
                    .iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                let user_id = user_id.clone().filter(|u| !u.trim().is_empty());
                if text.trim().is_empty() && tags.is_empty() && user_id.is_none() {
                    return Err(Error::InvalidRequest(
                        "search needs text, tags or a user".into(),
                    ));
                }

                let label = match (text.trim(), &user_id) {
                    ("", _) if !tags.is_empty() => format!("Search tags: {}", tags.join(", ")),
                    ("", Some(user)) => format!("Search photos of {user}"),
                    (text, _) => format!("Search \"{text}\""),
                };
                let params = SearchParams {
                    text: text.clone(),
                    tags,
                    tag_mode: *tag_mode,
                    sort: *sort,
                    licenses: licenses.clone(),
                    user_id,
                    limit,
                };
                let source = &self.source;
                let photos = self
                    .paced(|| source.search(&params))
                    .await
                    .map_err(listing_error)?;
                (label, photos)
            }

            DownloadTarget::UserAlbum { user, selection } => {
                let (nsid, display) = self.resolve_owner(user).await?;
                let source = &self.source;
                match selection {
                    AlbumSelection::Photostream => {
                        let photos = self
                            .paced(|| source.list_photostream(&nsid, limit))
                            .await
                            .map_err(listing_error)?;
                        (format!("Photostream of {display}"), photos)
                    }
                    AlbumSelection::Album { album_id, title } => {
                        if album_id.trim().is_empty() {
                            return Err(Error::InvalidRequest("album id is required".into()));
                        }
                        let photos = self
                            .paced(|| source.list_album(&nsid, album_id))
                            .await
                            .map_err(|e| match e {
                                SourceError::NotFound(_) => Error::InvalidRequest(format!(
                                    "album {album_id} not found for {display}"
                                )),
                                other => listing_error(other),
                            })?;
                        let name = title.as_deref().unwrap_or(album_id);
                        (format!("Album {name} by {display}"), photos)
                    }
                }
            }
        };

        let photos: Vec<Photo> = match request.target.count_ceiling() {
            Some(_) => photos.into_iter().take(limit).collect(),
            None => photos,
        };

        let items = self.plan_items(photos, options).await;
        debug!(label, items = items.len(), "work plan built");

        Ok(WorkPlan {
            label,
            items,
            embed_metadata: options.embed_metadata,
        })
    }

    /// Resolve a user and list their albums
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] for an empty or unknown user,
    /// [`Error::SourceUnavailable`] when the source cannot be reached.
    pub async fn user_albums(&self, user: &str) -> Result<UserAlbums> {
        let (nsid, username) = self.resolve_owner(user).await?;
        let source = &self.source;
        let albums = self
            .paced(|| source.list_albums(&nsid))
            .await
            .map_err(listing_error)?;
        debug!(nsid, albums = albums.len(), "listed albums");

        Ok(UserAlbums {
            nsid,
            username,
            albums,
        })
    }

    /// Map a username, profile URL or NSID to `(nsid, display name)`
    async fn resolve_owner(&self, user: &str) -> Result<(String, String)> {
        let user = user.trim();
        if user.is_empty() {
            return Err(Error::InvalidRequest("user is required".into()));
        }
        // NSIDs look like 12345678@N01
        if user.contains("@N") && !user.contains('/') {
            return Ok((user.to_string(), user.to_string()));
        }

        let source = &self.source;
        match self.paced(|| source.resolve_user(user)).await {
            Ok(info) => Ok((info.nsid, info.username)),
            Err(SourceError::NotFound(_)) => {
                Err(Error::InvalidRequest(format!("could not find user '{user}'")))
            }
            Err(e) => Err(listing_error(e)),
        }
    }

    async fn plan_items(&self, photos: Vec<Photo>, options: &DownloadOptions) -> Vec<WorkItem> {
        let mut used = HashSet::new();
        let mut items = Vec::with_capacity(photos.len());

        for photo in photos {
            let (size, url) = match photo.url_for(options.size) {
                Some((size, url)) => (Some(size), Some(url.to_string())),
                None => self.largest_offered(&photo.id).await,
            };

            let owner = if photo.owner_name.is_empty() {
                photo.owner_id.clone()
            } else {
                photo.owner_name.clone()
            };
            let stem = render_filename(&options.filename_template, &photo.id, &photo.title, &owner);
            let extension = url
                .as_deref()
                .map_or_else(|| DEFAULT_EXTENSION.to_string(), extension_from_url);
            let filename = unique_filename(&mut used, &stem, &photo.id, &extension);

            items.push(WorkItem {
                thumb_url: photo.urls.values().next().cloned(),
                photo_id: photo.id,
                title: photo.title,
                owner,
                description: photo.description,
                tags: photo.tags,
                date_taken: photo.date_taken,
                url,
                size,
                filename,
            });
        }

        items
    }

    /// Largest entry of the photo's size list, when the listing carried no URL
    async fn largest_offered(&self, photo_id: &str) -> (Option<PhotoSize>, Option<String>) {
        let source = &self.source;
        match self.paced(|| source.photo_sizes(photo_id)).await {
            Ok(sizes) => match sizes.into_iter().last() {
                Some(entry) => (entry.size, Some(entry.url)),
                None => (None, None),
            },
            Err(e) => {
                debug!(photo_id, error = %e, "size lookup failed");
                (None, None)
            }
        }
    }

    /// Run one source call behind the shared limiter, with retries
    async fn paced<T, F, Fut>(&self, mut call: F) -> SourceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SourceResult<T>>,
    {
        let limiter = &self.limiter;
        download_with_retry(&self.retry, || {
            let pending = call();
            async move {
                limiter.acquire().await;
                pending.await
            }
        })
        .await
    }
}

fn listing_error(error: SourceError) -> Error {
    match error {
        SourceError::Unauthorized(message) => {
            Error::SourceUnavailable(format!("credentials rejected: {message}"))
        }
        other => other.into(),
    }
}

/// `stem + extension`, or with `_{id}` and then `_{n}` appended until unused
///
/// Comparison ignores case so names stay distinct on case-insensitive filesystems.
fn unique_filename(used: &mut HashSet<String>, stem: &str, id: &str, extension: &str) -> String {
    let mut candidates = [format!("{stem}{extension}"), format!("{stem}_{id}{extension}")]
        .into_iter()
        .chain((2..).map(|n| format!("{stem}_{id}_{n}{extension}")));

    loop {
        if let Some(name) = candidates.next()
            && used.insert(name.to_lowercase())
        {
            return name;
        }
    }
}
