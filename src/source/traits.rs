//! Traits and types for photo sources

use crate::retry::IsRetryable;
use crate::types::{PhotoSize, SortOrder, TagMode};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type for photo source calls
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Failure talking to a photo source
///
/// The variants separate transient conditions (worth retrying) from permanent ones.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The source asked us to slow down (HTTP 429)
    #[error("rate limited by photo source")]
    RateLimited {
        /// Server-provided wait before the next request
        retry_after: Option<Duration>,
    },

    /// Connection, TLS or timeout failure
    #[error("network error: {0}")]
    Network(String),

    /// The source answered with a server error or reported itself unavailable
    #[error("photo source unavailable ({status}): {message}")]
    Unavailable {
        /// HTTP status (or 0 when reported in-band)
        status: u16,
        /// Server message
        message: String,
    },

    /// The requested user, album or photo does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials missing or rejected
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The API reported an error for this call
    #[error("API error {code}: {message}")]
    Api {
        /// API error code
        code: i64,
        /// API error message
        message: String,
    },

    /// The response could not be understood
    #[error("malformed response: {0}")]
    Decode(String),
}

impl IsRetryable for SourceError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::RateLimited { .. }
                | SourceError::Network(_)
                | SourceError::Unavailable { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            SourceError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// A photo as listed by the source, with every size URL it offered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Photo {
    /// Source-assigned identifier
    pub id: String,
    /// Title (may be empty)
    pub title: String,
    /// Owner display name (may be empty)
    pub owner_name: String,
    /// Owner account id
    pub owner_id: String,
    /// Description (may be empty)
    pub description: String,
    /// Tags
    pub tags: Vec<String>,
    /// When the photo was taken, as reported by the source
    pub date_taken: Option<String>,
    /// Direct URLs keyed by size
    pub urls: BTreeMap<PhotoSize, String>,
}

impl Photo {
    /// URL for `size`, or the nearest size that is available
    ///
    /// Distance is measured along [`PhotoSize::LADDER`]; on a tie the larger size wins.
    pub fn url_for(&self, size: PhotoSize) -> Option<(PhotoSize, &str)> {
        self.urls
            .iter()
            .min_by_key(|(candidate, _)| {
                let distance = candidate.rank().abs_diff(size.rank());
                // larger sizes sort first among equal distances
                (distance, std::cmp::Reverse(candidate.rank()))
            })
            .map(|(candidate, url)| (*candidate, url.as_str()))
    }
}

/// A resolved account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    /// Account id (NSID)
    pub nsid: String,
    /// Display username
    pub username: String,
}

/// An album (photoset) owned by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Album {
    /// Album identifier
    pub id: String,
    /// Album title
    pub title: String,
    /// Number of photos the source reports for the album
    pub photos: u32,
}

/// One entry of a photo's size list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeUrl {
    /// Size, when it maps onto a known size
    pub size: Option<PhotoSize>,
    /// Source label, e.g. "Large 2048"
    pub label: String,
    /// Direct URL
    pub url: String,
}

/// Parameters of a photo search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    /// Free-text query
    pub text: String,
    /// Tags
    pub tags: Vec<String>,
    /// Any/all tag matching
    pub tag_mode: TagMode,
    /// Ordering
    pub sort: SortOrder,
    /// License ids
    pub licenses: Vec<String>,
    /// Restrict to one account
    pub user_id: Option<String>,
    /// Maximum number of results
    pub limit: usize,
}

/// Trait for photo sources
///
/// Implementations talk to a remote photo service. They classify failures through
/// [`SourceError`] so callers can decide what is worth retrying; they do not retry
/// or pace requests themselves.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    /// Turn a username or profile URL into an account
    async fn resolve_user(&self, query: &str) -> SourceResult<UserInfo>;

    /// Albums owned by an account
    async fn list_albums(&self, user_id: &str) -> SourceResult<Vec<Album>>;

    /// Photos matching a search, at most `params.limit`
    async fn search(&self, params: &SearchParams) -> SourceResult<Vec<Photo>>;

    /// Every photo of one album
    async fn list_album(&self, user_id: &str, album_id: &str) -> SourceResult<Vec<Photo>>;

    /// Newest public photos of an account, at most `limit`
    async fn list_photostream(&self, user_id: &str, limit: usize) -> SourceResult<Vec<Photo>>;

    /// The interestingness feed of one day, at most `limit`
    async fn list_interestingness(&self, date: NaiveDate, limit: usize)
    -> SourceResult<Vec<Photo>>;

    /// All sizes offered for a photo, smallest first
    async fn photo_sizes(&self, photo_id: &str) -> SourceResult<Vec<SizeUrl>>;

    /// Download the bytes behind a photo URL
    async fn fetch_bytes(&self, url: &str) -> SourceResult<Vec<u8>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn photo_with(sizes: &[PhotoSize]) -> Photo {
        Photo {
            id: "1".into(),
            urls: sizes
                .iter()
                .map(|s| (*s, format!("https://img.test/{}.jpg", s.url_key())))
                .collect(),
            ..Photo::default()
        }
    }

    #[test]
    fn exact_size_is_preferred() {
        let photo = photo_with(&[PhotoSize::Medium, PhotoSize::Large, PhotoSize::Original]);
        let (size, url) = photo.url_for(PhotoSize::Large).unwrap();
        assert_eq!(size, PhotoSize::Large);
        assert!(url.ends_with("url_l.jpg"));
    }

    #[test]
    fn nearest_size_wins_and_ties_prefer_larger() {
        // url_l requested; url_c and url_h are both one step away
        let photo = photo_with(&[PhotoSize::Medium800, PhotoSize::Large1600]);
        assert_eq!(
            photo.url_for(PhotoSize::Large).unwrap().0,
            PhotoSize::Large1600
        );

        let photo = photo_with(&[PhotoSize::Square, PhotoSize::Medium640]);
        assert_eq!(
            photo.url_for(PhotoSize::Original).unwrap().0,
            PhotoSize::Medium640
        );
    }

    #[test]
    fn no_urls_means_no_candidate() {
        assert!(photo_with(&[]).url_for(PhotoSize::Large).is_none());
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(SourceError::Network("reset".into()).is_retryable());
        assert!(
            SourceError::Unavailable {
                status: 502,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!SourceError::NotFound("photo".into()).is_retryable());
        assert!(!SourceError::Unauthorized("key".into()).is_retryable());

        let throttled = SourceError::RateLimited {
            retry_after: Some(Duration::from_secs(4)),
        };
        assert!(throttled.is_retryable());
        assert_eq!(throttled.retry_after(), Some(Duration::from_secs(4)));
    }
}
