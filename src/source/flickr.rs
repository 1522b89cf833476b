//! Flickr REST API photo source

use super::traits::{
    Album, Photo, PhotoSource, SearchParams, SizeUrl, SourceError, SourceResult, UserInfo,
};
use crate::config::FlickrConfig;
use crate::error::{Error, Result};
use crate::types::PhotoSize;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// Items per page; the API maximum
const PER_PAGE: usize = 500;

/// Extras requested with every listing so photos carry URLs and metadata
const EXTRAS: &str = "url_sq,url_t,url_s,url_n,url_m,url_z,url_c,url_l,url_h,url_o,\
                      description,tags,owner_name,date_taken";

/// Photo source backed by the Flickr REST API
///
/// ```no_run
/// use flickr_dl::config::FlickrConfig;
/// use flickr_dl::source::{FlickrSource, PhotoSource};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = FlickrSource::new(&FlickrConfig::from_env())?;
/// let user = source.resolve_user("flickr.com/photos/someone").await?;
/// println!("{} is {}", user.username, user.nsid);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct FlickrSource {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl FlickrSource {
    /// Build a source from configuration; an API key is required
    pub fn new(config: &FlickrConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Config {
                message: "a Flickr API key is required".into(),
                key: Some("flickr.api_key".into()),
            })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("flickr-dl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }

    /// Call one REST method and return the decoded JSON body
    async fn call(&self, method: &str, params: &[(&str, String)]) -> SourceResult<Value> {
        let mut query: Vec<(&str, String)> = vec![
            ("method", method.to_string()),
            ("api_key", self.api_key.clone()),
            ("format", "json".into()),
            ("nojsoncallback", "1".into()),
        ];
        query.extend(params.iter().cloned());

        tracing::debug!(method, "calling Flickr API");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(network_error)?;

        let response = check_status(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        if body["stat"] == "fail" {
            let code = body["code"].as_i64().unwrap_or_default();
            let message = body["message"].as_str().unwrap_or("unknown error").to_string();
            return Err(match code {
                // "User not found", "Photoset not found", "Photo not found"
                1 | 2 => SourceError::NotFound(message),
                98 | 99 | 100 => SourceError::Unauthorized(message),
                105 => SourceError::Unavailable { status: 0, message },
                _ => SourceError::Api { code, message },
            });
        }

        Ok(body)
    }

    /// Walk a paginated photo listing until `limit` photos were collected
    async fn paged_photos(
        &self,
        method: &str,
        container: &str,
        params: Vec<(&str, String)>,
        limit: Option<usize>,
    ) -> SourceResult<Vec<Photo>> {
        let per_page = limit.map_or(PER_PAGE, |l| l.clamp(1, PER_PAGE));
        let mut photos = Vec::new();
        let mut page = 1u64;

        loop {
            let mut page_params = params.clone();
            page_params.push(("extras", EXTRAS.into()));
            page_params.push(("per_page", per_page.to_string()));
            page_params.push(("page", page.to_string()));

            let body = self.call(method, &page_params).await?;
            let listing = &body[container];
            let batch = listing["photo"]
                .as_array()
                .ok_or_else(|| SourceError::Decode(format!("{container}.photo missing")))?;

            // photoset listings carry the owner on the container
            let fallback_owner = lenient_str(&listing["owner"]);
            let fallback_name = lenient_str(&listing["ownername"]);

            if batch.is_empty() {
                break;
            }
            photos.extend(
                batch
                    .iter()
                    .map(|raw| parse_photo(raw, &fallback_owner, &fallback_name)),
            );

            if limit.is_some_and(|l| photos.len() >= l) {
                break;
            }
            let pages = lenient_u64(&listing["pages"]).unwrap_or(1);
            if page >= pages {
                break;
            }
            page += 1;
        }

        if let Some(limit) = limit {
            photos.truncate(limit);
        }
        Ok(photos)
    }

    async fn lookup_url(&self, url: &str) -> SourceResult<UserInfo> {
        let url = if url.starts_with("http") {
            url.to_string()
        } else {
            format!("https://{url}")
        };
        let body = self.call("flickr.urls.lookupUser", &[("url", url)]).await?;
        Ok(UserInfo {
            nsid: lenient_str(&body["user"]["id"]),
            username: content(&body["user"]["username"]),
        })
    }

    async fn find_by_username(&self, username: &str) -> SourceResult<UserInfo> {
        let body = self
            .call(
                "flickr.people.findByUsername",
                &[("username", username.to_string())],
            )
            .await?;
        Ok(UserInfo {
            nsid: lenient_str(&body["user"]["nsid"]),
            username: content(&body["user"]["username"]),
        })
    }
}

#[async_trait]
impl PhotoSource for FlickrSource {
    async fn resolve_user(&self, query: &str) -> SourceResult<UserInfo> {
        let query = query.trim();

        if query.contains('/') || query.to_ascii_lowercase().contains("flickr.com") {
            match self.lookup_url(query).await {
                Ok(user) if !user.nsid.is_empty() => return Ok(user),
                Ok(_) => {}
                // keep retryable failures visible instead of masking them as "not found"
                Err(e @ (SourceError::RateLimited { .. }
                | SourceError::Network(_)
                | SourceError::Unavailable { .. })) => return Err(e),
                Err(e) => {
                    tracing::debug!(error = %e, "URL lookup failed, trying as username");
                }
            }
        }

        let user = self.find_by_username(query).await?;
        if user.nsid.is_empty() {
            return Err(SourceError::NotFound(format!("user '{query}'")));
        }
        Ok(user)
    }

    async fn list_albums(&self, user_id: &str) -> SourceResult<Vec<Album>> {
        let mut albums = Vec::new();
        let mut page = 1u64;

        loop {
            let body = self
                .call(
                    "flickr.photosets.getList",
                    &[
                        ("user_id", user_id.to_string()),
                        ("per_page", PER_PAGE.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;
            let listing = &body["photosets"];
            let batch = listing["photoset"].as_array().cloned().unwrap_or_default();

            albums.extend(batch.iter().map(|set| Album {
                id: lenient_str(&set["id"]),
                title: content(&set["title"]),
                photos: lenient_u64(&set["photos"]).unwrap_or(0) as u32,
            }));

            let pages = lenient_u64(&listing["pages"]).unwrap_or(1);
            if batch.is_empty() || page >= pages {
                break;
            }
            page += 1;
        }

        Ok(albums)
    }

    async fn search(&self, params: &SearchParams) -> SourceResult<Vec<Photo>> {
        let mut query = vec![
            ("sort", params.sort.as_str().to_string()),
            ("safe_search", "1".to_string()),
        ];
        if !params.text.trim().is_empty() {
            query.push(("text", params.text.trim().to_string()));
        }
        if !params.tags.is_empty() {
            query.push(("tags", params.tags.join(",")));
            query.push(("tag_mode", params.tag_mode.as_str().to_string()));
        }
        if !params.licenses.is_empty() {
            query.push(("license", params.licenses.join(",")));
        }
        if let Some(user_id) = params.user_id.as_ref().filter(|u| !u.is_empty()) {
            query.push(("user_id", user_id.clone()));
        }

        self.paged_photos("flickr.photos.search", "photos", query, Some(params.limit))
            .await
    }

    async fn list_album(&self, user_id: &str, album_id: &str) -> SourceResult<Vec<Photo>> {
        self.paged_photos(
            "flickr.photosets.getPhotos",
            "photoset",
            vec![
                ("user_id", user_id.to_string()),
                ("photoset_id", album_id.to_string()),
            ],
            None,
        )
        .await
    }

    async fn list_photostream(&self, user_id: &str, limit: usize) -> SourceResult<Vec<Photo>> {
        self.paged_photos(
            "flickr.people.getPublicPhotos",
            "photos",
            vec![("user_id", user_id.to_string())],
            Some(limit),
        )
        .await
    }

    async fn list_interestingness(
        &self,
        date: NaiveDate,
        limit: usize,
    ) -> SourceResult<Vec<Photo>> {
        self.paged_photos(
            "flickr.interestingness.getList",
            "photos",
            vec![("date", date.format("%Y-%m-%d").to_string())],
            Some(limit),
        )
        .await
    }

    async fn photo_sizes(&self, photo_id: &str) -> SourceResult<Vec<SizeUrl>> {
        let body = self
            .call("flickr.photos.getSizes", &[("photo_id", photo_id.to_string())])
            .await?;

        let sizes = body["sizes"]["size"]
            .as_array()
            .ok_or_else(|| SourceError::Decode("sizes.size missing".into()))?;

        Ok(sizes
            .iter()
            .filter_map(|entry| {
                let url = entry["source"].as_str()?.to_string();
                let label = lenient_str(&entry["label"]);
                Some(SizeUrl {
                    size: PhotoSize::from_label(&label),
                    label,
                    url,
                })
            })
            .collect())
    }

    async fn fetch_bytes(&self, url: &str) -> SourceResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await.map_err(network_error)?;
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &'static str {
        "flickr"
    }
}

fn network_error(error: reqwest::Error) -> SourceError {
    SourceError::Network(error.to_string())
}

/// Classify non-success HTTP responses
async fn check_status(response: reqwest::Response) -> SourceResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(SourceError::RateLimited { retry_after });
    }

    let message = response.text().await.unwrap_or_default();
    let message = crate::utils::truncate_chars(message.trim(), 200).to_string();

    Err(match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => SourceError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Unauthorized(message),
        s if s.is_server_error() => SourceError::Unavailable {
            status: s.as_u16(),
            message,
        },
        s => SourceError::Api {
            code: i64::from(s.as_u16()),
            message,
        },
    })
}

/// Convert one raw listing entry into a [`Photo`]
fn parse_photo(raw: &Value, fallback_owner: &str, fallback_name: &str) -> Photo {
    let urls = PhotoSize::LADDER
        .iter()
        .filter_map(|size| {
            raw[size.url_key()]
                .as_str()
                .filter(|url| !url.is_empty())
                .map(|url| (*size, url.to_string()))
        })
        .collect();

    let owner_id = match lenient_str(&raw["owner"]) {
        owner if owner.is_empty() => fallback_owner.to_string(),
        owner => owner,
    };
    let owner_name = match lenient_str(&raw["ownername"]) {
        name if name.is_empty() => fallback_name.to_string(),
        name => name,
    };

    Photo {
        id: lenient_str(&raw["id"]),
        title: content(&raw["title"]),
        owner_name,
        owner_id,
        description: content(&raw["description"]),
        tags: lenient_str(&raw["tags"])
            .split_whitespace()
            .map(str::to_string)
            .collect(),
        date_taken: raw["datetaken"].as_str().map(str::to_string),
        urls,
    }
}

/// Read a field that may be a plain string or a `{"_content": ...}` object
fn content(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .get("_content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        other => lenient_str(other),
    }
}

fn lenient_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Page counts arrive as numbers or numeric strings depending on the method
fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
