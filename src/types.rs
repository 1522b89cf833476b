//! Core types for flickr-dl

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a download job
///
/// Twelve lowercase hex characters taken from a random v4 UUID.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Length of a generated id
    pub const LEN: usize = 12;

    /// Generate a fresh random id
    pub fn generate() -> Self {
        let mut hex = uuid::Uuid::new_v4().simple().to_string();
        hex.truncate(Self::LEN);
        Self(hex)
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a job
///
/// `Running` is the only non-terminal state. Each job leaves it exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Work plan is being executed
    Running,
    /// Archive is ready for retrieval
    Completed,
    /// Plan-level or infrastructure failure
    Failed,
    /// Stopped at the user's request
    Cancelled,
}

impl JobState {
    /// Whether the job has reached its final state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Running)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Progress event published by a running job
///
/// Serialized with a `type` tag, e.g. `{"type":"progress","current":3,"total":10}`.
/// Every job publishes exactly one terminal event (`complete`, `error` or `cancelled`)
/// and nothing after it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// One more item was processed
    Progress {
        /// Items processed so far
        current: usize,
        /// Items in the work plan
        total: usize,
    },

    /// Human-readable note (e.g. a single photo failed)
    Log {
        /// Log line
        message: String,
    },

    /// All items processed, archive is being written
    Zipping,

    /// Archive is ready
    Complete {
        /// Summary of the run
        message: String,
        /// Whether an archive can be retrieved
        file_ready: bool,
        /// Job the archive belongs to
        job_id: JobId,
    },

    /// The job failed
    Error {
        /// Failure description
        message: String,
    },

    /// The job was cancelled
    Cancelled,
}

impl Event {
    /// Whether this event ends the job's stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::Complete { .. } | Event::Error { .. } | Event::Cancelled
        )
    }

    /// The `type` tag of this event, also used as the SSE event name
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Progress { .. } => "progress",
            Event::Log { .. } => "log",
            Event::Zipping => "zipping",
            Event::Complete { .. } => "complete",
            Event::Error { .. } => "error",
            Event::Cancelled => "cancelled",
        }
    }
}

/// Photo size, named after the Flickr `extras` URL key
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    ToSchema,
)]
pub enum PhotoSize {
    /// Square 75
    #[serde(rename = "url_sq")]
    Square,
    /// Thumbnail 100
    #[serde(rename = "url_t")]
    Thumbnail,
    /// Small 240
    #[serde(rename = "url_s")]
    Small,
    /// Small 320
    #[serde(rename = "url_n")]
    Small320,
    /// Medium 500
    #[serde(rename = "url_m")]
    Medium,
    /// Medium 640
    #[serde(rename = "url_z")]
    Medium640,
    /// Medium 800
    #[serde(rename = "url_c")]
    Medium800,
    /// Large 1024
    #[default]
    #[serde(rename = "url_l")]
    Large,
    /// Large 1600
    #[serde(rename = "url_h")]
    Large1600,
    /// Original upload
    #[serde(rename = "url_o")]
    Original,
}

impl PhotoSize {
    /// All sizes from smallest to largest
    pub const LADDER: [PhotoSize; 10] = [
        PhotoSize::Square,
        PhotoSize::Thumbnail,
        PhotoSize::Small,
        PhotoSize::Small320,
        PhotoSize::Medium,
        PhotoSize::Medium640,
        PhotoSize::Medium800,
        PhotoSize::Large,
        PhotoSize::Large1600,
        PhotoSize::Original,
    ];

    /// The `extras` key carrying this size's URL
    pub fn url_key(&self) -> &'static str {
        match self {
            PhotoSize::Square => "url_sq",
            PhotoSize::Thumbnail => "url_t",
            PhotoSize::Small => "url_s",
            PhotoSize::Small320 => "url_n",
            PhotoSize::Medium => "url_m",
            PhotoSize::Medium640 => "url_z",
            PhotoSize::Medium800 => "url_c",
            PhotoSize::Large => "url_l",
            PhotoSize::Large1600 => "url_h",
            PhotoSize::Original => "url_o",
        }
    }

    /// Parse an `extras` key such as `url_z`
    pub fn from_url_key(key: &str) -> Option<Self> {
        Self::LADDER.into_iter().find(|size| size.url_key() == key)
    }

    /// Map a `flickr.photos.getSizes` label such as "Medium 640"
    pub fn from_label(label: &str) -> Option<Self> {
        let size = match label {
            "Square" | "Large Square" => PhotoSize::Square,
            "Thumbnail" => PhotoSize::Thumbnail,
            "Small" => PhotoSize::Small,
            "Small 320" | "Small 400" => PhotoSize::Small320,
            "Medium" => PhotoSize::Medium,
            "Medium 640" => PhotoSize::Medium640,
            "Medium 800" => PhotoSize::Medium800,
            "Large" => PhotoSize::Large,
            "Large 1600" | "Large 2048" => PhotoSize::Large1600,
            "Original" => PhotoSize::Original,
            _ => return None,
        };
        Some(size)
    }

    /// Position in [`PhotoSize::LADDER`]
    pub fn rank(&self) -> usize {
        *self as usize
    }
}

/// How multiple search tags are combined
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TagMode {
    /// Photos with any of the tags
    #[default]
    Any,
    /// Photos with all of the tags
    All,
}

impl TagMode {
    /// Value of the `tag_mode` API parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            TagMode::Any => "any",
            TagMode::All => "all",
        }
    }
}

/// Search result ordering
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Best match first
    #[default]
    Relevance,
    /// Newest uploads first
    DatePostedDesc,
    /// Oldest uploads first
    DatePostedAsc,
    /// Most recently taken first
    DateTakenDesc,
    /// Earliest taken first
    DateTakenAsc,
    /// Most interesting first
    InterestingnessDesc,
    /// Least interesting first
    InterestingnessAsc,
}

impl SortOrder {
    /// Value of the `sort` API parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance",
            SortOrder::DatePostedDesc => "date-posted-desc",
            SortOrder::DatePostedAsc => "date-posted-asc",
            SortOrder::DateTakenDesc => "date-taken-desc",
            SortOrder::DateTakenAsc => "date-taken-asc",
            SortOrder::InterestingnessDesc => "interestingness-desc",
            SortOrder::InterestingnessAsc => "interestingness-asc",
        }
    }
}

/// Which part of a user's photos to download
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlbumSelection {
    /// All public photos of the user
    #[default]
    Photostream,
    /// One album (photoset)
    Album {
        /// Album identifier
        album_id: String,
        /// Album title, used for the job label
        #[serde(default)]
        title: Option<String>,
    },
}

/// What to download
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownloadTarget {
    /// The interestingness feed of one day
    Interestingness {
        /// Day of the feed
        #[schema(value_type = String, format = Date)]
        date: NaiveDate,
        /// Keep only photos owned by this user
        #[serde(default)]
        user_id: Option<String>,
    },

    /// A photo search
    Search {
        /// Free-text query
        #[serde(default)]
        text: String,
        /// Tags to match
        #[serde(default)]
        tags: Vec<String>,
        /// Whether any or all tags must match
        #[serde(default)]
        tag_mode: TagMode,
        /// Result ordering
        #[serde(default)]
        sort: SortOrder,
        /// License ids to restrict to (empty = any)
        #[serde(default)]
        licenses: Vec<String>,
        /// Restrict to one user's photos
        #[serde(default)]
        user_id: Option<String>,
    },

    /// A user's photostream or one of their albums
    UserAlbum {
        /// Username, profile URL or NSID
        user: String,
        /// Photostream or album
        #[serde(default)]
        selection: AlbumSelection,
    },
}

impl DownloadTarget {
    /// Largest number of photos one request may ask for, `None` when `count` is ignored
    pub fn count_ceiling(&self) -> Option<u32> {
        match self {
            DownloadTarget::Interestingness { .. } => Some(500),
            DownloadTarget::Search { .. } => Some(4000),
            DownloadTarget::UserAlbum {
                selection: AlbumSelection::Photostream,
                ..
            } => Some(5000),
            DownloadTarget::UserAlbum {
                selection: AlbumSelection::Album { .. },
                ..
            } => None,
        }
    }
}

/// Options shared by every request kind
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DownloadOptions {
    /// Preferred photo size (default: url_l)
    #[serde(default)]
    pub size: PhotoSize,

    /// Attach title/description/tags to JPEG files (default: true)
    #[serde(default = "default_true")]
    pub embed_metadata: bool,

    /// Filename template with `{id}`, `{title}` and `{owner}` placeholders
    #[serde(default = "default_filename_template")]
    pub filename_template: String,

    /// Number of photos to download (default: 100)
    #[serde(default = "default_count")]
    pub count: u32,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            size: PhotoSize::default(),
            embed_metadata: true,
            filename_template: default_filename_template(),
            count: default_count(),
        }
    }
}

/// A multi-photo download request
///
/// ```
/// use flickr_dl::types::{DownloadRequest, DownloadTarget};
///
/// let request: DownloadRequest = serde_json::from_str(
///     r#"{"kind": "search", "text": "lighthouse", "count": 20}"#,
/// ).unwrap();
/// assert!(matches!(request.target, DownloadTarget::Search { .. }));
/// assert_eq!(request.options.count, 20);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// What to download
    #[serde(flatten)]
    pub target: DownloadTarget,

    /// How to download it
    #[serde(flatten)]
    pub options: DownloadOptions,
}

impl DownloadRequest {
    /// Request with default options
    pub fn new(target: DownloadTarget) -> Self {
        Self {
            target,
            options: DownloadOptions::default(),
        }
    }

    /// Set the number of photos
    pub fn with_count(mut self, count: u32) -> Self {
        self.options.count = count;
        self
    }

    /// Set the preferred size
    pub fn with_size(mut self, size: PhotoSize) -> Self {
        self.options.size = size;
        self
    }

    /// Enable or disable metadata embedding
    pub fn with_embed_metadata(mut self, embed: bool) -> Self {
        self.options.embed_metadata = embed;
        self
    }
}

/// Snapshot of a job for status queries
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobInfo {
    /// Job identifier
    pub id: JobId,
    /// Human-readable description of the work
    pub label: String,
    /// Current state
    pub state: JobState,
    /// Items processed so far
    pub current: usize,
    /// Items in the work plan
    pub total: usize,
    /// Whether the archive can be retrieved
    pub file_ready: bool,
    /// When the job was started
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<Utc>,
    /// When the job reached its terminal state
    #[schema(value_type = Option<String>, format = DateTime)]
    pub finished_at: Option<DateTime<Utc>>,
    /// When the archive was first retrieved
    #[schema(value_type = Option<String>, format = DateTime)]
    pub retrieved_at: Option<DateTime<Utc>>,
}

/// One photo of a preview
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PreviewItem {
    /// Photo identifier
    pub id: String,
    /// Title
    pub title: String,
    /// Owner display name
    pub owner: String,
    /// When the photo was taken
    pub date_taken: Option<String>,
    /// Smallest offered image, for thumbnails
    pub thumb_url: Option<String>,
}

/// What a request would download, without starting a job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Preview {
    /// Human-readable description of the work
    pub label: String,
    /// Number of photos the job would fetch
    pub total: usize,
    /// The first photos of the plan
    pub items: Vec<PreviewItem>,
}

/// A resolved account with its albums
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserAlbums {
    /// Account id (NSID)
    pub nsid: String,
    /// Display username
    pub username: String,
    /// Albums owned by the account
    pub albums: Vec<crate::source::Album>,
}

fn default_true() -> bool {
    true
}

fn default_filename_template() -> String {
    "{title}_{id}".into()
}

fn default_count() -> u32 {
    100
}
