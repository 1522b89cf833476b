//! Configuration types for flickr-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Largest accepted `retry.backoff_multiplier`
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

/// Environment variable holding the Flickr API key
pub const FLICKR_API_KEY_ENV: &str = "FLICKR_API_KEY";

/// Main configuration for [`PhotoDownloader`](crate::PhotoDownloader)
///
/// Every field has a default, so an empty JSON object is a valid config:
///
/// ```
/// let config: flickr_dl::Config = serde_json::from_str("{}").unwrap();
/// assert_eq!(config.download.max_concurrent_jobs, 2);
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Job execution settings (work directory, concurrency, pacing)
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry behavior for photo fetches
    #[serde(default)]
    pub retry: RetryConfig,

    /// How long finished jobs and their archives are kept
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Flickr REST API access
    #[serde(default)]
    pub flickr: FlickrConfig,

    /// API and external server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Check the settings that would otherwise only fail once a job runs
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_jobs == 0 {
            return Err(Error::Config {
                message: "max_concurrent_jobs must be at least 1".into(),
                key: Some("download.max_concurrent_jobs".into()),
            });
        }
        if self.download.workers == 0 {
            return Err(Error::Config {
                message: "workers must be at least 1".into(),
                key: Some("download.workers".into()),
            });
        }
        if self.download.requests_per_second == Some(0) {
            return Err(Error::Config {
                message: "requests_per_second must be positive (use null for unlimited)".into(),
                key: Some("download.requests_per_second".into()),
            });
        }
        if !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&self.retry.backoff_multiplier) {
            return Err(Error::Config {
                message: format!("backoff_multiplier must be between 1.0 and {MAX_BACKOFF_MULTIPLIER}"),
                key: Some("retry.backoff_multiplier".into()),
            });
        }
        if self.retention.sweep_interval.is_zero() {
            return Err(Error::Config {
                message: "sweep_interval must be at least 1 second".into(),
                key: Some("retention.sweep_interval".into()),
            });
        }
        Ok(())
    }
}

/// Job execution configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Directory holding per-job staging folders and finished archives (default: "./work")
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Maximum number of jobs running at once (default: 2)
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Photos fetched in parallel within one job (default: 1)
    ///
    /// Progress events are still emitted in plan order.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Photo source requests per second shared by all jobs (default: 1, None = unlimited)
    #[serde(default = "default_fetch_rate")]
    pub requests_per_second: Option<u32>,

    /// Leading consecutive retryable failures that mark the source as down (default: 3)
    ///
    /// Only applies while nothing in the job has succeeded yet. 0 disables the check.
    #[serde(default = "default_outage_threshold")]
    pub outage_threshold: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            workers: default_workers(),
            requests_per_second: default_fetch_rate(),
            outage_threshold: default_outage_threshold(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Retention of finished jobs
///
/// Completed jobs live until they are retrieved plus `grace_period`.
/// Failed and cancelled jobs live for `grace_period` after finishing.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetentionConfig {
    /// Time a finished job stays around (default: 600 seconds)
    #[serde(default = "default_grace_period", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub grace_period: Duration,

    /// Drop completed jobs nobody retrieved after this long (default: 3600 seconds, null for never)
    #[serde(default = "default_unclaimed_ttl", with = "optional_duration_serde")]
    #[schema(value_type = Option<u64>)]
    pub unclaimed_ttl: Option<Duration>,

    /// How often the cleanup task sweeps the registry (default: 60 seconds)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            grace_period: default_grace_period(),
            unclaimed_ttl: default_unclaimed_ttl(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

/// Flickr REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FlickrConfig {
    /// API key sent with every request
    #[serde(default)]
    pub api_key: Option<String>,

    /// REST endpoint (default: "https://api.flickr.com/services/rest/")
    #[serde(default = "default_flickr_endpoint")]
    pub endpoint: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub timeout: Duration,
}

impl Default for FlickrConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_flickr_endpoint(),
            timeout: default_request_timeout(),
        }
    }
}

impl FlickrConfig {
    /// Default settings with the API key taken from `FLICKR_API_KEY`
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(FLICKR_API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty()),
            ..Self::default()
        }
    }
}

/// API and external server integration configuration
///
/// Groups settings for external access and control interfaces.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:5000)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Optional API key for authentication
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Per-client rate limiting of the REST API
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RateLimitConfig {
    /// Enable rate limiting (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Requests per second per IP (default: 20)
    #[serde(default = "default_api_requests_per_second")]
    pub requests_per_second: u32,

    /// Burst size (default: 40)
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,

    /// Path prefixes exempt from rate limiting
    #[serde(default = "default_exempt_paths")]
    pub exempt_paths: Vec<String>,

    /// IPs exempt from rate limiting (e.g., localhost)
    #[serde(default = "default_exempt_ips")]
    #[schema(value_type = Vec<String>)]
    pub exempt_ips: Vec<std::net::IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: default_api_requests_per_second(),
            burst_size: default_burst_size(),
            exempt_paths: default_exempt_paths(),
            exempt_ips: default_exempt_ips(),
        }
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./work")
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_workers() -> usize {
    1
}

fn default_fetch_rate() -> Option<u32> {
    Some(1)
}

fn default_outage_threshold() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_grace_period() -> Duration {
    Duration::from_secs(600)
}

fn default_unclaimed_ttl() -> Option<Duration> {
    Some(Duration::from_secs(3600))
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_flickr_endpoint() -> String {
    "https://api.flickr.com/services/rest/".into()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_api_requests_per_second() -> u32 {
    20
}

fn default_burst_size() -> u32 {
    40
}

fn default_exempt_paths() -> Vec<String> {
    vec![
        "/health".to_string(),
        // event streams are long-lived and reconnect often
        "/jobs/".to_string(),
    ]
}

fn default_exempt_ips() -> Vec<std::net::IpAddr> {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    vec![
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(Ipv6Addr::LOCALHOST),
    ]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
