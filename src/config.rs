//! Configuration types for product-harvest

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder substituted with the identifier in [`ApiConfig::url_template`]
pub const ID_PLACEHOLDER: &str = "{id}";

/// Remote endpoint settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// URL template; `{id}` is replaced with the percent-encoded identifier
    #[serde(default = "default_url_template")]
    pub url_template: String,

    /// Per-request timeout (default: 10 seconds)
    #[serde(default = "default_timeout", with = "duration_serde", rename = "timeout_secs")]
    pub timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// How fetches are scheduled under the concurrency limit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Bounded-parallelism stream combinator (default)
    #[default]
    Buffered,
    /// One task per identifier, admitted by a counting semaphore
    Semaphore,
    /// Fixed pool of workers pulling from a shared queue
    Pool,
    /// One identifier at a time, in input order
    Sequential,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::Buffered => "buffered",
            Strategy::Semaphore => "semaphore",
            Strategy::Pool => "pool",
            Strategy::Sequential => "sequential",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "buffered" => Ok(Strategy::Buffered),
            "semaphore" => Ok(Strategy::Semaphore),
            "pool" => Ok(Strategy::Pool),
            "sequential" => Ok(Strategy::Sequential),
            other => Err(format!(
                "unknown strategy '{other}' (expected buffered, semaphore, pool or sequential)"
            )),
        }
    }
}

/// Scheduling settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum identifiers resolved at once (default: 50)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Scheduling strategy
    #[serde(default)]
    pub strategy: Strategy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            strategy: Strategy::default(),
        }
    }
}

/// Fixed-delay retry configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per identifier, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause after each failed attempt except the last (default: 1000 ms)
    #[serde(default = "default_retry_delay", with = "millis_serde", rename = "delay_ms")]
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_retry_delay(),
        }
    }
}

/// Layout of the per-category error logs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorLogFormat {
    /// `<error_dir>/<category>.txt`, one identifier per line, appended as failures arrive
    #[default]
    Lines,
    /// `<error_dir>/<category>/error_async_products.json`, written once at the end of the run
    Json,
}

/// Output locations and batching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for `products_<n>.json` batch files (default: "./products")
    #[serde(default = "default_success_dir")]
    pub success_dir: PathBuf,

    /// Directory for error logs (default: "./errors")
    #[serde(default = "default_error_dir")]
    pub error_dir: PathBuf,

    /// Records per batch file (default: 1000)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Error log layout
    #[serde(default)]
    pub error_log_format: ErrorLogFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            success_dir: default_success_dir(),
            error_dir: default_error_dir(),
            batch_size: default_batch_size(),
            error_log_format: ErrorLogFormat::default(),
        }
    }
}

/// Main configuration for [`Harvester`](crate::Harvester)
///
/// Every field has a default, so an empty JSON object is a valid config file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote endpoint
    #[serde(default)]
    pub api: ApiConfig,

    /// Scheduling
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Output layout
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.display()),
            key: None,
        })?;
        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config {
            message: format!("invalid configuration: {e}"),
            key: None,
        })
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fetch.concurrency == 0 {
            return Err(Error::config("fetch.concurrency", "concurrency must be > 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "retry.max_attempts",
                "at least one attempt is required",
            ));
        }
        if self.output.batch_size == 0 {
            return Err(Error::config("output.batch_size", "batch size must be > 0"));
        }
        if self.api.timeout.is_zero() {
            return Err(Error::config("api.timeout_secs", "timeout must be > 0"));
        }
        if !self.api.url_template.contains(ID_PLACEHOLDER) {
            return Err(Error::config(
                "api.url_template",
                format!("URL template must contain {ID_PLACEHOLDER}"),
            ));
        }

        let sample = self.api.url_template.replace(ID_PLACEHOLDER, "0");
        match url::Url::parse(&sample) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            Ok(url) => Err(Error::config(
                "api.url_template",
                format!("unsupported URL scheme '{}'", url.scheme()),
            )),
            Err(e) => Err(Error::config(
                "api.url_template",
                format!("invalid URL template: {e}"),
            )),
        }
    }
}

fn default_url_template() -> String {
    "https://api.tiki.vn/product-detail/api/v1/products/{id}".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_concurrency() -> usize {
    50
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_success_dir() -> PathBuf {
    PathBuf::from("./products")
}

fn default_error_dir() -> PathBuf {
    PathBuf::from("./errors")
}

fn default_batch_size() -> usize {
    1000
}

// Duration serialization helper (whole seconds)
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

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
