//! Configuration types for archive-fixture
//!
//! Settings are read from JSON files with PascalCase keys so the same
//! `appsettings.json` / `appsettings.private.json` pair used by other archive
//! client test suites can be reused. See [`Config::load`] for layering.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shared settings file, required
pub const SETTINGS_FILE: &str = "appsettings.json";

/// Private settings file holding credentials, optional
pub const PRIVATE_SETTINGS_FILE: &str = "appsettings.private.json";

/// Environment variables that override individual settings keys
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("ARCHIVE_ACCESS_KEY", "AccessKey"),
    ("ARCHIVE_SECRET_KEY", "SecretKey"),
    ("ARCHIVE_TEST_ITEM", "TestItem"),
    ("ARCHIVE_LOCAL_FILENAME", "LocalFilename"),
    ("ARCHIVE_REMOTE_FILENAME", "RemoteFilename"),
    ("ARCHIVE_LOG_LEVEL", "LogLevel"),
];

/// Retry configuration for transient transport failures
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5, 0 disables retrying)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
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
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries: the first failure is final
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// Task queue settlement polling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitConfig {
    /// Maximum number of status queries before giving up (default: 200)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between status queries (default: 3 seconds)
    #[serde(default = "default_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Retry policy for failed status queries (default: disabled, failures are fatal)
    #[serde(default = "RetryConfig::disabled")]
    pub transport_retry: RetryConfig,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            interval: default_interval(),
            transport_retry: RetryConfig::disabled(),
        }
    }
}

/// Baseline metadata and wording used when provisioning test items
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionConfig {
    /// Collection every test item is filed under (default: "test_collection")
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Media type of test items (default: "texts")
    #[serde(default = "default_mediatype")]
    pub mediatype: String,

    /// Keep test items out of search indexes (default: true)
    #[serde(default = "default_true")]
    pub noindex: bool,

    /// Justification attached to visibility tasks (default: "used in automated tests")
    #[serde(default = "default_task_comment")]
    pub task_comment: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            mediatype: default_mediatype(),
            noindex: true,
            task_comment: default_task_comment(),
        }
    }
}

/// Base URLs of the remote service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointsConfig {
    /// Item metadata read endpoint (default: "https://archive.org/metadata")
    #[serde(default = "default_metadata_url")]
    pub metadata: String,

    /// Task submission and status endpoint (default: "https://archive.org/services/tasks.php")
    #[serde(default = "default_tasks_url")]
    pub tasks: String,

    /// S3-like upload endpoint (default: "https://s3.us.archive.org")
    #[serde(default = "default_s3_url")]
    pub s3: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            metadata: default_metadata_url(),
            tasks: default_tasks_url(),
            s3: default_s3_url(),
        }
    }
}

impl EndpointsConfig {
    /// Point every endpoint at one base URL (used with mock servers)
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            metadata: format!("{base}/metadata"),
            tasks: format!("{base}/services/tasks.php"),
            s3: format!("{base}/s3"),
        }
    }
}

/// Main configuration for archive-fixture
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// S3-style access key
    #[serde(default)]
    pub access_key: String,

    /// S3-style secret key
    #[serde(default)]
    pub secret_key: String,

    /// Identifier of the long-lived test item
    #[serde(default)]
    pub test_item: String,

    /// Local file uploaded into provisioned items (default: "hello.txt")
    #[serde(default = "default_filename")]
    pub local_filename: PathBuf,

    /// File name used inside provisioned items (default: "hello.txt")
    #[serde(default = "default_remote_filename")]
    pub remote_filename: String,

    /// Log level used when `RUST_LOG` is not set (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Per-request timeout (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Ask the service to schedule our tasks at interactive priority (default: true)
    #[serde(default = "default_true")]
    pub interactive_priority: bool,

    /// Settlement polling
    #[serde(default)]
    pub wait: WaitConfig,

    /// Test item provisioning
    #[serde(default)]
    pub provision: ProvisionConfig,

    /// Remote service endpoints
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            test_item: String::new(),
            local_filename: default_filename(),
            remote_filename: default_remote_filename(),
            log_level: default_log_level(),
            request_timeout: default_request_timeout(),
            interactive_priority: true,
            wait: WaitConfig::default(),
            provision: ProvisionConfig::default(),
            endpoints: EndpointsConfig::default(),
        }
    }
}

impl Config {
    /// Load layered configuration from `dir`
    ///
    /// Layers, later ones overriding earlier ones key by key:
    /// 1. `appsettings.json` (required)
    /// 2. `appsettings.private.json` (optional)
    /// 3. environment variables listed in [`ENV_OVERRIDES`], with a `.env` file honored
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        let env: Vec<(String, String)> = ENV_OVERRIDES
            .iter()
            .filter_map(|(var, _)| std::env::var(var).ok().map(|v| ((*var).to_string(), v)))
            .collect();
        Self::load_with_env(dir, env)
    }

    /// Same as [`Config::load`] but with an explicit set of environment variables
    pub fn load_with_env(
        dir: impl AsRef<Path>,
        env: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let mut merged = read_settings(&dir.join(SETTINGS_FILE))?.ok_or_else(|| {
            Error::config(
                SETTINGS_FILE,
                format!("{} not found in {}", SETTINGS_FILE, dir.display()),
            )
        })?;

        if let Some(private) = read_settings(&dir.join(PRIVATE_SETTINGS_FILE))? {
            tracing::debug!(file = PRIVATE_SETTINGS_FILE, "applying private settings");
            merge_json(&mut merged, private);
        }

        if let Value::Object(map) = &mut merged {
            for (var, value) in env {
                if let Some((_, key)) = ENV_OVERRIDES.iter().find(|(name, _)| *name == var) {
                    tracing::debug!(var = %var, key = %key, "applying environment override");
                    map.insert((*key).to_string(), Value::String(value));
                }
            }
        }

        let config: Config = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot enforce
    pub fn validate(&self) -> Result<()> {
        if self.wait.max_retries == 0 {
            return Err(Error::config(
                "Wait.MaxRetries",
                "must allow at least one status query",
            ));
        }
        if self.wait.transport_retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "Wait.TransportRetry.BackoffMultiplier",
                "must be at least 1.0",
            ));
        }
        if self.test_item.trim().is_empty() {
            return Err(Error::config("TestItem", "test item identifier is empty"));
        }
        if self.local_filename.as_os_str().is_empty() {
            return Err(Error::config("LocalFilename", "local file name is empty"));
        }
        if self.remote_filename.trim().is_empty() {
            return Err(Error::config("RemoteFilename", "remote file name is empty"));
        }
        Ok(())
    }

    /// Require credentials before talking to the service
    pub fn require_credentials(&self) -> Result<()> {
        if self.access_key.is_empty() {
            return Err(Error::config(
                "AccessKey",
                format!(
                    "to run tests, create {} or set ARCHIVE_ACCESS_KEY and ARCHIVE_SECRET_KEY",
                    PRIVATE_SETTINGS_FILE
                ),
            ));
        }
        Ok(())
    }
}

fn read_settings(path: &Path) -> Result<Option<Value>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Recursively merge `overlay` into `base`; objects merge, everything else replaces
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
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

fn default_max_retries() -> u32 {
    200
}

fn default_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_collection() -> String {
    "test_collection".to_string()
}

fn default_mediatype() -> String {
    "texts".to_string()
}

fn default_task_comment() -> String {
    "used in automated tests".to_string()
}

fn default_metadata_url() -> String {
    "https://archive.org/metadata".to_string()
}

fn default_tasks_url() -> String {
    "https://archive.org/services/tasks.php".to_string()
}

fn default_s3_url() -> String {
    "https://s3.us.archive.org".to_string()
}

fn default_filename() -> PathBuf {
    PathBuf::from("hello.txt")
}

fn default_remote_filename() -> String {
    "hello.txt".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
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
