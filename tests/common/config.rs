//! Test configuration helpers for mock servers and live credentials

use archive_fixture::Config;
use archive_fixture::config::{EndpointsConfig, WaitConfig};
use std::time::Duration;
use tempfile::TempDir;

/// Configuration pointing every endpoint at `base_url`, with zero-delay polling
///
/// The local upload file lives in `dir`; keep the `TempDir` alive for the test.
pub fn mock_config(base_url: &str, dir: &TempDir) -> Config {
    Config {
        access_key: "test-access".to_string(),
        secret_key: "test-secret".to_string(),
        test_item: "fixture-test-item".to_string(),
        local_filename: dir.path().join("hello.txt"),
        remote_filename: "hello.txt".to_string(),
        request_timeout: Duration::from_secs(5),
        endpoints: EndpointsConfig::with_base(base_url),
        wait: WaitConfig {
            max_retries: 5,
            interval: Duration::ZERO,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Whether live credentials are available (from the environment or a .env file)
pub fn has_live_credentials() -> bool {
    dotenvy::dotenv().ok();
    std::env::var("ARCHIVE_ACCESS_KEY").is_ok() && std::env::var("ARCHIVE_SECRET_KEY").is_ok()
}

/// Load configuration for live tests from `ARCHIVE_SETTINGS_DIR` (default: current directory)
pub fn load_live_config() -> archive_fixture::Result<Config> {
    let dir = std::env::var("ARCHIVE_SETTINGS_DIR").unwrap_or_else(|_| ".".to_string());
    Config::load(dir)
}
