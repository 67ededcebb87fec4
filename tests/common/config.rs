//! Test configuration helpers

use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

use product_harvest::{Config, ErrorLogFormat, Strategy};

/// Client timeout used by tests; stalled mocks must exceed it
pub const TEST_TIMEOUT: Duration = Duration::from_millis(300);

/// Config pointing at `server`, writing under `temp`, with fast retries
pub fn test_config(server: &MockServer, temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.api.url_template = format!("{}/products/{{id}}", server.uri());
    config.api.timeout = TEST_TIMEOUT;
    config.retry.delay = Duration::from_millis(10);
    config.fetch.concurrency = 20;
    config.output.success_dir = temp.path().join("products");
    config.output.error_dir = temp.path().join("errors");
    config
}

/// Same as [`test_config`] with a specific strategy and error log layout
pub fn test_config_with(
    server: &MockServer,
    temp: &TempDir,
    strategy: Strategy,
    format: ErrorLogFormat,
) -> Config {
    let mut config = test_config(server, temp);
    config.fetch.strategy = strategy;
    config.output.error_log_format = format;
    config
}
