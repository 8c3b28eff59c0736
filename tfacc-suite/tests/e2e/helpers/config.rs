//! Test configuration builder for E2E tests.
//!
//! Provides [`TestConfigBuilder`] for creating `TfaccConfig` instances
//! with a region, deterministic names and fast timeouts.

use std::io::Write;

use tempfile::NamedTempFile;
use tfacc_core::config::TfaccConfig;

pub const TEST_REGION: &str = "eu-west-0";
pub const TEST_EPS_ID: &str = "eps-e2e";

/// Builder for test-friendly `TfaccConfig` instances.
///
/// By default the region is set, no enterprise project is configured and
/// names are drawn from a fixed seed.
#[allow(dead_code)]
pub struct TestConfigBuilder {
    config: TfaccConfig,
}

#[allow(dead_code)]
impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = TfaccConfig::default();
        config.provider.region = TEST_REGION.to_owned();
        config.naming.seed = Some(20240101);
        config.driver.apply_timeout_secs = 30;
        config.driver.destroy_timeout_secs = 30;
        config.driver.import_timeout_secs = 30;
        config.driver.read_timeout_secs = 30;
        Self { config }
    }

    /// Clear the region so every case fails its precheck.
    pub fn without_region(mut self) -> Self {
        self.config.provider.region = String::new();
        self
    }

    pub fn enterprise_project(mut self, id: &str) -> Self {
        self.config.provider.enterprise_project_id = id.to_owned();
        self
    }

    pub fn filter(mut self, patterns: &[&str]) -> Self {
        self.config.runner.filter = patterns.iter().map(|p| (*p).to_owned()).collect();
        self
    }

    pub fn max_parallel(mut self, n: usize) -> Self {
        self.config.runner.max_parallel = n;
        self
    }

    pub fn build(self) -> TfaccConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `content` to a temporary `.toml` file.
#[allow(dead_code)]
pub fn write_config_file(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("failed to create temp config file");
    file.write_all(content.as_bytes())
        .expect("failed to write temp config file");
    file
}
