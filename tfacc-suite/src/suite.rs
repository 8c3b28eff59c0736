//! Suite assembly.
//!
//! [`Suite`] owns the configuration, the template registry and the case
//! catalogue, and runs them with whichever driver factory the caller
//! picks: the Terraform CLI for live runs or the simulated tenant.

use std::sync::Arc;

use anyhow::{Context, Result};
use tfacc_core::config::{ProviderConfig, TfaccConfig};
use tfacc_core::naming::{NameGenerator, RandomNameGenerator};
use tfacc_hcl::{Block, Document, Expr, TemplateRegistry};
use tfacc_runner::{
    DriverFactory, MemoryCloud, MemoryDriverFactory, RunSettings, Scheduler, StageRunner,
    SuiteReport, TerraformDriverFactory, TestCase,
};

use crate::scenarios::{self, ScenarioContext};
use crate::simulated;

/// Registry source of the FlexibleEngine provider.
pub const PROVIDER_SOURCE: &str = "FlexibleEngineCloud/flexibleengine";

/// `terraform` and `provider` blocks written next to every configuration.
pub fn provider_preamble(provider: &ProviderConfig) -> Result<String> {
    let mut doc = Document::new();
    doc.push(
        Block::new("terraform").nested(Block::new("required_providers").attr(
            provider.name.as_str(),
            Expr::Object(vec![("source".to_owned(), Expr::str(PROVIDER_SOURCE))]),
        )),
    )?
    .push(
        Block::new("provider")
            .label(provider.name.as_str())
            .attr_opt(
                "region",
                (!provider.region.is_empty()).then_some(provider.region.as_str()),
            ),
    )?;
    Ok(doc.to_string())
}

/// Configured catalogue ready to run.
pub struct Suite {
    config: TfaccConfig,
    registry: Arc<TemplateRegistry>,
    cases: Vec<TestCase>,
}

impl Suite {
    /// Builds the catalogue with names drawn from the configured generator.
    pub fn new(config: TfaccConfig) -> Result<Self> {
        let names = RandomNameGenerator::new(&config.naming)
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        Self::with_names(config, &names)
    }

    /// Builds the catalogue with a caller-supplied name generator.
    pub fn with_names(config: TfaccConfig, names: &dyn NameGenerator) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        tfacc_core::metrics::describe_all();

        let registry = scenarios::registry().context("failed to register scenario templates")?;
        let cases = scenarios::catalogue(&ScenarioContext::new(&config.provider, names))
            .context("failed to build test cases")?;

        tracing::debug!(
            templates = registry.len(),
            cases = cases.len(),
            "suite assembled"
        );
        Ok(Self {
            config,
            registry: Arc::new(registry),
            cases,
        })
    }

    pub fn config(&self) -> &TfaccConfig {
        &self.config
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Runs every selected case with drivers from `factory`.
    pub async fn run(&self, factory: Arc<dyn DriverFactory>) -> Result<SuiteReport> {
        let runner = StageRunner::new(
            Arc::clone(&self.registry),
            factory,
            RunSettings::from_config(&self.config),
        );
        let scheduler = Scheduler::new(Arc::new(runner), self.config.runner.max_parallel)
            .with_filter(self.config.runner.filter.clone());

        let report = scheduler.run(self.cases.clone()).await?;
        tracing::info!(
            passed = report.passed(),
            cases = report.cases.len(),
            duration_ms = report.duration.as_millis() as u64,
            "suite finished"
        );
        Ok(report)
    }

    /// Runs against a fresh simulated tenant and returns it for inspection.
    pub async fn run_simulated(&self) -> Result<(SuiteReport, Arc<MemoryCloud>)> {
        let cloud = Arc::new(
            simulated::flexibleengine_cloud(&self.config.provider.region)
                .context("failed to build simulated tenant")?,
        );
        let factory = MemoryDriverFactory::new(Arc::clone(&cloud));
        let report = self.run(Arc::new(factory)).await?;
        Ok((report, cloud))
    }

    /// Runs against the real provider through the Terraform CLI.
    pub async fn run_terraform(&self) -> Result<SuiteReport> {
        let factory = TerraformDriverFactory::new(self.config.driver.clone())
            .with_preamble(provider_preamble(&self.config.provider)?);
        self.run(Arc::new(factory)).await
    }
}

impl std::fmt::Debug for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suite")
            .field("provider", &self.config.provider.name)
            .field("templates", &self.registry.len())
            .field("cases", &self.cases.len())
            .finish()
    }
}
