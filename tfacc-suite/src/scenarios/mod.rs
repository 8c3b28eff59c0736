//! Scenario catalogue.
//!
//! Templates are registered once per run; cases are built per run because
//! every case draws fresh resource names from the [`NameGenerator`].

pub mod dms;
pub mod evs;

use tfacc_core::config::ProviderConfig;
use tfacc_core::naming::{NameGenerator, Separator};
use tfacc_hcl::{HclError, TemplateRegistry};
use tfacc_runner::TestCase;

/// Inputs the case builders need from the run.
pub struct ScenarioContext<'a> {
    pub provider: &'a ProviderConfig,
    pub names: &'a dyn NameGenerator,
}

impl<'a> ScenarioContext<'a> {
    pub fn new(provider: &'a ProviderConfig, names: &'a dyn NameGenerator) -> Self {
        Self { provider, names }
    }

    /// Name for resources that accept dashes (DMS instances).
    pub fn dash_name(&self) -> String {
        self.names.resource_name(Separator::Dash)
    }

    /// Name for resources that only accept underscores.
    pub fn underscore_name(&self) -> String {
        self.names.resource_name(Separator::Underscore)
    }
}

/// Registry holding every scenario template.
pub fn registry() -> Result<TemplateRegistry, HclError> {
    let mut registry = TemplateRegistry::new();
    evs::register(&mut registry)?;
    dms::register(&mut registry)?;
    Ok(registry)
}

/// Every case of the catalogue, in declaration order.
pub fn catalogue(ctx: &ScenarioContext<'_>) -> Result<Vec<TestCase>, anyhow::Error> {
    let mut cases = evs::cases(ctx)?;
    cases.extend(dms::cases(ctx)?);
    Ok(cases)
}
