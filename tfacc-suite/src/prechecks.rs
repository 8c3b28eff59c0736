//! Environment prechecks shared by the scenario catalogue.
//!
//! A failed precheck marks the case as skipped instead of failed.

use tfacc_core::config::ProviderConfig;
use tfacc_runner::Precheck;

/// Name under which the region is reported when missing.
pub const REGION_VAR: &str = "OS_REGION_NAME";

/// Name under which the enterprise project id is reported when missing.
pub const EPS_ID_VAR: &str = "OS_ENTERPRISE_PROJECT_ID_TEST";

/// Every case needs a target region.
pub fn region(provider: &ProviderConfig) -> Precheck {
    Precheck::non_empty(REGION_VAR, &provider.region)
}

/// Cases that place resources in an enterprise project need its id.
pub fn enterprise_project(provider: &ProviderConfig) -> Precheck {
    Precheck::non_empty(EPS_ID_VAR, &provider.enterprise_project_id)
}
