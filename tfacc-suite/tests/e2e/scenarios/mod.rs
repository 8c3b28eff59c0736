//! E2E test scenarios.

mod catalogue;
mod config_loading;
mod fault_isolation;
mod filtering;
mod prechecks;
