//! FlexibleEngine acceptance suite.
//!
//! The scenario catalogue (EVS volumes and DMS RabbitMQ) expressed as
//! tfacc templates and cases, plus the pieces needed to run it:
//!
//! - [`suite::Suite`] assembles registry and cases from a `TfaccConfig`
//! - [`simulated`] provides an in-memory tenant for credential-free runs
//! - [`logging`] installs the tracing subscriber
//!
//! Live runs go through `tests/live.rs` and require `TF_ACC=1`.

pub mod fixtures;
pub mod logging;
pub mod prechecks;
pub mod scenarios;
pub mod simulated;
pub mod suite;

pub use suite::{Suite, provider_preamble};
