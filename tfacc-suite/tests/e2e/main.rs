//! E2E tests for the tfacc suite.
//!
//! The whole catalogue runs against the simulated FlexibleEngine tenant,
//! exercising rendering, scheduling, verification, import and cleanup
//! together without credentials.
//!
//! # Test Structure
//!
//! - `helpers/` -- Config builder and report assertions
//! - `scenarios/` -- Test files organized by flow
//!
//! # Running
//!
//! ```bash
//! cargo test -p tfacc-suite --test e2e
//! ```

mod helpers;
mod scenarios;
