//! Precheck skips.

use tfacc_runner::CaseStatus;
use tfacc_suite::Suite;
use tfacc_suite::prechecks::{EPS_ID_VAR, REGION_VAR};
use tfacc_suite::scenarios::dms;

use crate::helpers::assertions::*;
use crate::helpers::config::*;

#[tokio::test]
async fn test_e2e_missing_region_skips_everything() {
    let suite = Suite::new(TestConfigBuilder::new().without_region().build()).unwrap();

    let (report, cloud) = suite.run_simulated().await.unwrap();

    assert!(report.passed(), "skipped cases are not failures");
    assert_eq!(report.count(CaseStatus::Skipped), 8);
    assert_skipped(&report, dms::BASIC, REGION_VAR);
    assert_eq!(cloud.stats().created, 0);
}

#[tokio::test]
async fn test_e2e_missing_eps_id_skips_only_eps_case() {
    let suite = Suite::new(TestConfigBuilder::new().build()).unwrap();

    let (report, _) = suite.run_simulated().await.unwrap();

    assert!(report.passed(), "{report}");
    assert_eq!(report.count(CaseStatus::Passed), 7, "{report}");
    assert_skipped(&report, dms::WITH_EPS_ID, EPS_ID_VAR);
}
