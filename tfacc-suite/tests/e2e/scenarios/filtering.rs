//! Case selection by name filter.

use tfacc_suite::Suite;
use tfacc_suite::scenarios::{dms, evs};

use crate::helpers::assertions::*;
use crate::helpers::config::*;

#[tokio::test]
async fn test_e2e_filter_runs_matching_cases_only() {
    let config = TestConfigBuilder::new().filter(&["evs_"]).build();
    let suite = Suite::new(config).unwrap();

    let (report, _) = suite.run_simulated().await.unwrap();

    assert_eq!(report.cases.len(), 1, "{report}");
    assert_passed(&report, evs::VOLUMES_BASIC);
    assert!(report.case(dms::BASIC).is_none());
}

#[tokio::test]
async fn test_e2e_filter_matches_substrings() {
    let config = TestConfigBuilder::new().filter(&["new_format"]).build();
    let suite = Suite::new(config).unwrap();

    let (report, _) = suite.run_simulated().await.unwrap();

    assert_eq!(report.cases.len(), 2, "{report}");
    assert_passed(&report, dms::NEW_FORMAT_CLUSTER);
    assert_passed(&report, dms::NEW_FORMAT_SINGLE);
}

#[tokio::test]
async fn test_e2e_filter_without_match_yields_empty_report() {
    let config = TestConfigBuilder::new().filter(&["no_such_case"]).build();
    let suite = Suite::new(config).unwrap();

    let (report, cloud) = suite.run_simulated().await.unwrap();

    assert!(report.cases.is_empty());
    assert!(report.passed());
    assert!(cloud.is_empty());
}
