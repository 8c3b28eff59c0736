//! Full catalogue against the simulated tenant.

use tfacc_runner::CaseStatus;
use tfacc_suite::Suite;
use tfacc_suite::scenarios::{dms, evs};

use crate::helpers::assertions::*;
use crate::helpers::config::*;

#[tokio::test]
async fn test_e2e_full_catalogue_passes_and_cleans_up() {
    let config = TestConfigBuilder::new().enterprise_project(TEST_EPS_ID).build();
    let suite = Suite::new(config).unwrap();

    let (report, cloud) = suite.run_simulated().await.unwrap();

    assert!(report.passed(), "{report}");
    assert_eq!(report.count(CaseStatus::Passed), 8, "{report}");
    for name in [
        evs::VOLUMES_BASIC,
        dms::BASIC,
        dms::NEW_FORMAT_CLUSTER,
        dms::NEW_FORMAT_SINGLE,
        dms::PRE_PAID,
        dms::WITH_EPS_ID,
        dms::COMPATIBLE,
        dms::SINGLE,
    ] {
        assert_passed(&report, name);
    }

    // every remote object was destroyed, system disks included
    assert!(cloud.is_empty(), "leftover objects: {:?}", cloud.objects());
    let stats = cloud.stats();
    assert_eq!(stats.created, stats.deleted);
    assert_eq!(stats.replaced, 0, "update steps must not force replacement");
    assert!(stats.updated > 0);
}

#[tokio::test]
async fn test_e2e_report_keeps_submission_order() {
    let config = TestConfigBuilder::new()
        .enterprise_project(TEST_EPS_ID)
        .max_parallel(8)
        .build();
    let suite = Suite::new(config).unwrap();
    let expected: Vec<String> = suite.cases().iter().map(|c| c.name.clone()).collect();

    let (report, _) = suite.run_simulated().await.unwrap();

    let actual: Vec<String> = report.cases.iter().map(|c| c.name.clone()).collect();
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_e2e_update_steps_record_verification() {
    let config = TestConfigBuilder::new().filter(&[dms::BASIC]).build();
    let suite = Suite::new(config).unwrap();

    let (report, _) = suite.run_simulated().await.unwrap();

    let basic = case(&report, dms::BASIC);
    assert!(basic.passed(), "{basic}");
    // create, update, import
    assert_eq!(basic.steps.len(), 3);
}
