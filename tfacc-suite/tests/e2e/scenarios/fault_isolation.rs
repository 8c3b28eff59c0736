//! Failures stay within their case.

use std::sync::Arc;

use tfacc_runner::{Fault, FailureKind, MemoryDriverFactory, Operation};
use tfacc_suite::Suite;
use tfacc_suite::scenarios::{dms, evs};
use tfacc_suite::simulated::{self, RABBITMQ_TYPE};

use crate::helpers::assertions::*;
use crate::helpers::config::*;

#[tokio::test]
async fn test_e2e_apply_failure_is_isolated_to_its_case() {
    let config = TestConfigBuilder::new().enterprise_project(TEST_EPS_ID).build();
    let suite = Suite::new(config).unwrap();
    let cloud = Arc::new(simulated::flexibleengine_cloud(TEST_REGION).unwrap());
    cloud.inject(Fault::fail(Operation::Apply, "quota exceeded").for_case(evs::VOLUMES_BASIC));

    let report = suite
        .run(Arc::new(MemoryDriverFactory::new(Arc::clone(&cloud))))
        .await
        .unwrap();

    assert_failed_with(&report, evs::VOLUMES_BASIC, FailureKind::Driver);
    assert_passed(&report, dms::BASIC);
    assert_passed(&report, dms::SINGLE);
    assert!(cloud.is_empty());
}

#[tokio::test]
async fn test_e2e_destroy_failure_leaks_and_keeps_lock() {
    let config = TestConfigBuilder::new().filter(&[dms::COMPATIBLE]).build();
    let suite = Suite::new(config).unwrap();
    let cloud = Arc::new(simulated::flexibleengine_cloud(TEST_REGION).unwrap());
    cloud.inject(Fault::fail(Operation::Destroy, "instance is busy").for_case(dms::COMPATIBLE));

    let report = suite
        .run(Arc::new(MemoryDriverFactory::new(Arc::clone(&cloud))))
        .await
        .unwrap();

    assert_failed_with(&report, dms::COMPATIBLE, FailureKind::Cleanup);
    let leaked = cloud.objects_of(RABBITMQ_TYPE);
    assert_eq!(leaked.len(), 1);
    assert!(cloud.lock_holder(RABBITMQ_TYPE).is_some());

    // manual cleanup releases the tenant lock
    for object in cloud.objects() {
        cloud.remove_out_of_band(&object.id);
    }
    assert!(cloud.lock_holder(RABBITMQ_TYPE).is_none());
}

#[tokio::test]
async fn test_e2e_import_failure_is_reported_as_import() {
    let config = TestConfigBuilder::new().filter(&[dms::PRE_PAID]).build();
    let suite = Suite::new(config).unwrap();
    let cloud = Arc::new(simulated::flexibleengine_cloud(TEST_REGION).unwrap());
    cloud.inject(Fault::fail(Operation::Import, "api unavailable").for_case(dms::PRE_PAID));

    let report = suite
        .run(Arc::new(MemoryDriverFactory::new(Arc::clone(&cloud))))
        .await
        .unwrap();

    assert_failed_with(&report, dms::PRE_PAID, FailureKind::Import);
    // resources are still destroyed after a failed step
    assert!(cloud.is_empty());
}
