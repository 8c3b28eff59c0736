//! Report assertion helpers for E2E tests.

use tfacc_runner::{CaseReport, CaseStatus, FailureKind, SuiteReport};

/// Look up a case report, panicking with the full report if it is missing.
pub fn case<'a>(report: &'a SuiteReport, name: &str) -> &'a CaseReport {
    report
        .case(name)
        .unwrap_or_else(|| panic!("case {name} missing from report:\n{report}"))
}

#[allow(dead_code)]
pub fn assert_passed(report: &SuiteReport, name: &str) {
    let case = case(report, name);
    assert_eq!(case.status, CaseStatus::Passed, "{case}");
}

#[allow(dead_code)]
pub fn assert_skipped(report: &SuiteReport, name: &str, reason: &str) {
    let case = case(report, name);
    assert_eq!(case.status, CaseStatus::Skipped, "{case}");
    let skip = case.skip_reason.as_deref().unwrap_or_default();
    assert!(skip.contains(reason), "skip reason {skip:?} lacks {reason:?}");
}

#[allow(dead_code)]
pub fn assert_failed_with(report: &SuiteReport, name: &str, kind: FailureKind) {
    let case = case(report, name);
    assert_eq!(case.status, CaseStatus::Failed, "{case}");
    assert_eq!(case.failure_kind(), Some(kind), "{case}");
}
