//! 스냅샷 검증 -- 체크마다 기대값과 실제값을 담은 결과를 만듭니다.
//!
//! 규칙:
//! - 리소스가 스냅샷에 없으면 실패
//! - 경로가 없으면 실패. 단, `.#`/`.%` 경로가 없고 기대값이 `"0"`이면 통과
//! - 참조 기대값은 같은 스냅샷의 대상 리소스로 먼저 해석하며, 해석 실패는 실패

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tfacc_core::flatmap::{LIST_COUNT_SUFFIX, MAP_COUNT_SUFFIX, is_count_key};
use tfacc_core::metrics as m;
use tfacc_core::types::{ResourceAddress, StateSnapshot};
use tracing::debug;

use crate::check::{AttributeCheck, Expectation};

/// 체크 하나의 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    /// 대상 리소스
    pub address: ResourceAddress,
    /// flatmap 경로
    pub path: String,
    /// 기대값 (표시용)
    pub expected: String,
    /// 실제값 (없으면 `None`)
    pub actual: Option<String>,
    /// 통과 여부
    pub passed: bool,
    /// 실패 사유
    pub reason: Option<String>,
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed { "ok" } else { "FAIL" };
        write!(
            f,
            "[{status}] {}: {} expected {}, got {}",
            self.address,
            self.path,
            self.expected,
            self.actual.as_deref().map_or("<absent>".to_owned(), |a| format!("\"{a}\""))
        )?;
        if let Some(reason) = &self.reason {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

/// 한 스텝의 검증 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationReport {
    /// 체크 순서대로의 결과
    pub outcomes: Vec<CheckOutcome>,
}

impl VerificationReport {
    /// 모든 체크 통과 여부
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    /// 실패한 체크
    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    /// 실패 수
    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} checks passed",
            self.outcomes.len() - self.failure_count(),
            self.outcomes.len()
        )?;
        for failure in self.failures() {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

/// 스냅샷에 대해 체크들을 평가합니다.
pub fn verify(snapshot: &StateSnapshot, checks: &[AttributeCheck]) -> VerificationReport {
    // 같은 리소스를 여러 번 펼치지 않도록 캐시합니다.
    let mut flat_cache: BTreeMap<&ResourceAddress, BTreeMap<String, String>> = BTreeMap::new();
    let mut outcomes = Vec::with_capacity(checks.len());

    for check in checks {
        let flat = match snapshot.get(&check.address) {
            Some(resource) => Some(
                &*flat_cache
                    .entry(&check.address)
                    .or_insert_with(|| resource.flat()),
            ),
            None => None,
        };
        let outcome = evaluate(snapshot, flat, check);

        let result = if outcome.passed { "pass" } else { "fail" };
        metrics::counter!(m::CHECKS_TOTAL, m::LABEL_RESULT => result).increment(1);
        if !outcome.passed {
            debug!(
                address = %outcome.address,
                path = %outcome.path,
                expected = %outcome.expected,
                actual = ?outcome.actual,
                "check failed"
            );
        }
        outcomes.push(outcome);
    }

    VerificationReport { outcomes }
}

fn evaluate(
    snapshot: &StateSnapshot,
    flat: Option<&BTreeMap<String, String>>,
    check: &AttributeCheck,
) -> CheckOutcome {
    let mut outcome = CheckOutcome {
        address: check.address.clone(),
        path: check.path.clone(),
        expected: check.expectation.to_string(),
        actual: None,
        passed: false,
        reason: None,
    };

    let Some(flat) = flat else {
        outcome.reason = Some("resource not found in state".to_owned());
        return outcome;
    };

    match &check.expectation {
        Expectation::Equals(expected) => {
            outcome.actual = flat.get(&check.path).cloned();
            outcome.passed = match &outcome.actual {
                Some(actual) => actual == expected,
                None => is_count_key(&check.path) && expected == "0",
            };
        }
        Expectation::EqualsReference(reference) => {
            outcome.actual = flat.get(&check.path).cloned();
            match reference.resolve(snapshot) {
                Some(expected) => {
                    outcome.passed = outcome.actual.as_deref() == Some(expected.as_str());
                    outcome.expected = format!("\"{expected}\" ({reference})");
                }
                None => {
                    outcome.reason = Some(format!("cannot resolve {reference}"));
                }
            }
        }
        Expectation::Matches(re) => {
            outcome.actual = flat.get(&check.path).cloned();
            outcome.passed = outcome.actual.as_deref().is_some_and(|a| re.is_match(a));
        }
        Expectation::Set => {
            outcome.actual = flat.get(&check.path).cloned();
            outcome.passed = outcome.actual.as_deref().is_some_and(|a| !a.is_empty());
        }
        Expectation::NotSet => {
            outcome.actual = flat.get(&check.path).cloned();
            outcome.passed = match outcome.actual.as_deref() {
                None => true,
                Some(actual) => is_count_key(&check.path) && actual == "0",
            };
        }
        Expectation::Count(n) => {
            let (list_key, map_key) = count_keys(&check.path);
            outcome.actual = flat
                .get(&list_key)
                .or_else(|| flat.get(&map_key))
                .cloned();
            let actual = outcome.actual.as_deref().unwrap_or("0");
            outcome.passed = actual == n.to_string();
        }
    }
    outcome
}

/// 개수 체크에 사용할 `.#`, `.%` 키
fn count_keys(path: &str) -> (String, String) {
    if is_count_key(path) {
        return (path.to_owned(), path.to_owned());
    }
    (
        format!("{path}.{LIST_COUNT_SUFFIX}"),
        format!("{path}.{MAP_COUNT_SUFFIX}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tfacc_core::types::ResourceState;

    const INSTANCE: &str = "flexibleengine_dms_rabbitmq_instance.test";

    fn snapshot() -> StateSnapshot {
        let mut snapshot = StateSnapshot::new();
        let instance = json!({
            "id": "inst-1",
            "name": "tf-test-abcde",
            "engine": "rabbitmq",
            "product_id": "prod-2",
            "description": "",
            "tags": {"key": "value", "owner": "terraform"},
            "availability_zones": ["eu-west-0a"],
            "empty_list": []
        });
        snapshot.insert(ResourceState::new(
            INSTANCE.parse().unwrap(),
            instance.as_object().cloned().unwrap_or_default(),
        ));
        let product = json!({"id": "prod-2"});
        snapshot.insert(ResourceState::new(
            "data.flexibleengine_dms_product.test2".parse().unwrap(),
            product.as_object().cloned().unwrap_or_default(),
        ));
        snapshot
    }

    fn run(check: AttributeCheck) -> CheckOutcome {
        verify(&snapshot(), &[check]).outcomes.remove(0)
    }

    #[test]
    fn equals_reports_expected_and_actual() {
        assert!(run(AttributeCheck::equals(INSTANCE, "tags.owner", "terraform").unwrap()).passed);

        let failed = run(AttributeCheck::equals(INSTANCE, "name", "other").unwrap());
        assert!(!failed.passed);
        assert_eq!(failed.expected, "\"other\"");
        assert_eq!(failed.actual.as_deref(), Some("tf-test-abcde"));
    }

    #[test]
    fn missing_path_fails_except_zero_count() {
        assert!(!run(AttributeCheck::equals(INSTANCE, "tags.key1", "value").unwrap()).passed);
        assert!(run(AttributeCheck::equals(INSTANCE, "missing.#", "0").unwrap()).passed);
        assert!(run(AttributeCheck::equals(INSTANCE, "empty_list.#", "0").unwrap()).passed);
        assert!(!run(AttributeCheck::equals(INSTANCE, "missing.#", "1").unwrap()).passed);
    }

    #[test]
    fn reference_resolves_against_sibling() {
        let ok = run(AttributeCheck::equals_reference(
            INSTANCE,
            "product_id",
            "${data.flexibleengine_dms_product.test2.id}",
        )
        .unwrap());
        assert!(ok.passed, "{ok}");

        let unresolved = run(AttributeCheck::equals_reference(
            INSTANCE,
            "product_id",
            "${data.flexibleengine_dms_product.test1.id}",
        )
        .unwrap());
        assert!(!unresolved.passed);
        assert!(unresolved.reason.unwrap().contains("cannot resolve"));
    }

    #[test]
    fn set_not_set_and_matches() {
        assert!(run(AttributeCheck::set(INSTANCE, "id").unwrap()).passed);
        assert!(!run(AttributeCheck::set(INSTANCE, "description").unwrap()).passed);
        assert!(run(AttributeCheck::not_set(INSTANCE, "tags.key1").unwrap()).passed);
        assert!(run(AttributeCheck::not_set(INSTANCE, "empty_list.#").unwrap()).passed);
        assert!(!run(AttributeCheck::not_set(INSTANCE, "tags.key").unwrap()).passed);
        assert!(run(AttributeCheck::matches(INSTANCE, "name", "^tf-test-[a-z0-9]{5}$").unwrap()).passed);
    }

    #[test]
    fn counts_use_list_then_map_size() {
        assert!(run(AttributeCheck::count(INSTANCE, "availability_zones", 1).unwrap()).passed);
        assert!(run(AttributeCheck::count(INSTANCE, "tags", 2).unwrap()).passed);
        assert!(run(AttributeCheck::count(INSTANCE, "tags.%", 2).unwrap()).passed);
        assert!(run(AttributeCheck::count(INSTANCE, "nothing", 0).unwrap()).passed);
        assert!(!run(AttributeCheck::count(INSTANCE, "tags", 3).unwrap()).passed);
    }

    #[test]
    fn missing_resource_fails_every_check() {
        let outcome = run(AttributeCheck::set("flexibleengine_vpc_v1.test", "id").unwrap());
        assert!(!outcome.passed);
        assert_eq!(outcome.reason.as_deref(), Some("resource not found in state"));
    }

    #[test]
    fn report_summarises_failures() {
        let report = verify(
            &snapshot(),
            &[
                AttributeCheck::equals(INSTANCE, "engine", "rabbitmq").unwrap(),
                AttributeCheck::equals(INSTANCE, "engine", "kafka").unwrap(),
            ],
        );
        assert!(!report.passed());
        assert_eq!(report.failure_count(), 1);
        let text = report.to_string();
        assert!(text.starts_with("1/2 checks passed"));
        assert!(text.contains("expected \"kafka\", got \"rabbitmq\""));
    }
}
