//! import 비교 -- 다시 읽어온 상태가 추적 중인 상태를 포함하는지 확인
//!
//! 두 상태를 flatmap으로 펼친 뒤 무시 목록(접두어 일치)과 `timeouts.*` 키를
//! 제외하고, 추적 상태의 모든 키가 import 상태에 같은 값으로 있어야 합니다.
//! import 상태에만 있는 키는 허용합니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tfacc_core::types::{ResourceAddress, ResourceState};
use tracing::debug;

/// 항상 무시하는 키 접두어
const TIMEOUTS_PREFIX: &str = "timeouts";

/// 값이 다른 키
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportMismatch {
    /// flatmap 키
    pub key: String,
    /// 추적 상태의 값
    pub expected: String,
    /// import 상태의 값 (없으면 `None`)
    pub actual: Option<String>,
}

impl fmt::Display for ImportMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual {
            Some(actual) => write!(
                f,
                "{}: tracked \"{}\", imported \"{actual}\"",
                self.key, self.expected
            ),
            None => write!(
                f,
                "{}: tracked \"{}\", missing after import",
                self.key, self.expected
            ),
        }
    }
}

/// import 비교 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportDiff {
    /// 비교 대상 리소스
    pub address: ResourceAddress,
    /// 불일치 키 (키 순)
    pub mismatches: Vec<ImportMismatch>,
    /// 무시한 키 수
    pub ignored: usize,
}

impl ImportDiff {
    /// 불일치가 없으면 `true`
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

impl fmt::Display for ImportDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "{}: import state matches", self.address);
        }
        write!(
            f,
            "{}: {} attribute(s) differ after import",
            self.address,
            self.mismatches.len()
        )?;
        for mismatch in &self.mismatches {
            write!(f, "\n  {mismatch}")?;
        }
        Ok(())
    }
}

/// 키가 무시 대상인지 판단합니다.
pub fn is_ignored(key: &str, ignore: &[String]) -> bool {
    key.starts_with(TIMEOUTS_PREFIX) || ignore.iter().any(|prefix| key.starts_with(prefix.as_str()))
}

/// 추적 상태와 import 상태를 비교합니다.
pub fn diff_import(
    tracked: &ResourceState,
    imported: &ResourceState,
    ignore: &[String],
) -> ImportDiff {
    let tracked_flat = tracked.flat();
    let imported_flat = imported.flat();
    diff_flat(tracked.address.clone(), &tracked_flat, &imported_flat, ignore)
}

fn diff_flat(
    address: ResourceAddress,
    tracked: &BTreeMap<String, String>,
    imported: &BTreeMap<String, String>,
    ignore: &[String],
) -> ImportDiff {
    let mut mismatches = Vec::new();
    let mut ignored = 0;

    for (key, expected) in tracked {
        if is_ignored(key, ignore) {
            ignored += 1;
            continue;
        }
        let actual = imported.get(key);
        if actual != Some(expected) {
            mismatches.push(ImportMismatch {
                key: key.clone(),
                expected: expected.clone(),
                actual: actual.cloned(),
            });
        }
    }

    debug!(
        %address,
        compared = tracked.len() - ignored,
        ignored,
        mismatches = mismatches.len(),
        "import state compared"
    );

    ImportDiff {
        address,
        mismatches,
        ignored,
    }
}
