//! 케이스 스케줄러 -- 병렬 실행과 배타 그룹
//!
//! - 동시 실행 케이스 수는 세마포어로 `max_parallel`개로 제한합니다.
//! - 같은 배타 그룹의 케이스는 그룹 잠금으로 한 번에 하나만 실행합니다.
//!   그룹 잠금을 먼저 얻은 뒤 세마포어 허가를 얻으므로, 대기 중인 배타
//!   케이스가 병렬 슬롯을 점유하지 않습니다.
//! - 결과는 완료 순서와 무관하게 제출 순서로 반환합니다.
//! - 케이스 태스크가 패닉해도 다른 케이스는 계속 실행되며, 해당 케이스는
//!   `Internal` 실패로 보고됩니다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info};

use crate::case::TestCase;
use crate::error::RunnerError;
use crate::report::{CaseReport, CaseStatus, SuiteReport};
use crate::stage::StageRunner;

/// 케이스 스케줄러
#[derive(Debug, Clone)]
pub struct Scheduler {
    runner: Arc<StageRunner>,
    max_parallel: usize,
    filter: Vec<String>,
}

impl Scheduler {
    /// 새 스케줄러를 만듭니다. `max_parallel`은 최소 1입니다.
    pub fn new(runner: Arc<StageRunner>, max_parallel: usize) -> Self {
        Self {
            runner,
            max_parallel: max_parallel.max(1),
            filter: Vec::new(),
        }
    }

    /// 이름 필터를 설정합니다 (부분 문자열, 하나라도 맞으면 실행).
    pub fn with_filter(mut self, filter: Vec<String>) -> Self {
        self.filter = filter;
        self
    }

    /// 동시 실행 상한
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// 케이스가 필터에 맞는지 확인합니다. 필터가 비어 있으면 모두 맞습니다.
    pub fn selects(&self, name: &str) -> bool {
        self.filter.is_empty() || self.filter.iter().any(|f| name.contains(f.as_str()))
    }

    /// 케이스들을 실행합니다.
    ///
    /// 이름이 중복되면 아무것도 실행하지 않고 에러를 반환합니다.
    pub async fn run(&self, cases: Vec<TestCase>) -> Result<SuiteReport, RunnerError> {
        let mut seen = HashSet::new();
        for case in &cases {
            if !seen.insert(case.name.as_str()) {
                return Err(RunnerError::DuplicateCase(case.name.clone()));
            }
        }

        let cases: Vec<TestCase> = cases.into_iter().filter(|c| self.selects(&c.name)).collect();
        let start = Instant::now();
        info!(
            cases = cases.len(),
            max_parallel = self.max_parallel,
            "suite started"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut groups: HashMap<String, Arc<Mutex<()>>> = HashMap::new();
        for case in &cases {
            if let Some(group) = case.isolation.group() {
                groups.entry(group.to_owned()).or_default();
            }
        }

        let mut handles = Vec::with_capacity(cases.len());
        let mut names = Vec::with_capacity(cases.len());
        for case in cases {
            let runner = Arc::clone(&self.runner);
            let semaphore = Arc::clone(&semaphore);
            let group = case
                .isolation
                .group()
                .and_then(|g| groups.get(g))
                .map(Arc::clone);
            names.push(case.name.clone());

            handles.push(tokio::spawn(async move {
                // 그룹 잠금 → 병렬 허가 순서
                let _group_guard = match &group {
                    Some(lock) => Some(lock.lock().await),
                    None => None,
                };
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return CaseReport::internal(&case.name, "scheduler semaphore closed"),
                };
                runner.run_case(&case).await
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (handle, name) in handles.into_iter().zip(names) {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(case = %name, error = %e, "case task terminated abnormally");
                    reports.push(CaseReport::internal(name, format!("case task failed: {e}")));
                }
            }
        }

        let suite = SuiteReport {
            cases: reports,
            duration: start.elapsed(),
        };
        info!(
            passed = suite.count(CaseStatus::Passed),
            failed = suite.count(CaseStatus::Failed),
            skipped = suite.count(CaseStatus::Skipped),
            duration_ms = suite.duration.as_millis() as u64,
            "suite finished"
        );
        Ok(suite)
    }
}
