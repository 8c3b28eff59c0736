//! 단계 실행기 -- 한 케이스의 단계들을 순서대로 실행하고 정리합니다.
//!
//! 실행 순서:
//! 1. 사전 검사 (실패 시 `Skipped`, 드라이버 호출 없음)
//! 2. 모든 apply 단계의 구성을 먼저 렌더링 (실패 시 드라이버 호출 없음)
//! 3. 단계 실행: apply 후 검사, import 후 비교
//! 4. 무언가 적용되었다면 결과와 무관하게 destroy
//! 5. destroy 확인: 추적했던 리소스가 원격에 남아 있지 않은지 조회
//!
//! 모든 드라이버 호출은 작업별 타임아웃으로 감싸며, 시간 초과는
//! [`FailureKind::Timeout`]으로 다른 드라이버 에러와 구별됩니다.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tfacc_core::config::TfaccConfig;
use tfacc_core::error::DriverError;
use tfacc_core::metrics as m;
use tfacc_core::types::{ResourceAddress, StateSnapshot};
use tfacc_hcl::{RenderedConfig, TemplateRegistry};
use tfacc_verify::{AttributeCheck, CheckOutcome, VerificationReport, diff_import, verify};
use tracing::{debug, error, info, warn};

use crate::case::{ApplyStep, ImportStep, Step, StepCheck, TestCase};
use crate::driver::{DriverFactory, DynDriver};
use crate::report::{CaseReport, CaseStatus, Failure, FailureKind, StepReport, StepStatus};

/// 단계 실행 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// 단계 실패 시 남은 단계를 건너뜀
    pub stop_on_failure: bool,
    /// destroy 후 원격 부재 확인 (케이스 설정과 AND)
    pub check_destroy: bool,
    /// apply 타임아웃
    pub apply_timeout: Duration,
    /// destroy 타임아웃
    pub destroy_timeout: Duration,
    /// import 타임아웃
    pub import_timeout: Duration,
    /// 존재 확인 타임아웃
    pub read_timeout: Duration,
}

impl RunSettings {
    /// 하네스 설정에서 만듭니다.
    pub fn from_config(config: &TfaccConfig) -> Self {
        Self {
            stop_on_failure: config.runner.stop_on_failure,
            check_destroy: config.runner.check_destroy,
            apply_timeout: config.driver.apply_timeout(),
            destroy_timeout: config.driver.destroy_timeout(),
            import_timeout: config.driver.import_timeout(),
            read_timeout: config.driver.read_timeout(),
        }
    }

    /// 모든 드라이버 작업에 같은 타임아웃을 적용합니다.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.apply_timeout = limit;
        self.destroy_timeout = limit;
        self.import_timeout = limit;
        self.read_timeout = limit;
        self
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&TfaccConfig::default())
    }
}

/// 실행 중 케이스 수 게이지. drop 시 감소합니다.
struct RunningGuard;

impl RunningGuard {
    fn enter() -> Self {
        metrics::gauge!(m::CASES_RUNNING).increment(1.0);
        Self
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        metrics::gauge!(m::CASES_RUNNING).decrement(1.0);
    }
}

/// 렌더링이 끝난 단계
enum Planned<'a> {
    Apply(&'a ApplyStep, RenderedConfig),
    Import(&'a ImportStep),
}

/// 단계 하나의 실행 결과
#[derive(Default)]
struct StepOutcome {
    verification: Option<VerificationReport>,
    import_diff: Option<tfacc_verify::ImportDiff>,
    failure: Option<Failure>,
}

// ─── StageRunner ─────────────────────────────────────────────────────

/// 케이스 단위 실행기
///
/// 스케줄러가 여러 태스크에서 공유하므로 내부 상태는 모두 읽기 전용입니다.
pub struct StageRunner {
    registry: Arc<TemplateRegistry>,
    factory: Arc<dyn DriverFactory>,
    settings: RunSettings,
}

impl StageRunner {
    /// 새 실행기를 만듭니다.
    pub fn new(
        registry: Arc<TemplateRegistry>,
        factory: Arc<dyn DriverFactory>,
        settings: RunSettings,
    ) -> Self {
        Self {
            registry,
            factory,
            settings,
        }
    }

    /// 실행 설정
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// 템플릿 레지스트리
    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// 케이스 하나를 실행합니다.
    ///
    /// 실패는 에러가 아니라 보고서로 반환합니다.
    pub async fn run_case(&self, case: &TestCase) -> CaseReport {
        let _running = RunningGuard::enter();
        let start = Instant::now();
        info!(case = %case.name, isolation = %case.isolation, steps = case.steps.len(), "case started");

        let mut report = self.execute(case).await;
        report.finalize(start.elapsed());

        metrics::counter!(m::CASES_TOTAL, m::LABEL_RESULT => report.status.to_string()).increment(1);
        metrics::histogram!(m::CASE_DURATION_SECONDS).record(report.duration.as_secs_f64());

        match report.status {
            CaseStatus::Passed => {
                info!(case = %case.name, duration_ms = report.duration.as_millis() as u64, "case passed");
            }
            CaseStatus::Skipped => {
                info!(case = %case.name, reason = ?report.skip_reason, "case skipped");
            }
            CaseStatus::Failed => {
                warn!(
                    case = %case.name,
                    kind = ?report.failure_kind(),
                    duration_ms = report.duration.as_millis() as u64,
                    "case failed"
                );
            }
        }
        report
    }

    async fn execute(&self, case: &TestCase) -> CaseReport {
        // --- 사전 검사 ---
        for precheck in &case.prechecks {
            if let Err(reason) = precheck.evaluate() {
                return CaseReport::skipped(&case.name, reason);
            }
        }

        let mut report = CaseReport::new(&case.name);

        // --- 렌더링 (드라이버 호출 전) ---
        let plan = match self.render_all(case) {
            Ok(plan) => plan,
            Err(failure) => {
                error!(case = %case.name, error = %failure, "configuration render failed");
                report.record_failure(failure);
                report.steps = not_run_steps(case);
                return report;
            }
        };

        let mut driver = match self.factory.create(&case.name) {
            Ok(driver) => driver,
            Err(e) => {
                report.record_failure(Failure::new(FailureKind::Driver, None, e.to_string()));
                report.steps = not_run_steps(case);
                return report;
            }
        };
        let driver_name = driver.name().to_owned();

        // --- 단계 실행 ---
        let mut applied = false;
        let mut last_snapshot: Option<StateSnapshot> = None;

        for (index, planned) in plan.iter().enumerate() {
            let kind = match planned {
                Planned::Apply(..) => "apply",
                Planned::Import(_) => "import",
            };
            if report.failure.is_some() && self.settings.stop_on_failure {
                report.steps.push(StepReport::not_run(index, kind));
                continue;
            }

            let step_start = Instant::now();
            if matches!(planned, Planned::Apply(..)) {
                applied = true;
            }
            // 단계 안의 panic은 Internal 실패로 바꾸고 정리는 그대로 진행합니다.
            let work = async {
                match planned {
                    Planned::Apply(step, config) => {
                        self.run_apply(
                            driver.as_mut(),
                            &driver_name,
                            index,
                            step,
                            config,
                            &mut last_snapshot,
                        )
                        .await
                    }
                    Planned::Import(step) => {
                        self.run_import(
                            driver.as_mut(),
                            &driver_name,
                            index,
                            step,
                            last_snapshot.as_ref(),
                        )
                        .await
                    }
                }
            };
            let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(case = %case.name, step = index, %message, "step panicked");
                    StepOutcome {
                        failure: Some(Failure::new(
                            FailureKind::Internal,
                            Some(index),
                            format!("step panicked: {message}"),
                        )),
                        ..StepOutcome::default()
                    }
                }
            };
            let duration = step_start.elapsed();

            let status = if outcome.failure.is_some() {
                StepStatus::Failed
            } else {
                StepStatus::Passed
            };
            let result = if outcome.failure.is_some() { "failed" } else { "passed" };
            metrics::counter!(m::STEPS_TOTAL, m::LABEL_STEP_KIND => kind, m::LABEL_RESULT => result)
                .increment(1);
            metrics::histogram!(m::STEP_DURATION_SECONDS, m::LABEL_STEP_KIND => kind)
                .record(duration.as_secs_f64());
            debug!(case = %case.name, step = index, kind, result, "step finished");

            report.steps.push(StepReport {
                index,
                kind,
                status,
                duration,
                verification: outcome.verification,
                import_diff: outcome.import_diff,
                failure: outcome.failure.clone(),
            });
            if let Some(failure) = outcome.failure {
                report.record_failure(failure);
            }
        }

        // --- 정리 ---
        if applied {
            self.teardown(driver.as_mut(), &driver_name, case, last_snapshot.as_ref(), &mut report)
                .await;
        }

        report
    }

    /// 모든 apply 단계를 렌더링합니다. 하나라도 실패하면 그 실패를 반환합니다.
    fn render_all<'a>(&self, case: &'a TestCase) -> Result<Vec<Planned<'a>>, Failure> {
        case.steps
            .iter()
            .enumerate()
            .map(|(index, step)| match step {
                Step::Apply(apply) => self
                    .registry
                    .render(&apply.scenario, &apply.params)
                    .map(|config| Planned::Apply(apply, config))
                    .map_err(|e| Failure::new(FailureKind::Render, Some(index), e.to_string())),
                Step::ImportVerify(import) => Ok(Planned::Import(import)),
            })
            .collect()
    }

    async fn run_apply(
        &self,
        driver: &mut dyn DynDriver,
        driver_name: &str,
        index: usize,
        step: &ApplyStep,
        config: &RenderedConfig,
        last_snapshot: &mut Option<StateSnapshot>,
    ) -> StepOutcome {
        let snapshot = match timed(
            driver_name,
            "apply",
            self.settings.apply_timeout,
            driver.apply(config),
        )
        .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return StepOutcome {
                    failure: Some(driver_failure(index, &e)),
                    ..StepOutcome::default()
                };
            }
        };

        // 검사 순서를 유지하며 속성 검사와 존재 확인을 평가합니다.
        let mut outcomes = Vec::with_capacity(step.checks.len());
        let mut attribute_checks: Vec<AttributeCheck> = Vec::new();
        let mut driver_failure_seen = None;
        for check in &step.checks {
            match check {
                StepCheck::Attribute(check) => attribute_checks.push(check.clone()),
                StepCheck::Exists(address) => {
                    outcomes.extend(verify(&snapshot, &attribute_checks).outcomes);
                    attribute_checks.clear();
                    match self
                        .check_exists(driver, driver_name, &snapshot, address)
                        .await
                    {
                        Ok(outcome) => outcomes.push(outcome),
                        Err(e) => {
                            driver_failure_seen = Some(driver_failure(index, &e));
                            break;
                        }
                    }
                }
            }
        }
        outcomes.extend(verify(&snapshot, &attribute_checks).outcomes);
        let verification = VerificationReport { outcomes };
        *last_snapshot = Some(snapshot);

        let failure = driver_failure_seen.or_else(|| {
            (!verification.passed()).then(|| {
                Failure::new(FailureKind::Assertion, Some(index), verification.to_string())
            })
        });
        StepOutcome {
            verification: Some(verification),
            import_diff: None,
            failure,
        }
    }

    async fn check_exists(
        &self,
        driver: &mut dyn DynDriver,
        driver_name: &str,
        snapshot: &StateSnapshot,
        address: &ResourceAddress,
    ) -> Result<CheckOutcome, DriverError> {
        let mut outcome = CheckOutcome {
            address: address.clone(),
            path: "id".to_owned(),
            expected: "remote object exists".to_owned(),
            actual: None,
            passed: false,
            reason: None,
        };
        let Some(id) = snapshot.get(address).and_then(|r| r.id()) else {
            outcome.reason = Some("resource not found in state".to_owned());
            return Ok(outcome);
        };
        outcome.actual = Some(id.to_owned());

        let exists = timed(
            driver_name,
            "read",
            self.settings.read_timeout,
            driver.exists(address, id),
        )
        .await?;
        outcome.passed = exists;
        if !exists {
            outcome.reason = Some("remote object not found".to_owned());
        }
        Ok(outcome)
    }

    async fn run_import(
        &self,
        driver: &mut dyn DynDriver,
        driver_name: &str,
        index: usize,
        step: &ImportStep,
        last_snapshot: Option<&StateSnapshot>,
    ) -> StepOutcome {
        let fail = |message: String| StepOutcome {
            failure: Some(Failure::new(FailureKind::Import, Some(index), message)),
            ..StepOutcome::default()
        };

        let Some(tracked) = last_snapshot.and_then(|s| s.get(&step.address)) else {
            return fail(format!("{} is not in the tracked state", step.address));
        };
        let Some(id) = step.import_id.as_deref().or_else(|| tracked.id()) else {
            return fail(format!("{} has no id to import", step.address));
        };

        let imported = match timed(
            driver_name,
            "import",
            self.settings.import_timeout,
            driver.import_and_read(&step.address, id),
        )
        .await
        {
            Ok(imported) => imported,
            Err(e) if e.is_timeout() => {
                return StepOutcome {
                    failure: Some(Failure::new(FailureKind::Timeout, Some(index), e.to_string())),
                    ..StepOutcome::default()
                };
            }
            Err(e) => return fail(e.to_string()),
        };

        let diff = diff_import(tracked, &imported, &step.ignore);
        let failure = (!diff.is_clean())
            .then(|| Failure::new(FailureKind::Import, Some(index), diff.to_string()));
        StepOutcome {
            verification: None,
            import_diff: Some(diff),
            failure,
        }
    }

    /// destroy를 실행하고 남은 리소스를 확인합니다.
    ///
    /// 정리 실패는 `cleanup_errors`에 쌓이며 최초 실패를 덮어쓰지 않습니다.
    async fn teardown(
        &self,
        driver: &mut dyn DynDriver,
        driver_name: &str,
        case: &TestCase,
        tracked: Option<&StateSnapshot>,
        report: &mut CaseReport,
    ) {
        let destroyed = timed(
            driver_name,
            "destroy",
            self.settings.destroy_timeout,
            driver.destroy(),
        )
        .await;

        if let Err(e) = destroyed {
            error!(case = %case.name, error = %e, "destroy failed, resources may be left behind");
            metrics::counter!(m::CLEANUP_ERRORS_TOTAL).increment(1);
            let kind = if e.is_timeout() {
                FailureKind::Timeout
            } else {
                FailureKind::Cleanup
            };
            report
                .cleanup_errors
                .push(Failure::new(kind, None, format!("destroy: {e}")));
            return;
        }

        if !(case.check_destroy && self.settings.check_destroy) {
            return;
        }
        let Some(tracked) = tracked else {
            return;
        };

        for resource in tracked.managed() {
            let Some(id) = resource.id() else {
                continue;
            };
            let lookup = timed(
                driver_name,
                "read",
                self.settings.read_timeout,
                driver.exists(&resource.address, id),
            )
            .await;
            match lookup {
                Ok(false) => {}
                Ok(true) => {
                    error!(case = %case.name, address = %resource.address, id, "resource still exists after destroy");
                    metrics::counter!(m::DANGLING_RESOURCES_TOTAL).increment(1);
                    report.dangling.push(resource.address.to_string());
                    report.cleanup_errors.push(Failure::new(
                        FailureKind::DestroyCheck,
                        None,
                        format!("{} ({id}) still exists after destroy", resource.address),
                    ));
                }
                Err(e) => {
                    warn!(case = %case.name, address = %resource.address, error = %e, "destroy check failed");
                    metrics::counter!(m::CLEANUP_ERRORS_TOTAL).increment(1);
                    report.cleanup_errors.push(Failure::new(
                        FailureKind::DestroyCheck,
                        None,
                        format!("could not confirm {} was destroyed: {e}", resource.address),
                    ));
                }
            }
        }
    }
}

impl std::fmt::Debug for StageRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRunner")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// --- helpers ---

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn not_run_steps(case: &TestCase) -> Vec<StepReport> {
    case.steps
        .iter()
        .enumerate()
        .map(|(index, step)| StepReport::not_run(index, step.kind()))
        .collect()
}

fn driver_failure(index: usize, err: &DriverError) -> Failure {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Driver
    };
    Failure::new(kind, Some(index), err.to_string())
}

/// 드라이버 작업을 타임아웃으로 감싸고 메트릭을 기록합니다.
///
/// 시간 초과 시 작업 future는 drop되어 취소됩니다.
async fn timed<T, F>(
    driver: &str,
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, DriverError>
where
    F: Future<Output = Result<T, DriverError>>,
{
    let start = Instant::now();
    let result = match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::Timeout {
            operation: operation.to_owned(),
            elapsed: start.elapsed(),
        }),
    };
    let elapsed = start.elapsed();

    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) if e.is_timeout() => "timeout",
        Err(_) => "error",
    };
    metrics::counter!(
        m::DRIVER_OPERATIONS_TOTAL,
        m::LABEL_OPERATION => operation,
        m::LABEL_DRIVER => driver.to_owned(),
        m::LABEL_RESULT => outcome
    )
    .increment(1);
    metrics::histogram!(m::DRIVER_OPERATION_DURATION_SECONDS, m::LABEL_OPERATION => operation)
        .record(elapsed.as_secs_f64());
    if outcome == "timeout" {
        metrics::counter!(m::DRIVER_TIMEOUTS_TOTAL, m::LABEL_OPERATION => operation).increment(1);
        warn!(driver, operation, limit_ms = limit.as_millis() as u64, "driver operation timed out");
    }
    result
}
