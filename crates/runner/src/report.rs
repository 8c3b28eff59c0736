//! 실행 보고서 -- 단계, 케이스, 스위트 결과
//!
//! 모든 실패 범주(렌더링, 드라이버, 타임아웃, 검증, import, 정리)는
//! [`CaseReport`]에 기록되며 어떤 것도 버려지지 않습니다.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tfacc_verify::{ImportDiff, VerificationReport};

/// 실패 범주
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 구성 렌더링 실패 (드라이버 호출 전)
    Render,
    /// 드라이버 에러
    Driver,
    /// 드라이버 작업 시간 초과
    Timeout,
    /// 속성 검사 불일치
    Assertion,
    /// import 상태 불일치 또는 import 실패
    Import,
    /// 정리(destroy) 실패
    Cleanup,
    /// destroy 후에도 남아 있는 리소스
    DestroyCheck,
    /// 케이스 태스크 자체의 비정상 종료
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Render => "render",
            Self::Driver => "driver",
            Self::Timeout => "timeout",
            Self::Assertion => "assertion",
            Self::Import => "import",
            Self::Cleanup => "cleanup",
            Self::DestroyCheck => "destroy_check",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// 실패 하나
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    /// 범주
    pub kind: FailureKind,
    /// 실패한 단계 (케이스 단위 실패는 `None`)
    pub step: Option<usize>,
    /// 메시지
    pub message: String,
}

impl Failure {
    /// 새 실패를 만듭니다.
    pub fn new(kind: FailureKind, step: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            kind,
            step,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step {
            Some(step) => write!(f, "[{}] step {step}: {}", self.kind, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// 단계 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// 통과
    Passed,
    /// 실패
    Failed,
    /// 앞 단계 실패로 실행하지 않음
    NotRun,
}

/// 단계 보고서
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    /// 단계 번호 (0부터)
    pub index: usize,
    /// 단계 종류 (`apply` | `import`)
    pub kind: &'static str,
    /// 결과
    pub status: StepStatus,
    /// 소요 시간
    pub duration: Duration,
    /// apply 단계의 검사 결과
    pub verification: Option<VerificationReport>,
    /// import 단계의 비교 결과
    pub import_diff: Option<ImportDiff>,
    /// 이 단계의 실패
    pub failure: Option<Failure>,
}

impl StepReport {
    pub(crate) fn not_run(index: usize, kind: &'static str) -> Self {
        Self {
            index,
            kind,
            status: StepStatus::NotRun,
            duration: Duration::ZERO,
            verification: None,
            import_diff: None,
            failure: None,
        }
    }
}

/// 케이스 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// 통과
    Passed,
    /// 실패
    Failed,
    /// 사전 검사 실패로 건너뜀
    Skipped,
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// 케이스 보고서
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    /// 케이스 이름
    pub name: String,
    /// 결과 상태
    pub status: CaseStatus,
    /// 최초 실패 (정리 에러로 덮어쓰지 않음)
    pub failure: Option<Failure>,
    /// 정리 및 destroy 확인 실패
    pub cleanup_errors: Vec<Failure>,
    /// 건너뛴 사유
    pub skip_reason: Option<String>,
    /// 단계별 보고서
    pub steps: Vec<StepReport>,
    /// destroy 후 남은 리소스 주소
    pub dangling: Vec<String>,
    /// 전체 소요 시간
    pub duration: Duration,
}

impl CaseReport {
    /// 빈 보고서
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CaseStatus::Passed,
            failure: None,
            cleanup_errors: Vec::new(),
            skip_reason: None,
            steps: Vec::new(),
            dangling: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// 건너뛴 케이스 보고서
    pub(crate) fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: CaseStatus::Skipped,
            skip_reason: Some(reason.into()),
            ..Self::new(name)
        }
    }

    /// 태스크가 비정상 종료된 케이스 보고서
    pub(crate) fn internal(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: CaseStatus::Failed,
            failure: Some(Failure::new(FailureKind::Internal, None, message)),
            ..Self::new(name)
        }
    }

    /// 최초 실패를 기록합니다. 이미 있으면 유지합니다.
    pub(crate) fn record_failure(&mut self, failure: Failure) {
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
    }

    /// 상태를 확정합니다.
    pub(crate) fn finalize(&mut self, duration: Duration) {
        self.duration = duration;
        if self.status != CaseStatus::Skipped {
            self.status = if self.failure.is_none() && self.cleanup_errors.is_empty() {
                CaseStatus::Passed
            } else {
                CaseStatus::Failed
            };
        }
    }

    /// 통과 여부
    pub fn passed(&self) -> bool {
        self.status == CaseStatus::Passed
    }

    /// 최초 실패 이후 단계에서 난 실패 (`stop_on_failure = false`일 때)
    pub fn later_failures(&self) -> impl Iterator<Item = &Failure> {
        self.steps
            .iter()
            .filter_map(|step| step.failure.as_ref())
            .filter(move |failure| Some(*failure) != self.failure.as_ref())
    }

    /// 실패 범주 (최초 실패, 없으면 첫 정리 실패)
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure
            .as_ref()
            .or_else(|| self.cleanup_errors.first())
            .map(|f| f.kind)
    }
}

impl fmt::Display for CaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ... {} ({:.1?})", self.name, self.status, self.duration)?;
        if let Some(reason) = &self.skip_reason {
            write!(f, "\n    skipped: {reason}")?;
        }
        if let Some(failure) = &self.failure {
            write!(f, "\n    {failure}")?;
        }
        for failure in self.later_failures() {
            write!(f, "\n    {failure}")?;
        }
        for cleanup in &self.cleanup_errors {
            write!(f, "\n    {cleanup}")?;
        }
        Ok(())
    }
}

/// 스위트 보고서 (제출 순서 유지)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuiteReport {
    /// 케이스 보고서
    pub cases: Vec<CaseReport>,
    /// 전체 소요 시간
    pub duration: Duration,
}

impl SuiteReport {
    /// 상태별 케이스 수
    pub fn count(&self, status: CaseStatus) -> usize {
        self.cases.iter().filter(|c| c.status == status).count()
    }

    /// 실패 케이스가 없으면 `true` (건너뛴 케이스는 실패가 아님)
    pub fn passed(&self) -> bool {
        self.count(CaseStatus::Failed) == 0
    }

    /// 이름으로 케이스 보고서를 찾습니다.
    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|c| c.name == name)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for case in &self.cases {
            writeln!(f, "{case}")?;
        }
        write!(
            f,
            "result: {} passed; {} failed; {} skipped; finished in {:.1?}",
            self.count(CaseStatus::Passed),
            self.count(CaseStatus::Failed),
            self.count(CaseStatus::Skipped),
            self.duration
        )
    }
}
