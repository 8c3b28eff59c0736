//! 테스트 케이스 모델 -- 단계, 격리 그룹, 사전 검사
//!
//! 케이스는 시나리오마다 만들어지고 실행 후 버려집니다.
//!
//! # 사용 예시
//! ```
//! use tfacc_hcl::TemplateParams;
//! use tfacc_runner::case::{Isolation, StepCheck, TestCase};
//! use tfacc_verify::AttributeCheck;
//!
//! let case = TestCase::builder("dms_rabbitmq_basic")
//!     .isolation(Isolation::exclusive("dms"))
//!     .apply(
//!         "dms_rabbitmq_basic",
//!         TemplateParams::new().with("name", "tf-test-abcde"),
//!         vec![StepCheck::Attribute(
//!             AttributeCheck::equals("flexibleengine_dms_rabbitmq_instance.test", "engine", "rabbitmq").unwrap(),
//!         )],
//!     )
//!     .import_verify("flexibleengine_dms_rabbitmq_instance.test", ["password"])
//!     .build()
//!     .unwrap();
//! assert_eq!(case.steps.len(), 2);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tfacc_core::types::ResourceAddress;
use tfacc_hcl::TemplateParams;
use tfacc_verify::AttributeCheck;

use crate::error::RunnerError;

// ─── Isolation ───────────────────────────────────────────────────────

/// 케이스 격리 방식
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Isolation {
    /// 다른 케이스와 병렬 실행
    #[default]
    Parallel,
    /// 같은 그룹의 케이스와 겹치지 않음
    Exclusive {
        /// 그룹 이름 (예: `dms`)
        group: String,
    },
}

impl Isolation {
    /// 배타 그룹
    pub fn exclusive(group: impl Into<String>) -> Self {
        Self::Exclusive {
            group: group.into(),
        }
    }

    /// 배타 그룹 이름
    pub fn group(&self) -> Option<&str> {
        match self {
            Self::Parallel => None,
            Self::Exclusive { group } => Some(group),
        }
    }
}

impl fmt::Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parallel => write!(f, "parallel"),
            Self::Exclusive { group } => write!(f, "exclusive:{group}"),
        }
    }
}

// ─── Precheck ────────────────────────────────────────────────────────

/// 사전 검사. 실패하면 케이스는 `Skipped`가 됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precheck {
    /// 설정에서 읽은 값이 비어 있지 않아야 함
    NonEmpty {
        /// 값의 이름 (예: `OS_REGION_NAME`)
        name: String,
        /// 실행 시점의 값
        value: String,
    },
    /// 프로세스 환경변수가 설정되어 있어야 함
    EnvVar(String),
}

impl Precheck {
    /// 설정 값 검사
    pub fn non_empty(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::NonEmpty {
            name: name.into(),
            value: value.into(),
        }
    }

    /// 검사를 수행합니다. 실패 시 사유를 반환합니다.
    pub fn evaluate(&self) -> Result<(), String> {
        match self {
            Self::NonEmpty { name, value } => {
                if value.trim().is_empty() {
                    Err(format!("{name} must be set for this test"))
                } else {
                    Ok(())
                }
            }
            Self::EnvVar(name) => match std::env::var(name) {
                Ok(v) if !v.trim().is_empty() => Ok(()),
                _ => Err(format!("environment variable {name} must be set for this test")),
            },
        }
    }
}

// ─── Step ────────────────────────────────────────────────────────────

/// apply 후 검사 항목
#[derive(Debug, Clone)]
pub enum StepCheck {
    /// 상태 속성 검사
    Attribute(AttributeCheck),
    /// 원격 존재 확인 (스냅샷의 id로 드라이버에 조회)
    Exists(ResourceAddress),
}

impl From<AttributeCheck> for StepCheck {
    fn from(check: AttributeCheck) -> Self {
        Self::Attribute(check)
    }
}

/// 구성 적용 단계
#[derive(Debug, Clone)]
pub struct ApplyStep {
    /// 템플릿 시나리오 이름
    pub scenario: String,
    /// 템플릿 파라미터
    pub params: TemplateParams,
    /// 검사 항목
    pub checks: Vec<StepCheck>,
}

/// import 검증 단계
#[derive(Debug, Clone)]
pub struct ImportStep {
    /// 대상 리소스
    pub address: ResourceAddress,
    /// import ID (없으면 추적 상태의 id)
    pub import_id: Option<String>,
    /// 비교에서 제외할 키 접두어
    pub ignore: Vec<String>,
}

/// 케이스 단계
#[derive(Debug, Clone)]
pub enum Step {
    /// 구성 적용 후 검사
    Apply(ApplyStep),
    /// import 후 상태 비교
    ImportVerify(ImportStep),
}

impl Step {
    /// 메트릭/로그용 단계 종류
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Apply(_) => "apply",
            Self::ImportVerify(_) => "import",
        }
    }
}

// ─── TestCase ────────────────────────────────────────────────────────

/// 테스트 케이스
#[derive(Debug, Clone)]
pub struct TestCase {
    /// 케이스 이름 (실행 내 유일)
    pub name: String,
    /// 순서대로 실행할 단계
    pub steps: Vec<Step>,
    /// destroy 후 원격 부재 확인 여부
    pub check_destroy: bool,
    /// 격리 방식
    pub isolation: Isolation,
    /// 사전 검사
    pub prechecks: Vec<Precheck>,
}

impl TestCase {
    /// 빌더를 생성합니다.
    pub fn builder(name: impl Into<String>) -> TestCaseBuilder {
        TestCaseBuilder::new(name)
    }
}

/// [`TestCase`] 빌더
///
/// 주소 파싱 같은 검증은 [`build`](TestCaseBuilder::build)에서 한 번에 수행합니다.
#[derive(Debug)]
pub struct TestCaseBuilder {
    name: String,
    steps: Vec<PendingStep>,
    check_destroy: bool,
    isolation: Isolation,
    prechecks: Vec<Precheck>,
}

#[derive(Debug)]
enum PendingStep {
    Apply(ApplyStep),
    Import {
        address: String,
        import_id: Option<String>,
        ignore: Vec<String>,
    },
}

impl TestCaseBuilder {
    /// 새 빌더를 생성합니다. destroy 확인은 기본으로 켜져 있습니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            check_destroy: true,
            isolation: Isolation::Parallel,
            prechecks: Vec::new(),
        }
    }

    /// 격리 방식을 설정합니다.
    pub fn isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    /// destroy 확인 여부를 설정합니다.
    pub fn check_destroy(mut self, enabled: bool) -> Self {
        self.check_destroy = enabled;
        self
    }

    /// 사전 검사를 추가합니다.
    pub fn precheck(mut self, precheck: Precheck) -> Self {
        self.prechecks.push(precheck);
        self
    }

    /// apply 단계를 추가합니다.
    pub fn apply(
        mut self,
        scenario: impl Into<String>,
        params: TemplateParams,
        checks: Vec<StepCheck>,
    ) -> Self {
        self.steps.push(PendingStep::Apply(ApplyStep {
            scenario: scenario.into(),
            params,
            checks,
        }));
        self
    }

    /// import 검증 단계를 추가합니다 (id는 추적 상태에서).
    pub fn import_verify<I, S>(mut self, address: &str, ignore: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps.push(PendingStep::Import {
            address: address.to_owned(),
            import_id: None,
            ignore: ignore.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// 명시적 import ID로 import 검증 단계를 추가합니다.
    pub fn import_verify_with_id<I, S>(
        mut self,
        address: &str,
        import_id: impl Into<String>,
        ignore: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps.push(PendingStep::Import {
            address: address.to_owned(),
            import_id: Some(import_id.into()),
            ignore: ignore.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// 케이스를 만듭니다.
    ///
    /// 이름이 비었거나, 단계가 없거나, 첫 단계가 apply가 아니거나,
    /// import 주소가 잘못되었으면 에러를 반환합니다.
    pub fn build(self) -> Result<TestCase, RunnerError> {
        let invalid = |reason: String| RunnerError::InvalidCase {
            case: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_owned()));
        }
        match self.steps.first() {
            None => return Err(invalid("at least one step is required".to_owned())),
            Some(PendingStep::Import { .. }) => {
                return Err(invalid("the first step must apply a configuration".to_owned()));
            }
            Some(PendingStep::Apply(_)) => {}
        }

        let mut steps = Vec::with_capacity(self.steps.len());
        for (index, pending) in self.steps.into_iter().enumerate() {
            let step = match pending {
                PendingStep::Apply(apply) => Step::Apply(apply),
                PendingStep::Import {
                    address,
                    import_id,
                    ignore,
                } => {
                    let address = address
                        .parse::<ResourceAddress>()
                        .map_err(|e| invalid(format!("step {index}: {e}")))?;
                    if !address.is_managed() {
                        return Err(invalid(format!(
                            "step {index}: cannot import data source {address}"
                        )));
                    }
                    Step::ImportVerify(ImportStep {
                        address,
                        import_id,
                        ignore,
                    })
                }
            };
            steps.push(step);
        }

        Ok(TestCase {
            name: self.name,
            steps,
            check_destroy: self.check_destroy,
            isolation: self.isolation,
            prechecks: self.prechecks,
        })
    }
}
