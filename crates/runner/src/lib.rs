//! tfacc-runner -- 케이스 실행 엔진
//!
//! 선언적 테스트 케이스를 라이프사이클 드라이버로 실행합니다.
//!
//! # 모듈 구성
//!
//! - [`case`]: 테스트 케이스, 단계, 격리 그룹, 사전 검사
//! - [`driver`]: 라이프사이클 드라이버 trait과 팩토리
//! - [`stage`]: 케이스 하나의 렌더링 → apply → 검증 → import → destroy
//! - [`scheduler`]: 병렬 실행 제한과 배타 그룹
//! - [`report`]: 단계, 케이스, 스위트 보고서
//! - [`memory`]: 인메모리 클라우드와 시뮬레이션 드라이버
//! - [`terraform`]: terraform CLI 드라이버
//!
//! # 실행 흐름
//! ```text
//! Vec<TestCase> ──▶ Scheduler ──▶ StageRunner::run_case (케이스마다 태스크)
//!                                   │
//!                                   ├─ 렌더링 (모든 단계, 드라이버 호출 전)
//!                                   ├─ DriverFactory::create
//!                                   ├─ 단계 실행 (apply / import)
//!                                   └─ destroy + destroy 확인 (항상)
//!                                   ▼
//!                               CaseReport ──▶ SuiteReport
//! ```

pub mod case;
pub mod driver;
pub mod error;
pub mod memory;
pub mod report;
pub mod scheduler;
pub mod stage;
pub mod terraform;

// --- 주요 타입 re-export ---

pub use case::{ApplyStep, ImportStep, Isolation, Precheck, Step, StepCheck, TestCase, TestCaseBuilder};
pub use driver::{DriverFactory, DynDriver, LifecycleDriver};
pub use error::RunnerError;
pub use memory::{
    DataSourceBehavior, Fault, MemoryCloud, MemoryDriver, MemoryDriverFactory, Operation,
    PlainResource, RemoteContext, RemoteObject, ResourceBehavior, StaticDataSource,
};
pub use report::{CaseReport, CaseStatus, Failure, FailureKind, StepReport, StepStatus, SuiteReport};
pub use scheduler::Scheduler;
pub use stage::{RunSettings, StageRunner};
pub use terraform::{TerraformDriver, TerraformDriverFactory};
