//! tfacc-core -- 수용 테스트 하네스 공통 기반
//!
//! 모든 tfacc 크레이트가 공유하는 타입을 정의합니다.
//!
//! - [`error`]: 실패 범주별 에러 (`Config`, `Render`, `Driver`, `Verify`, `Io`)
//! - [`config`]: `tfacc.toml` 설정과 환경변수 오버라이드
//! - [`types`]: 리소스 주소, 리소스 상태, 상태 스냅샷
//! - [`flatmap`]: 중첩 속성을 `tags.%`, `volumes.#` 형태로 펼치기
//! - [`naming`]: 실행 내 유일한 리소스 이름과 비밀번호 생성
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod flatmap;
pub mod metrics;
pub mod naming;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, DriverError, RenderError, TfaccError, VerifyError};

// 설정
pub use config::TfaccConfig;

// 이름 생성
pub use naming::{NameGenerator, PasswordPolicy, RandomNameGenerator, Separator};

// 도메인 타입
pub use types::{ResourceAddress, ResourceIndex, ResourceMode, ResourceState, StateSnapshot};
