//! 러너 에러 타입
//!
//! 케이스 정의 오류와 시뮬레이션 테넌트 등록 오류를 표현합니다.
//! 케이스 실행 중 발생하는 실패는 에러가 아니라 [`CaseReport`](crate::report::CaseReport)에
//! 기록됩니다.

use tfacc_core::error::{ConfigError, DriverError, TfaccError};

/// 러너 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// 잘못된 케이스 정의
    #[error("invalid test case '{case}': {reason}")]
    InvalidCase {
        /// 케이스 이름
        case: String,
        /// 사유
        reason: String,
    },

    /// 같은 이름의 케이스가 이미 있음
    #[error("duplicate test case: {0}")]
    DuplicateCase(String),

    /// 같은 타입의 동작이 이미 등록됨
    #[error("behavior already registered for '{0}'")]
    AlreadyRegistered(String),

    /// 드라이버 에러
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl From<RunnerError> for TfaccError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::InvalidCase { case, reason } => ConfigError::InvalidValue {
                field: format!("case.{case}"),
                reason,
            }
            .into(),
            RunnerError::DuplicateCase(name) => ConfigError::InvalidValue {
                field: format!("case.{name}"),
                reason: "duplicate test case".to_owned(),
            }
            .into(),
            RunnerError::AlreadyRegistered(ty) => ConfigError::InvalidValue {
                field: format!("behavior.{ty}"),
                reason: "already registered".to_owned(),
            }
            .into(),
            RunnerError::Driver(e) => TfaccError::Driver(e),
        }
    }
}
