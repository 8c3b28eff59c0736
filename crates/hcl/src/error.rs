//! 구성 렌더러 에러 타입
//!
//! [`HclError`]는 문서 구성, 표현식 파싱, 참조 검증, 템플릿 파라미터 처리에서
//! 발생하는 모든 에러를 표현합니다. `From<HclError> for TfaccError` 변환은
//! 항상 `Render` 범주로 합류하므로 케이스는 드라이버 호출 전에 중단됩니다.

use tfacc_core::error::{RenderError, TfaccError};

/// 구성 렌더러 도메인 에러
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HclError {
    /// 표현식 구문 오류
    #[error("parse error at offset {offset}: {reason}")]
    Parse {
        /// 입력 내 바이트 오프셋
        offset: usize,
        /// 실패 사유
        reason: String,
    },

    /// 같은 주소의 블록이 두 번 선언됨
    #[error("duplicate block: {0}")]
    DuplicateBlock(String),

    /// 라벨 개수가 맞지 않거나 빈 라벨
    #[error("invalid labels on '{block}' block: {reason}")]
    InvalidLabel {
        /// 블록 종류
        block: String,
        /// 사유
        reason: String,
    },

    /// 선언되지 않은 대상을 참조
    #[error("reference to undeclared '{reference}' in {context}")]
    UndeclaredReference {
        /// 참조 텍스트 (예: `var.missing`)
        reference: String,
        /// 참조가 나타난 위치 (블록 주소와 속성 이름)
        context: String,
    },

    /// 등록되지 않은 시나리오
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    /// 이미 등록된 시나리오
    #[error("scenario already registered: {0}")]
    AlreadyRegistered(String),

    /// 필수 파라미터 누락
    #[error("scenario '{scenario}' is missing parameter '{name}'")]
    MissingParameter {
        /// 시나리오 이름
        scenario: String,
        /// 파라미터 이름
        name: String,
    },

    /// 파라미터 타입 불일치
    #[error("parameter '{name}' expected {expected}, got {actual}")]
    InvalidParameter {
        /// 파라미터 이름
        name: String,
        /// 기대 타입
        expected: String,
        /// 실제 타입
        actual: String,
    },

    /// 표현식 평가 실패
    #[error("evaluation error: {0}")]
    Eval(String),
}

impl From<HclError> for TfaccError {
    fn from(err: HclError) -> Self {
        let render = match err {
            HclError::UnknownScenario(name) => RenderError::UnknownScenario(name),
            HclError::MissingParameter { scenario, name } => {
                RenderError::MissingParameter { scenario, name }
            }
            HclError::InvalidParameter {
                name,
                expected,
                actual,
            } => RenderError::InvalidParameter {
                name,
                reason: format!("expected {expected}, got {actual}"),
            },
            other => RenderError::Malformed(other.to_string()),
        };
        TfaccError::Render(render)
    }
}
