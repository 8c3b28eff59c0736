//! 에러 타입 -- 실패 범주별 에러 정의
//!
//! 하네스가 보고하는 실패는 다섯 범주로 나뉩니다.
//! 설정(`Config`), 렌더링(`Render`), 드라이버(`Driver`), 검증(`Verify`), I/O.
//! 각 도메인 크레이트는 자체 에러 타입을 정의하고 `From` 변환으로
//! [`TfaccError`]에 합류합니다.

use std::time::Duration;

/// tfacc 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TfaccError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 구성 텍스트 렌더링 에러 (치명적, 케이스 즉시 중단)
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// 라이프사이클 드라이버 에러
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// 검증 정의 에러 (잘못된 체크 정의 등)
    #[error("verify error: {0}")]
    Verify(#[from] VerifyError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 렌더링 에러
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// 등록되지 않은 시나리오
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    /// 필수 파라미터 누락
    #[error("scenario '{scenario}' is missing parameter '{name}'")]
    MissingParameter { scenario: String, name: String },

    /// 파라미터 타입/형식 불일치
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// 구성 문서 구조 오류 (중복 블록, 빈 라벨, 미선언 참조 등)
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// 라이프사이클 드라이버 에러
///
/// 타임아웃은 원격 에러와 구별되는 별도 범주입니다.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// apply 실패
    #[error("apply failed: {0}")]
    Apply(String),

    /// destroy 실패
    #[error("destroy failed: {0}")]
    Destroy(String),

    /// import 실패
    #[error("import of '{address}' failed: {reason}")]
    Import { address: String, reason: String },

    /// 원격 상태 조회 실패
    #[error("read of '{address}' failed: {reason}")]
    Read { address: String, reason: String },

    /// 테넌트 단위 잠금 충돌
    #[error("conflict on '{resource_type}': {reason}")]
    Conflict {
        resource_type: String,
        reason: String,
    },

    /// 작업 시간 초과
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: String,
        elapsed: Duration,
    },

    /// 외부 프로세스 실행 실패
    #[error("process '{program}' failed: {reason}")]
    Process { program: String, reason: String },
}

impl DriverError {
    /// 타임아웃 범주인지 여부
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// 검증 정의 에러
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// 잘못된 리소스 주소
    #[error("invalid resource address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// 잘못된 정규식 패턴
    #[error("invalid pattern for '{path}': {reason}")]
    InvalidPattern { path: String, reason: String },
}
