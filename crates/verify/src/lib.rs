//! tfacc-verify -- 상태 검증기
//!
//! # 모듈 구성
//!
//! - [`check`]: 속성 체크와 기대값 정의
//! - [`reference`]: `${<address>.<attr>}` 참조 해석
//! - [`verify`]: 스냅샷 검증과 결과 보고서
//! - [`import`]: import 상태 비교 (무시 목록, 상위집합 계약)
//!
//! 에러는 `tfacc-core`의 [`VerifyError`]를 그대로 사용합니다.

pub mod check;
pub mod import;
pub mod reference;
pub mod verify;

// --- 주요 타입 re-export ---

pub use check::{AttributeCheck, Expectation};
pub use import::{ImportDiff, ImportMismatch, diff_import, is_ignored};
pub use reference::AttributeRef;
pub use verify::{CheckOutcome, VerificationReport, verify};

pub use tfacc_core::error::VerifyError;
