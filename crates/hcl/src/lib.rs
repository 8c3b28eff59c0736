//! tfacc-hcl -- 구성 문서 모델, 표현식 언어, 렌더러, 템플릿 레지스트리
//!
//! # 모듈 구성
//!
//! - [`body`]: 블록/속성/값 문서 모델과 조각 합성
//! - [`ast`]: 표현식 AST
//! - [`parser`]: 표현식 및 문자열 템플릿 파서
//! - [`eval`]: 표현식 평가기 (시뮬레이션 드라이버용)
//! - [`functions`]: 내장 함수
//! - [`render`]: `terraform fmt` 스타일 텍스트 렌더러
//! - [`validate`]: 라벨, 구문, 참조 무결성 검증
//! - [`template`]: 시나리오 템플릿 레지스트리
//! - [`error`]: 도메인 에러 타입
//!
//! # 흐름
//!
//! ```text
//! TemplateParams -> Template::build -> Document -> validate -> render -> RenderedConfig
//! ```

pub mod ast;
pub mod body;
pub mod error;
pub mod eval;
pub mod functions;
pub mod parser;
pub mod render;
pub mod template;
pub mod validate;

// --- 주요 타입 re-export ---

// 문서 모델
pub use body::{Attribute, Block, Body, BodyItem, Document, Expr};

// 표현식
pub use ast::{Expression, Step, Traversal};
pub use eval::{Resolved, Scope, StaticScope, evaluate};
pub use parser::{parse_expression, parse_template};

// 렌더링/검증
pub use render::render;
pub use validate::validate;

// 템플릿
pub use template::{FnTemplate, ParamValue, RenderedConfig, Template, TemplateParams, TemplateRegistry};

// 에러
pub use error::HclError;
