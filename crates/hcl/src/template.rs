//! 템플릿 레지스트리 -- 시나리오 이름 + 파라미터 → 렌더링된 구성
//!
//! [`Template`]은 파라미터로부터 [`Document`]를 조립하는 시나리오 구성 생성기입니다.
//! [`TemplateRegistry`]는 템플릿을 이름으로 등록하고, 렌더링 요청 시
//! 조립 → 검증 → 텍스트 출력을 차례로 수행합니다.
//!
//! # 사용 예시
//! ```
//! use tfacc_hcl::body::{Block, Document};
//! use tfacc_hcl::template::{TemplateParams, TemplateRegistry};
//!
//! let mut registry = TemplateRegistry::new();
//! registry
//!     .register_fn("vpc", |params| {
//!         let mut doc = Document::new();
//!         doc.push(Block::resource("flexibleengine_vpc_v1", "test").attr("name", params.str("name")?))?;
//!         Ok(doc)
//!     })
//!     .unwrap();
//!
//! let rendered = registry
//!     .render("vpc", &TemplateParams::new().with("name", "tf-test-abcde"))
//!     .unwrap();
//! assert!(rendered.text.contains("name = \"tf-test-abcde\""));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::body::{Document, Expr};
use crate::error::HclError;
use crate::render::render;
use crate::validate::validate;

// ─── ParamValue ──────────────────────────────────────────────────────

/// 템플릿 파라미터 값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// 불리언
    Bool(bool),
    /// 정수
    Int(i64),
    /// 실수
    Float(f64),
    /// 문자열
    Str(String),
    /// 리스트
    List(Vec<ParamValue>),
    /// 맵
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// 타입 이름 (에러 메시지용)
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// 구성 값으로 변환합니다.
    pub fn to_expr(&self) -> Expr {
        match self {
            Self::Bool(b) => Expr::Bool(*b),
            Self::Int(i) => Expr::Int(*i),
            Self::Float(f) => Expr::Float(*f),
            Self::Str(s) => Expr::Str(s.clone()),
            Self::List(items) => Expr::List(items.iter().map(Self::to_expr).collect()),
            Self::Map(map) => Expr::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_expr()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => write!(f, "[{} items]", items.len()),
            Self::Map(map) => write!(f, "{{{} entries}}", map.len()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// ─── TemplateParams ──────────────────────────────────────────────────

/// 템플릿 파라미터 모음
///
/// 조회 메서드는 누락 시 [`HclError::MissingParameter`], 타입 불일치 시
/// [`HclError::InvalidParameter`]를 반환합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateParams {
    values: BTreeMap<String, ParamValue>,
    #[serde(skip)]
    scenario: String,
}

impl TemplateParams {
    /// 빈 파라미터
    pub fn new() -> Self {
        Self::default()
    }

    /// 값을 추가합니다 (빌더).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// 값을 추가하거나 바꿉니다.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// 원시 값 조회
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// 파라미터 이름 목록
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// 에러 메시지에 쓸 시나리오 이름을 지정합니다.
    fn scoped(&self, scenario: &str) -> Self {
        Self {
            values: self.values.clone(),
            scenario: scenario.to_owned(),
        }
    }

    fn require(&self, name: &str) -> Result<&ParamValue, HclError> {
        self.values.get(name).ok_or_else(|| HclError::MissingParameter {
            scenario: self.scenario.clone(),
            name: name.to_owned(),
        })
    }

    fn mismatch(name: &str, expected: &str, actual: &ParamValue) -> HclError {
        HclError::InvalidParameter {
            name: name.to_owned(),
            expected: expected.to_owned(),
            actual: actual.type_name().to_owned(),
        }
    }

    /// 문자열 파라미터
    pub fn str(&self, name: &str) -> Result<&str, HclError> {
        match self.require(name)? {
            ParamValue::Str(s) => Ok(s),
            other => Err(Self::mismatch(name, "string", other)),
        }
    }

    /// 선택적 문자열 파라미터
    pub fn opt_str(&self, name: &str) -> Result<Option<&str>, HclError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Str(s)) => Ok(Some(s)),
            Some(other) => Err(Self::mismatch(name, "string", other)),
        }
    }

    /// 정수 파라미터
    pub fn int(&self, name: &str) -> Result<i64, HclError> {
        match self.require(name)? {
            ParamValue::Int(i) => Ok(*i),
            other => Err(Self::mismatch(name, "int", other)),
        }
    }

    /// 불리언 파라미터
    pub fn bool(&self, name: &str) -> Result<bool, HclError> {
        match self.require(name)? {
            ParamValue::Bool(b) => Ok(*b),
            other => Err(Self::mismatch(name, "bool", other)),
        }
    }

    /// 리스트 파라미터
    pub fn list(&self, name: &str) -> Result<&[ParamValue], HclError> {
        match self.require(name)? {
            ParamValue::List(items) => Ok(items),
            other => Err(Self::mismatch(name, "list", other)),
        }
    }

    /// 맵 파라미터
    pub fn map(&self, name: &str) -> Result<&BTreeMap<String, ParamValue>, HclError> {
        match self.require(name)? {
            ParamValue::Map(map) => Ok(map),
            other => Err(Self::mismatch(name, "map", other)),
        }
    }

    /// 파라미터를 구성 값으로 변환합니다.
    pub fn expr(&self, name: &str) -> Result<Expr, HclError> {
        self.require(name).map(ParamValue::to_expr)
    }
}

impl<K, V> FromIterator<(K, V)> for TemplateParams
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

// ─── Template ────────────────────────────────────────────────────────

/// 시나리오 구성 생성기
pub trait Template: Send + Sync {
    /// 시나리오 이름 (레지스트리 키)
    fn name(&self) -> &str;

    /// 파라미터로 문서를 조립합니다.
    fn build(&self, params: &TemplateParams) -> Result<Document, HclError>;
}

type BuildFn = dyn Fn(&TemplateParams) -> Result<Document, HclError> + Send + Sync;

/// 클로저 기반 템플릿
pub struct FnTemplate {
    name: String,
    build: Box<BuildFn>,
}

impl FnTemplate {
    /// 이름과 조립 함수로 템플릿을 만듭니다.
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(&TemplateParams) -> Result<Document, HclError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            build: Box::new(build),
        }
    }
}

impl Template for FnTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self, params: &TemplateParams) -> Result<Document, HclError> {
        (self.build)(params)
    }
}

// ─── RenderedConfig ──────────────────────────────────────────────────

/// 렌더링 결과
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedConfig {
    /// 시나리오 이름
    pub scenario: String,
    /// 구성 텍스트
    pub text: String,
    /// 검증을 통과한 문서
    pub document: Document,
}

// ─── TemplateRegistry ────────────────────────────────────────────────

/// 템플릿 레지스트리
///
/// 등록 순서가 보존됩니다.
#[derive(Default)]
pub struct TemplateRegistry {
    templates: Vec<Box<dyn Template>>,
}

impl TemplateRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 템플릿을 등록합니다.
    ///
    /// 같은 이름의 템플릿이 이미 있으면 에러를 반환합니다.
    pub fn register(&mut self, template: Box<dyn Template>) -> Result<(), HclError> {
        let name = template.name().to_owned();
        if self.contains(&name) {
            return Err(HclError::AlreadyRegistered(name));
        }
        self.templates.push(template);
        Ok(())
    }

    /// 클로저를 템플릿으로 등록합니다.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, build: F) -> Result<(), HclError>
    where
        F: Fn(&TemplateParams) -> Result<Document, HclError> + Send + Sync + 'static,
    {
        self.register(Box::new(FnTemplate::new(name, build)))
    }

    /// 이름으로 템플릿을 조회합니다.
    pub fn get(&self, name: &str) -> Option<&dyn Template> {
        self.templates
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// 등록 여부
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 등록된 템플릿 이름 (등록 순서)
    pub fn names(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.name()).collect()
    }

    /// 등록된 템플릿 수
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// 시나리오를 렌더링합니다.
    ///
    /// 조립 → 검증 → 텍스트 출력 순으로 진행하며, 어느 단계든 실패하면
    /// 텍스트 없이 에러를 반환합니다.
    pub fn render(
        &self,
        scenario: &str,
        params: &TemplateParams,
    ) -> Result<RenderedConfig, HclError> {
        let template = self
            .get(scenario)
            .ok_or_else(|| HclError::UnknownScenario(scenario.to_owned()))?;

        let document = template.build(&params.scoped(scenario))?;
        validate(&document)?;
        let text = render(&document);

        debug!(
            scenario,
            blocks = document.blocks().len(),
            bytes = text.len(),
            "configuration rendered"
        );

        Ok(RenderedConfig {
            scenario: scenario.to_owned(),
            text,
            document,
        })
    }
}

impl fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("templates", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Block;

    fn registry() -> TemplateRegistry {
        let mut registry = TemplateRegistry::new();
        registry
            .register_fn("vpc", |params| {
                let mut doc = Document::new();
                doc.push(
                    Block::resource("flexibleengine_vpc_v1", "test")
                        .attr("name", params.str("name")?)
                        .attr("cidr", params.opt_str("cidr")?.unwrap_or("192.168.0.0/16")),
                )?;
                Ok(doc)
            })
            .unwrap();
        registry
            .register_fn("broken", |_| {
                let mut doc = Document::new();
                doc.push(Block::resource("t", "n").attr("x", Expr::raw("var.nope")))?;
                Ok(doc)
            })
            .unwrap();
        registry
    }

    #[test]
    fn renders_registered_scenario() {
        let rendered = registry()
            .render("vpc", &TemplateParams::new().with("name", "tf-test-abcde"))
            .unwrap();
        assert_eq!(rendered.scenario, "vpc");
        assert!(rendered.text.contains("name = \"tf-test-abcde\""));
        assert!(rendered.document.find("flexibleengine_vpc_v1.test").is_some());
    }

    #[test]
    fn unknown_scenario() {
        let err = registry().render("nope", &TemplateParams::new()).unwrap_err();
        assert_eq!(err, HclError::UnknownScenario("nope".to_owned()));
    }

    #[test]
    fn missing_parameter_names_scenario() {
        let err = registry().render("vpc", &TemplateParams::new()).unwrap_err();
        assert_eq!(
            err,
            HclError::MissingParameter {
                scenario: "vpc".to_owned(),
                name: "name".to_owned(),
            }
        );
    }

    #[test]
    fn mistyped_parameter() {
        let err = registry()
            .render("vpc", &TemplateParams::new().with("name", 5i64))
            .unwrap_err();
        assert!(matches!(
            err,
            HclError::InvalidParameter { ref expected, ref actual, .. }
                if expected == "string" && actual == "int"
        ));
    }

    #[test]
    fn validation_failure_produces_no_text() {
        let err = registry().render("broken", &TemplateParams::new()).unwrap_err();
        assert!(matches!(err, HclError::UndeclaredReference { .. }));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = registry();
        let err = registry
            .register_fn("vpc", |_| Ok(Document::new()))
            .unwrap_err();
        assert_eq!(err, HclError::AlreadyRegistered("vpc".to_owned()));
        assert_eq!(registry.names(), vec!["vpc", "broken"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn param_values_convert_to_exprs() {
        let params: TemplateParams = [("size", ParamValue::Int(100)), ("shared", true.into())]
            .into_iter()
            .collect();
        assert_eq!(params.expr("size").unwrap(), Expr::Int(100));
        assert!(params.bool("shared").unwrap());
        assert!(params.list("size").is_err());

        let list = ParamValue::List(vec!["a".into(), 1i64.into()]);
        assert_eq!(
            list.to_expr(),
            Expr::List(vec![Expr::str("a"), Expr::Int(1)])
        );
    }
}
