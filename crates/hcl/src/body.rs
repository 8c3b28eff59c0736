//! 구성 문서 모델 -- 블록, 속성, 값
//!
//! 시나리오는 텍스트를 직접 이어붙이지 않고 [`Document`]를 조립합니다.
//! 렌더링은 [`render`](crate::render), 검증은 [`validate`](crate::validate)가 담당합니다.
//!
//! # 사용 예시
//! ```
//! use tfacc_hcl::body::{Block, Document, Expr};
//!
//! let mut doc = Document::new();
//! doc.push(
//!     Block::resource("flexibleengine_vpc_v1", "test")
//!         .attr("name", Expr::str("tf-test-abcde"))
//!         .attr("cidr", Expr::str("192.168.0.0/16")),
//! )
//! .unwrap();
//! assert_eq!(doc.blocks().len(), 1);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde_json::Value;

use crate::ast::Expression;
use crate::error::HclError;
use crate::parser::{parse_expression, parse_template};

// ─── Expr ────────────────────────────────────────────────────────────

/// 속성 값
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// 따옴표 문자열. `${ }` 보간을 포함할 수 있습니다.
    Str(String),
    /// 정수
    Int(i64),
    /// 실수
    Float(f64),
    /// 불리언
    Bool(bool),
    /// `null`
    Null,
    /// 리스트
    List(Vec<Expr>),
    /// 객체 (키 순서 유지)
    Object(Vec<(String, Expr)>),
    /// 그대로 출력할 표현식 텍스트 (예: `data.t.n.id`)
    Raw(String),
}

impl Expr {
    /// 문자열 값
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    /// 표현식 텍스트
    pub fn raw(s: impl Into<String>) -> Self {
        Self::Raw(s.into())
    }

    /// 문자열 리스트
    pub fn str_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::Str(s.into())).collect())
    }

    /// 문자열 맵 (태그 등)
    pub fn str_map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), Self::Str(v.into())))
                .collect(),
        )
    }

    /// 다른 블록 속성에 대한 참조 (`<address>.<attr>`)
    pub fn reference(address: &str, attr: &str) -> Self {
        Self::Raw(format!("{address}.{attr}"))
    }

    /// JSON 값을 속성 값으로 변환합니다.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::Str(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// 표현식 AST로 변환합니다.
    pub fn to_expression(&self) -> Result<Expression, HclError> {
        Ok(match self {
            Self::Str(s) => parse_template(s)?,
            Self::Int(i) => Expression::Literal(Value::from(*i)),
            Self::Float(f) => Expression::Literal(
                serde_json::Number::from_f64(*f)
                    .map(Value::Number)
                    .ok_or_else(|| HclError::Eval(format!("non-finite number {f}")))?,
            ),
            Self::Bool(b) => Expression::Literal(Value::Bool(*b)),
            Self::Null => Expression::Literal(Value::Null),
            Self::List(items) => Expression::Tuple(
                items
                    .iter()
                    .map(Self::to_expression)
                    .collect::<Result<_, _>>()?,
            ),
            Self::Object(entries) => Expression::Object(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_expression()?)))
                    .collect::<Result<_, HclError>>()?,
            ),
            Self::Raw(text) => parse_expression(text)?,
        })
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Expr {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// ─── Body ────────────────────────────────────────────────────────────

/// 속성
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// 속성 이름
    pub name: String,
    /// 값
    pub value: Expr,
}

/// 블록 본문 항목
#[derive(Debug, Clone, PartialEq)]
pub enum BodyItem {
    /// `name = value`
    Attribute(Attribute),
    /// 중첩 블록
    Block(Block),
    /// 빈 줄 (정렬 그룹 구분)
    Blank,
}

/// 블록 본문
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    items: Vec<BodyItem>,
}

impl Body {
    /// 빈 본문
    pub fn new() -> Self {
        Self::default()
    }

    /// 본문 항목
    pub fn items(&self) -> &[BodyItem] {
        &self.items
    }

    /// 속성만
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.items.iter().filter_map(|item| match item {
            BodyItem::Attribute(attr) => Some(attr),
            _ => None,
        })
    }

    /// 중첩 블록만
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.items.iter().filter_map(|item| match item {
            BodyItem::Block(block) => Some(block),
            _ => None,
        })
    }

    /// 이름으로 속성을 찾습니다.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes().find(|attr| attr.name == name)
    }

    /// 속성을 추가하거나 같은 이름의 속성 값을 바꿉니다.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Expr>) {
        let name = name.into();
        let value = value.into();
        for item in &mut self.items {
            if let BodyItem::Attribute(attr) = item
                && attr.name == name
            {
                attr.value = value;
                return;
            }
        }
        self.items.push(BodyItem::Attribute(Attribute { name, value }));
    }

    /// 속성을 제거합니다. 제거했으면 `true`.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.items.len();
        self.items
            .retain(|item| !matches!(item, BodyItem::Attribute(attr) if attr.name == name));
        before != self.items.len()
    }

    /// 중첩 블록을 추가합니다.
    pub fn push_block(&mut self, block: Block) {
        self.items.push(BodyItem::Block(block));
    }

    /// 빈 줄을 추가합니다.
    pub fn push_blank(&mut self) {
        self.items.push(BodyItem::Blank);
    }
}

// ─── Block ───────────────────────────────────────────────────────────

/// 블록 (`resource "t" "n" { ... }`)
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// 블록 종류 (`resource`, `data`, `variable`, `locals`, `network`, ...)
    pub kind: String,
    /// 라벨
    pub labels: Vec<String>,
    /// 본문
    pub body: Body,
}

impl Block {
    /// 라벨 없는 블록
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            labels: Vec::new(),
            body: Body::new(),
        }
    }

    /// `resource "<type>" "<name>"`
    pub fn resource(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new("resource").label(resource_type).label(name)
    }

    /// `data "<type>" "<name>"`
    pub fn data(data_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new("data").label(data_type).label(name)
    }

    /// `variable "<name>"`
    pub fn variable(name: impl Into<String>) -> Self {
        Self::new("variable").label(name)
    }

    /// `locals`
    pub fn locals() -> Self {
        Self::new("locals")
    }

    /// `output "<name>"`
    pub fn output(name: impl Into<String>) -> Self {
        Self::new("output").label(name)
    }

    /// 라벨을 덧붙입니다.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// 속성을 추가합니다.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.body.set(name, value);
        self
    }

    /// 값이 있을 때만 속성을 추가합니다.
    pub fn attr_opt(self, name: impl Into<String>, value: Option<impl Into<Expr>>) -> Self {
        match value {
            Some(value) => self.attr(name, value),
            None => self,
        }
    }

    /// 중첩 블록을 추가합니다.
    pub fn nested(mut self, block: Block) -> Self {
        self.body.push_block(block);
        self
    }

    /// 빈 줄을 추가합니다.
    pub fn gap(mut self) -> Self {
        self.body.push_blank();
        self
    }

    /// 최상위 블록 주소 (`data.t.n`, `t.n`, `var.x`, `output.x`)
    ///
    /// `locals` 같은 라벨 없는 블록은 `None`입니다.
    pub fn address(&self) -> Option<String> {
        match (self.kind.as_str(), self.labels.as_slice()) {
            ("resource", [ty, name]) => Some(format!("{ty}.{name}")),
            ("data", [ty, name]) => Some(format!("data.{ty}.{name}")),
            ("variable", [name]) => Some(format!("var.{name}")),
            ("output", [name]) => Some(format!("output.{name}")),
            ("provider", [name]) => Some(format!("provider.{name}")),
            ("terraform", []) => Some("terraform".to_owned()),
            _ => None,
        }
    }
}

// ─── Document ────────────────────────────────────────────────────────

/// 구성 문서
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    blocks: Vec<Block>,
}

impl Document {
    /// 빈 문서
    pub fn new() -> Self {
        Self::default()
    }

    /// 최상위 블록
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// 블록을 추가합니다.
    ///
    /// 같은 주소의 블록이나 같은 이름의 local 값이 이미 있으면 에러를 반환합니다.
    pub fn push(&mut self, block: Block) -> Result<&mut Self, HclError> {
        if let Some(address) = block.address()
            && self.blocks.iter().any(|b| b.address().as_ref() == Some(&address))
        {
            return Err(HclError::DuplicateBlock(address));
        }
        if block.kind == "locals" {
            let existing: HashSet<&str> = self.local_names().collect();
            for attr in block.body.attributes() {
                if existing.contains(attr.name.as_str()) {
                    return Err(HclError::DuplicateBlock(format!("local.{}", attr.name)));
                }
            }
        }
        self.blocks.push(block);
        Ok(self)
    }

    /// 다른 문서의 블록을 이어붙입니다.
    pub fn merge(&mut self, other: Document) -> Result<&mut Self, HclError> {
        for block in other.blocks {
            self.push(block)?;
        }
        Ok(self)
    }

    /// 여러 조각을 순서대로 합칩니다.
    pub fn compose(fragments: impl IntoIterator<Item = Document>) -> Result<Self, HclError> {
        let mut doc = Self::new();
        for fragment in fragments {
            doc.merge(fragment)?;
        }
        Ok(doc)
    }

    /// 주소로 블록을 찾습니다.
    pub fn find(&self, address: &str) -> Option<&Block> {
        self.blocks
            .iter()
            .find(|b| b.address().as_deref() == Some(address))
    }

    /// 주소로 블록을 가변 참조합니다.
    pub fn find_mut(&mut self, address: &str) -> Option<&mut Block> {
        self.blocks
            .iter_mut()
            .find(|b| b.address().as_deref() == Some(address))
    }

    /// 종류별 블록
    pub fn blocks_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.blocks.iter().filter(move |b| b.kind == kind)
    }

    /// 모든 `locals` 블록에 선언된 이름
    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.blocks_of("locals")
            .flat_map(|b| b.body.attributes().map(|a| a.name.as_str()))
    }

    /// 모든 local 값 (이름 → 값)
    pub fn locals(&self) -> BTreeMap<&str, &Expr> {
        self.blocks_of("locals")
            .flat_map(|b| b.body.attributes().map(|a| (a.name.as_str(), &a.value)))
            .collect()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::render::render(self))
    }
}
