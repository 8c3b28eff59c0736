//! 문서 검증 -- 라벨, 표현식 구문, 참조 무결성
//!
//! 렌더링 전에 실행되며, 실패하면 드라이버는 호출되지 않습니다.
//!
//! 검사 항목:
//! 1. 최상위 블록 종류와 라벨 개수
//! 2. 모든 속성 값이 표현식으로 파싱되는지
//! 3. `var.*`, `local.*`, `data.T.N`, `T.N` 참조가 문서 안에 선언되어 있는지
//! 4. `count.index`가 `count`를 가진 블록 안에서만 쓰이는지

use std::collections::HashSet;

use tfacc_core::types::is_identifier;

use crate::ast::{Expression, Traversal};
use crate::body::{Block, Document};
use crate::error::HclError;

/// 검증하지 않는 참조 루트
const IGNORED_ROOTS: &[&str] = &["each", "path", "self", "terraform"];

/// 문서 전체를 검증합니다.
pub fn validate(doc: &Document) -> Result<(), HclError> {
    for block in doc.blocks() {
        check_labels(block)?;
    }

    let declared = Declarations::collect(doc);
    for block in doc.blocks() {
        let context = block.address().unwrap_or_else(|| block.kind.clone());
        let has_count = block.body.attribute("count").is_some();
        check_body(block, &context, has_count, &declared)?;
    }
    Ok(())
}

fn check_labels(block: &Block) -> Result<(), HclError> {
    let expected = match block.kind.as_str() {
        "resource" | "data" => 2,
        "variable" | "output" | "provider" | "module" => 1,
        "locals" | "terraform" => 0,
        other => {
            return Err(HclError::InvalidLabel {
                block: other.to_owned(),
                reason: "unsupported top-level block".to_owned(),
            });
        }
    };
    if block.labels.len() != expected {
        return Err(HclError::InvalidLabel {
            block: block.kind.clone(),
            reason: format!("expected {expected} label(s), got {}", block.labels.len()),
        });
    }
    if let Some(bad) = block.labels.iter().find(|l| !is_identifier(l)) {
        return Err(HclError::InvalidLabel {
            block: block.kind.clone(),
            reason: format!("'{bad}' is not a valid identifier"),
        });
    }
    Ok(())
}

/// 문서에 선언된 참조 대상
#[derive(Debug, Default)]
struct Declarations {
    variables: HashSet<String>,
    locals: HashSet<String>,
    data: HashSet<(String, String)>,
    resources: HashSet<(String, String)>,
}

impl Declarations {
    fn collect(doc: &Document) -> Self {
        let mut declared = Self::default();
        for block in doc.blocks() {
            match (block.kind.as_str(), block.labels.as_slice()) {
                ("variable", [name]) => {
                    declared.variables.insert(name.clone());
                }
                ("data", [ty, name]) => {
                    declared.data.insert((ty.clone(), name.clone()));
                }
                ("resource", [ty, name]) => {
                    declared.resources.insert((ty.clone(), name.clone()));
                }
                _ => {}
            }
        }
        declared
            .locals
            .extend(doc.local_names().map(str::to_owned));
        declared
    }

    fn check(&self, traversal: &Traversal, has_count: bool) -> Result<(), String> {
        let attrs = traversal.leading_attrs();
        let root = traversal.root.as_str();
        let found = match root {
            "var" => attrs.first().is_some_and(|n| self.variables.contains(*n)),
            "local" => attrs.first().is_some_and(|n| self.locals.contains(*n)),
            "data" => match attrs.as_slice() {
                [ty, name, ..] => self.data.contains(&(ty.to_string(), name.to_string())),
                _ => false,
            },
            "count" => has_count && attrs.first() == Some(&"index"),
            r if IGNORED_ROOTS.contains(&r) => true,
            ty => attrs
                .first()
                .is_some_and(|n| self.resources.contains(&(ty.to_owned(), n.to_string()))),
        };
        if found {
            return Ok(());
        }
        let shown: Vec<&str> = match root {
            "data" => attrs.iter().take(2).copied().collect(),
            _ => attrs.iter().take(1).copied().collect(),
        };
        Err(std::iter::once(root)
            .chain(shown)
            .collect::<Vec<_>>()
            .join("."))
    }
}

fn check_body(
    block: &Block,
    context: &str,
    has_count: bool,
    declared: &Declarations,
) -> Result<(), HclError> {
    for attr in block.body.attributes() {
        // 변수 타입 제약(`list(object({...}))`)은 참조가 아닙니다.
        if block.kind == "variable" && attr.name == "type" {
            attr.value.to_expression()?;
            continue;
        }
        let expr = attr.value.to_expression()?;
        // `count` 자체는 count.index를 쓸 수 없습니다.
        let counted = has_count && attr.name != "count";
        check_expression(&expr, counted, declared).map_err(|reference| {
            HclError::UndeclaredReference {
                reference,
                context: format!("{context}: {}", attr.name),
            }
        })?;
    }
    for nested in block.body.blocks() {
        let context = format!("{context}.{}", nested.kind);
        check_body(nested, &context, has_count, declared)?;
    }
    Ok(())
}

fn check_expression(
    expr: &Expression,
    has_count: bool,
    declared: &Declarations,
) -> Result<(), String> {
    let mut first_error = None;
    expr.visit_traversals(&mut |traversal| {
        if first_error.is_none()
            && let Err(reference) = declared.check(traversal, has_count)
        {
            first_error = Some(reference);
        }
    });
    match first_error {
        Some(reference) => Err(reference),
        None => Ok(()),
    }
}
