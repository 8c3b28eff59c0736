//! 표현식 평가기
//!
//! 참조 해석은 [`Scope`]에 위임합니다. 시뮬레이션 드라이버는 의존 대상을
//! 필요할 때 생성하는 지연 스코프를, 테스트는 [`StaticScope`]를 사용합니다.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tfacc_core::flatmap::scalar_to_string;

use crate::ast::{BinaryOp, Expression, Step, TemplatePart};
use crate::error::HclError;
use crate::functions::{self, as_index, number_value, type_name};

/// 참조 해석 결과
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// 해석된 값
    pub value: Value,
    /// 루트 뒤에서 소비한 속성 이름 수
    pub consumed: usize,
}

/// 참조 해석 스코프
pub trait Scope {
    /// 루트 식별자와 선두 속성 이름들로 참조 대상을 찾습니다.
    ///
    /// 예를 들어 `data.t.n.names[0]`은 `root = "data"`, `attrs = ["t", "n", "names"]`로
    /// 호출되며, 스코프가 `data.t.n` 객체를 반환하면 `consumed = 2`입니다.
    /// 나머지 단계는 평가기가 값에 직접 적용합니다.
    fn resolve(&mut self, root: &str, attrs: &[&str]) -> Result<Resolved, HclError>;
}

/// 고정된 루트 값 맵으로 참조를 해석하는 스코프
#[derive(Debug, Clone, Default)]
pub struct StaticScope {
    roots: BTreeMap<String, Value>,
}

impl StaticScope {
    /// 빈 스코프
    pub fn new() -> Self {
        Self::default()
    }

    /// 루트 값을 추가합니다.
    pub fn with(mut self, root: impl Into<String>, value: Value) -> Self {
        self.roots.insert(root.into(), value);
        self
    }
}

impl Scope for StaticScope {
    fn resolve(&mut self, root: &str, _attrs: &[&str]) -> Result<Resolved, HclError> {
        self.roots
            .get(root)
            .cloned()
            .map(|value| Resolved { value, consumed: 0 })
            .ok_or_else(|| HclError::Eval(format!("unknown reference '{root}'")))
    }
}

/// 표현식을 평가합니다.
pub fn evaluate(expr: &Expression, scope: &mut dyn Scope) -> Result<Value, HclError> {
    match expr {
        Expression::Literal(value) => Ok(value.clone()),
        Expression::Template(parts) => evaluate_template(parts, scope),
        Expression::Tuple(items) => items
            .iter()
            .map(|item| evaluate(item, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expression::Object(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                map.insert(key.clone(), evaluate(value, scope)?);
            }
            Ok(Value::Object(map))
        }
        Expression::Traversal(traversal) => {
            let attrs = traversal.leading_attrs();
            let resolved = scope.resolve(&traversal.root, &attrs)?;
            let remaining = traversal.steps.get(resolved.consumed..).unwrap_or(&[]);
            apply_steps(resolved.value, remaining, scope)
        }
        Expression::Postfix { target, steps } => {
            let value = evaluate(target, scope)?;
            apply_steps(value, steps, scope)
        }
        Expression::Call { name, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            functions::call(name, args)
        }
        Expression::Binary { op, lhs, rhs } => {
            let lhs = as_number(&evaluate(lhs, scope)?)?;
            let rhs = as_number(&evaluate(rhs, scope)?)?;
            let result = match op {
                BinaryOp::Add => lhs + rhs,
                BinaryOp::Sub => lhs - rhs,
                BinaryOp::Mul => lhs * rhs,
                BinaryOp::Div => {
                    if rhs == 0.0 {
                        return Err(HclError::Eval("division by zero".to_owned()));
                    }
                    lhs / rhs
                }
            };
            number_value(result).ok_or_else(|| {
                HclError::Eval(format!("'{}' produced a non-finite number", op.symbol()))
            })
        }
        Expression::Negate(inner) => {
            let value = as_number(&evaluate(inner, scope)?)?;
            number_value(-value).ok_or_else(|| HclError::Eval("invalid negation".to_owned()))
        }
    }
}

fn evaluate_template(parts: &[TemplatePart], scope: &mut dyn Scope) -> Result<Value, HclError> {
    // 보간 하나로만 이루어진 템플릿은 값의 타입을 유지합니다.
    if let [TemplatePart::Interpolation(expr)] = parts {
        return evaluate(expr, scope);
    }
    let mut out = String::new();
    for part in parts {
        match part {
            TemplatePart::Literal(s) => out.push_str(s),
            TemplatePart::Interpolation(expr) => {
                let value = evaluate(expr, scope)?;
                match value {
                    Value::String(s) => out.push_str(&s),
                    Value::Number(_) | Value::Bool(_) => {
                        out.push_str(&scalar_to_string(&value).unwrap_or_default());
                    }
                    other => {
                        return Err(HclError::Eval(format!(
                            "cannot interpolate {} into a string",
                            type_name(&other)
                        )));
                    }
                }
            }
        }
    }
    Ok(Value::String(out))
}

/// 값에 접근 단계를 차례로 적용합니다.
pub fn apply_steps(
    mut value: Value,
    steps: &[Step],
    scope: &mut dyn Scope,
) -> Result<Value, HclError> {
    for (i, step) in steps.iter().enumerate() {
        value = match step {
            Step::Attr(name) => match value {
                Value::Object(mut map) => map.remove(name).ok_or_else(|| {
                    HclError::Eval(format!("object has no attribute '{name}'"))
                })?,
                other => {
                    return Err(HclError::Eval(format!(
                        "cannot access attribute '{name}' on {}",
                        type_name(&other)
                    )));
                }
            },
            Step::Index(index) => {
                let key = evaluate(index, scope)?;
                match value {
                    Value::Array(mut items) => {
                        let idx = as_index(&key)?;
                        if idx >= items.len() {
                            return Err(HclError::Eval(format!(
                                "index {idx} out of range for list of length {}",
                                items.len()
                            )));
                        }
                        items.swap_remove(idx)
                    }
                    Value::Object(mut map) => {
                        let key = scalar_to_string(&key).ok_or_else(|| {
                            HclError::Eval(format!("cannot index object with {}", type_name(&key)))
                        })?;
                        map.remove(&key)
                            .ok_or_else(|| HclError::Eval(format!("object has no key '{key}'")))?
                    }
                    other => {
                        return Err(HclError::Eval(format!(
                            "cannot index {}",
                            type_name(&other)
                        )));
                    }
                }
            }
            Step::Splat => {
                let items = match value {
                    Value::Null => Vec::new(),
                    Value::Array(items) => items,
                    other => vec![other],
                };
                let rest = &steps[i + 1..];
                let mapped = items
                    .into_iter()
                    .map(|item| apply_steps(item, rest, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Value::Array(mapped));
            }
        };
    }
    Ok(value)
}

fn as_number(value: &Value) -> Result<f64, HclError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| HclError::Eval("number out of range".to_owned())),
        // 문자열은 자동으로 숫자로 변환됩니다.
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| HclError::Eval(format!("cannot use '{s}' as a number"))),
        other => Err(HclError::Eval(format!(
            "arithmetic on {} is not allowed",
            type_name(other)
        ))),
    }
}
