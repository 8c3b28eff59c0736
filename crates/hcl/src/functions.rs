//! 내장 함수
//!
//! 구성 템플릿이 사용하는 함수만 제공합니다:
//! `length`, `element`, `tostring`, `tonumber`, `join`, `lower`, `upper`.

use serde_json::{Number, Value};
use tfacc_core::flatmap::scalar_to_string;

use crate::error::HclError;

/// 지원하는 함수 이름 목록
pub const FUNCTION_NAMES: &[&str] = &[
    "element", "join", "length", "lower", "tonumber", "tostring", "upper",
];

/// 함수를 호출합니다.
pub fn call(name: &str, args: Vec<Value>) -> Result<Value, HclError> {
    match name {
        "length" => {
            let [value] = take::<1>(name, args)?;
            length(&value)
        }
        "element" => {
            let [list, index] = take::<2>(name, args)?;
            element(list, &index)
        }
        "tostring" => {
            let [value] = take::<1>(name, args)?;
            tostring(value)
        }
        "tonumber" => {
            let [value] = take::<1>(name, args)?;
            tonumber(value)
        }
        "join" => join(args),
        "lower" => {
            let [value] = take::<1>(name, args)?;
            Ok(Value::String(expect_string(name, &value)?.to_lowercase()))
        }
        "upper" => {
            let [value] = take::<1>(name, args)?;
            Ok(Value::String(expect_string(name, &value)?.to_uppercase()))
        }
        other => Err(HclError::Eval(format!("call to unknown function '{other}'"))),
    }
}

fn take<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], HclError> {
    let got = args.len();
    args.try_into().map_err(|_| {
        HclError::Eval(format!("{name}() expects {N} argument(s), got {got}"))
    })
}

fn expect_string<'v>(name: &str, value: &'v Value) -> Result<&'v str, HclError> {
    value
        .as_str()
        .ok_or_else(|| HclError::Eval(format!("{name}() expects a string, got {}", type_name(value))))
}

fn length(value: &Value) -> Result<Value, HclError> {
    let len = match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        other => {
            return Err(HclError::Eval(format!(
                "length() expects a collection or string, got {}",
                type_name(other)
            )));
        }
    };
    Ok(Value::from(len))
}

fn element(list: Value, index: &Value) -> Result<Value, HclError> {
    let Value::Array(items) = list else {
        return Err(HclError::Eval(format!(
            "element() expects a list, got {}",
            type_name(&list)
        )));
    };
    if items.is_empty() {
        return Err(HclError::Eval("element() cannot use an empty list".to_owned()));
    }
    let index = as_index(index)?;
    // 길이를 넘는 인덱스는 순환합니다.
    Ok(items[index % items.len()].clone())
}

fn tostring(value: Value) -> Result<Value, HclError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(_) => Ok(value),
        Value::Number(_) | Value::Bool(_) => Ok(Value::String(
            scalar_to_string(&value).unwrap_or_default(),
        )),
        other => Err(HclError::Eval(format!(
            "tostring() cannot convert {}",
            type_name(&other)
        ))),
    }
}

fn tonumber(value: Value) -> Result<Value, HclError> {
    match value {
        Value::Null | Value::Number(_) => Ok(value),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(number_value)
            .ok_or_else(|| HclError::Eval(format!("tonumber() cannot parse '{s}'"))),
        other => Err(HclError::Eval(format!(
            "tonumber() cannot convert {}",
            type_name(&other)
        ))),
    }
}

fn join(args: Vec<Value>) -> Result<Value, HclError> {
    let mut args = args.into_iter();
    let separator = match args.next() {
        Some(Value::String(s)) => s,
        Some(other) => {
            return Err(HclError::Eval(format!(
                "join() separator must be a string, got {}",
                type_name(&other)
            )));
        }
        None => return Err(HclError::Eval("join() expects a separator".to_owned())),
    };
    let mut parts = Vec::new();
    let mut lists = 0;
    for list in args {
        lists += 1;
        let Value::Array(items) = list else {
            return Err(HclError::Eval(format!(
                "join() expects lists, got {}",
                type_name(&list)
            )));
        };
        for item in &items {
            match item {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                    parts.push(scalar_to_string(item).unwrap_or_default());
                }
                other => {
                    return Err(HclError::Eval(format!(
                        "join() cannot join {}",
                        type_name(other)
                    )));
                }
            }
        }
    }
    if lists == 0 {
        return Err(HclError::Eval("join() expects at least one list".to_owned()));
    }
    Ok(Value::String(parts.join(&separator)))
}

/// 음이 아닌 정수 인덱스로 변환합니다.
pub fn as_index(value: &Value) -> Result<usize, HclError> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64 => Ok(f as usize),
        Some(f) => Err(HclError::Eval(format!(
            "index must be a non-negative whole number, got {f}"
        ))),
        None => Err(HclError::Eval(format!(
            "index must be a number, got {}",
            type_name(value)
        ))),
    }
}

/// f64를 JSON 숫자로 변환합니다. 정수로 표현 가능하면 정수로 저장합니다.
pub fn number_value(f: f64) -> Option<Value> {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Some(Value::from(f as i64))
    } else {
        Number::from_f64(f).map(Value::Number)
    }
}

/// 값의 타입 이름 (에러 메시지용)
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
