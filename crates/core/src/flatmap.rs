//! flatmap -- 중첩 속성을 점 경로 문자열 맵으로 펼칩니다.
//!
//! 검증기는 Terraform의 flatmap 표기를 사용합니다.
//!
//! | 값 | 키 |
//! |----|----|
//! | 맵 `tags = {owner = "x"}` | `tags.%` = `1`, `tags.owner` = `x` |
//! | 리스트 `names = ["a"]` | `names.#` = `1`, `names.0` = `a` |
//! | 블록 리스트 `network { uuid = "u" }` | `network.#` = `1`, `network.0.uuid` = `u` |
//!
//! `null` 값은 키를 만들지 않습니다.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// 리스트/셋 크기 키 접미어
pub const LIST_COUNT_SUFFIX: &str = "#";
/// 맵 크기 키 접미어
pub const MAP_COUNT_SUFFIX: &str = "%";

/// 최상위 속성 객체를 flatmap으로 펼칩니다.
pub fn flatten(attributes: &Map<String, Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (key, value) in attributes {
        flatten_value(key, value, false, &mut out);
    }
    out
}

fn flatten_value(key: &str, value: &Value, in_list: bool, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            out.insert(key.to_owned(), b.to_string());
        }
        Value::Number(_) | Value::String(_) => {
            if let Some(s) = scalar_to_string(value) {
                out.insert(key.to_owned(), s);
            }
        }
        Value::Array(items) => {
            out.insert(
                format!("{key}.{LIST_COUNT_SUFFIX}"),
                items.len().to_string(),
            );
            for (idx, item) in items.iter().enumerate() {
                flatten_value(&format!("{key}.{idx}"), item, true, out);
            }
        }
        Value::Object(map) => {
            // 리스트 원소 객체는 블록이므로 크기 키가 없습니다.
            if !in_list {
                let count = map.values().filter(|v| !v.is_null()).count();
                out.insert(format!("{key}.{MAP_COUNT_SUFFIX}"), count.to_string());
            }
            for (sub, item) in map {
                flatten_value(&format!("{key}.{sub}"), item, false, out);
            }
        }
    }
}

/// 스칼라 값을 flatmap 문자열로 변환합니다.
///
/// 정수로 표현 가능한 부동소수는 소수점 없이 출력합니다 (`100.0` → `100`).
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f.abs() < 9.0e15 {
                    Some(format!("{}", f as i64))
                } else {
                    Some(f.to_string())
                }
            }
        }
        _ => None,
    }
}

/// 크기 키(`.#`, `.%`)인지 여부
pub fn is_count_key(key: &str) -> bool {
    key.ends_with(".#") || key.ends_with(".%")
}
