//! 속성 참조 -- `${<address>.<attr>}` 형식의 기대값 해석

use std::fmt;

use tfacc_core::error::VerifyError;
use tfacc_core::types::{ResourceAddress, StateSnapshot};

/// 다른 리소스의 속성을 가리키는 참조
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRef {
    /// 대상 리소스 주소
    pub address: ResourceAddress,
    /// flatmap 경로
    pub path: String,
}

impl AttributeRef {
    /// 참조 텍스트를 파싱합니다.
    ///
    /// `${data.flexibleengine_dms_product.test2.id}`, `flexibleengine_vpc_v1.test.id`,
    /// `flexibleengine_evs_volume.test[0].tags.index` 형식을 받습니다.
    pub fn parse(text: &str) -> Result<Self, VerifyError> {
        let invalid = |reason: &str| VerifyError::InvalidAddress {
            address: text.to_owned(),
            reason: reason.to_owned(),
        };

        let trimmed = text.trim();
        let inner = match trimmed.strip_prefix("${") {
            Some(rest) => rest
                .strip_suffix('}')
                .ok_or_else(|| invalid("unterminated interpolation"))?,
            None => trimmed,
        };

        let (prefix, rest) = match inner.strip_prefix("data.") {
            Some(rest) => ("data.", rest),
            None => ("", inner),
        };

        let (ty, rest) = rest
            .split_once('.')
            .ok_or_else(|| invalid("expected <type>.<name>.<attribute>"))?;

        // 이름 뒤에는 `[index]`가 붙을 수 있습니다.
        let name_end = rest
            .find(['.', '['])
            .ok_or_else(|| invalid("missing attribute path"))?;
        let (name, rest) = rest.split_at(name_end);
        let (index, rest) = if rest.starts_with('[') {
            let close = rest.find(']').ok_or_else(|| invalid("unterminated index"))?;
            rest.split_at(close + 1)
        } else {
            ("", rest)
        };

        let path = rest
            .strip_prefix('.')
            .filter(|p| !p.is_empty())
            .ok_or_else(|| invalid("missing attribute path"))?;

        let address: ResourceAddress = format!("{prefix}{ty}.{name}{index}").parse()?;
        Ok(Self {
            address,
            path: path.to_owned(),
        })
    }

    /// 스냅샷에서 참조 값을 찾습니다.
    pub fn resolve(&self, snapshot: &StateSnapshot) -> Option<String> {
        snapshot.get(&self.address)?.attribute(&self.path)
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.address, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tfacc_core::types::{ResourceIndex, ResourceMode, ResourceState};

    #[test]
    fn parses_data_source_reference() {
        let r = AttributeRef::parse("${data.flexibleengine_dms_product.test2.id}").unwrap();
        assert_eq!(r.address.mode, ResourceMode::Data);
        assert_eq!(r.address.resource_type, "flexibleengine_dms_product");
        assert_eq!(r.address.name, "test2");
        assert_eq!(r.path, "id");
        assert_eq!(r.to_string(), "${data.flexibleengine_dms_product.test2.id}");
    }

    #[test]
    fn parses_indexed_resource_with_nested_path() {
        let r = AttributeRef::parse("flexibleengine_evs_volume.test[2].tags.index").unwrap();
        assert_eq!(r.address.index, Some(ResourceIndex::Int(2)));
        assert_eq!(r.path, "tags.index");
    }

    #[test]
    fn rejects_malformed_references() {
        for bad in [
            "${data.t.n.id",
            "flexibleengine_vpc_v1",
            "flexibleengine_vpc_v1.test",
            "flexibleengine_vpc_v1.test.",
            "t.n[0.id",
            "1bad.n.id",
        ] {
            assert!(AttributeRef::parse(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn resolves_against_snapshot() {
        let mut snapshot = StateSnapshot::new();
        let attrs = json!({"id": "prod-2", "version": "3.8.35"});
        snapshot.insert(ResourceState::new(
            ResourceAddress::data("flexibleengine_dms_product", "test2"),
            attrs.as_object().cloned().unwrap_or_default(),
        ));
        let r = AttributeRef::parse("${data.flexibleengine_dms_product.test2.version}").unwrap();
        assert_eq!(r.resolve(&snapshot).as_deref(), Some("3.8.35"));

        let missing = AttributeRef::parse("${data.flexibleengine_dms_product.test1.id}").unwrap();
        assert_eq!(missing.resolve(&snapshot), None);
    }
}
