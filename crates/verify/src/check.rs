//! 속성 체크 정의
//!
//! [`AttributeCheck`]는 리소스 주소, flatmap 경로, 기대값([`Expectation`])의 조합입니다.
//! 정규식과 참조는 생성 시점에 검사하므로 잘못된 체크는 케이스 실행 전에 드러납니다.

use std::fmt;

use regex::Regex;
use tfacc_core::error::VerifyError;
use tfacc_core::types::ResourceAddress;

use crate::reference::AttributeRef;

/// 기대값
#[derive(Debug, Clone)]
pub enum Expectation {
    /// 값이 정확히 일치
    Equals(String),
    /// 다른 리소스 속성 값과 일치
    EqualsReference(AttributeRef),
    /// 정규식과 일치
    Matches(Regex),
    /// 값이 존재하고 비어 있지 않음
    Set,
    /// 값이 존재하지 않음
    NotSet,
    /// 리스트/맵 원소 개수 (`<path>.#`, 없으면 `<path>.%`)
    Count(usize),
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(v) => write!(f, "\"{v}\""),
            Self::EqualsReference(r) => write!(f, "{r}"),
            Self::Matches(re) => write!(f, "/{}/", re.as_str()),
            Self::Set => write!(f, "<set>"),
            Self::NotSet => write!(f, "<not set>"),
            Self::Count(n) => write!(f, "{n} element(s)"),
        }
    }
}

/// 단일 속성 체크
#[derive(Debug, Clone)]
pub struct AttributeCheck {
    /// 대상 리소스
    pub address: ResourceAddress,
    /// flatmap 경로 (예: `tags.owner`, `volumes.#`)
    pub path: String,
    /// 기대값
    pub expectation: Expectation,
}

impl AttributeCheck {
    fn new(address: &str, path: &str, expectation: Expectation) -> Result<Self, VerifyError> {
        Ok(Self {
            address: address.parse()?,
            path: path.to_owned(),
            expectation,
        })
    }

    /// `path == value`
    pub fn equals(
        address: &str,
        path: &str,
        value: impl Into<String>,
    ) -> Result<Self, VerifyError> {
        Self::new(address, path, Expectation::Equals(value.into()))
    }

    /// `path == ${other.attr}`
    pub fn equals_reference(
        address: &str,
        path: &str,
        reference: &str,
    ) -> Result<Self, VerifyError> {
        let reference = AttributeRef::parse(reference)?;
        Self::new(address, path, Expectation::EqualsReference(reference))
    }

    /// `path =~ pattern`
    pub fn matches(address: &str, path: &str, pattern: &str) -> Result<Self, VerifyError> {
        let re = Regex::new(pattern).map_err(|e| VerifyError::InvalidPattern {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        Self::new(address, path, Expectation::Matches(re))
    }

    /// 값이 설정되어 있음
    pub fn set(address: &str, path: &str) -> Result<Self, VerifyError> {
        Self::new(address, path, Expectation::Set)
    }

    /// 값이 없음
    pub fn not_set(address: &str, path: &str) -> Result<Self, VerifyError> {
        Self::new(address, path, Expectation::NotSet)
    }

    /// 원소 개수
    pub fn count(address: &str, path: &str, n: usize) -> Result<Self, VerifyError> {
        Self::new(address, path, Expectation::Count(n))
    }
}

impl fmt::Display for AttributeCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} = {}", self.address, self.path, self.expectation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_parse_address() {
        let check = AttributeCheck::equals(
            "flexibleengine_dms_rabbitmq_instance.test",
            "engine",
            "rabbitmq",
        )
        .unwrap();
        assert_eq!(check.address.resource_type, "flexibleengine_dms_rabbitmq_instance");
        assert_eq!(
            check.to_string(),
            "flexibleengine_dms_rabbitmq_instance.test engine = \"rabbitmq\""
        );
        assert!(AttributeCheck::set("not an address", "id").is_err());
    }

    #[test]
    fn invalid_pattern_is_rejected_up_front() {
        let err = AttributeCheck::matches("t.n", "name", "(unclosed").unwrap_err();
        assert!(matches!(err, VerifyError::InvalidPattern { ref path, .. } if path == "name"));
    }

    #[test]
    fn reference_is_parsed_up_front() {
        let check = AttributeCheck::equals_reference(
            "flexibleengine_dms_rabbitmq_instance.test",
            "product_id",
            "${data.flexibleengine_dms_product.test2.id}",
        )
        .unwrap();
        assert!(matches!(check.expectation, Expectation::EqualsReference(_)));
        assert!(AttributeCheck::equals_reference("t.n", "x", "${broken").is_err());
    }
}
