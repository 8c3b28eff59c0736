//! 도메인 타입 -- 리소스 주소, 리소스 상태, 상태 스냅샷
//!
//! 드라이버는 apply 결과를 [`StateSnapshot`]으로 반환하고,
//! 검증기는 스냅샷의 [`ResourceState`]를 flatmap으로 펼쳐 비교합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::VerifyError;
use crate::flatmap;

/// 리소스 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceMode {
    /// `resource` 블록 (생성/수정/삭제 대상)
    Managed,
    /// `data` 블록 (읽기 전용)
    Data,
}

/// count/for_each 인스턴스 인덱스
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceIndex {
    /// `count` 인덱스
    Int(usize),
    /// `for_each` 키
    Key(String),
}

impl fmt::Display for ResourceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "[{i}]"),
            Self::Key(k) => write!(f, "[\"{k}\"]"),
        }
    }
}

/// 리소스 주소
///
/// 텍스트 형식: `[data.]<type>.<name>[<index>]`
/// 예: `data.flexibleengine_evs_volumes.test`, `flexibleengine_evs_volume.test[0]`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceAddress {
    /// 모드
    pub mode: ResourceMode,
    /// 리소스 타입 (예: `flexibleengine_vpc_v1`)
    pub resource_type: String,
    /// 로컬 이름 (예: `test`)
    pub name: String,
    /// 인스턴스 인덱스
    pub index: Option<ResourceIndex>,
}

impl ResourceAddress {
    /// managed 리소스 주소를 만듭니다.
    pub fn managed(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Managed,
            resource_type: resource_type.into(),
            name: name.into(),
            index: None,
        }
    }

    /// data 리소스 주소를 만듭니다.
    pub fn data(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Data,
            resource_type: resource_type.into(),
            name: name.into(),
            index: None,
        }
    }

    /// 인덱스를 지정한 주소를 반환합니다.
    pub fn with_index(mut self, index: ResourceIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// 인덱스를 제거한 블록 주소
    pub fn block(&self) -> Self {
        Self {
            index: None,
            ..self.clone()
        }
    }

    /// managed 리소스인지 여부
    pub fn is_managed(&self) -> bool {
        self.mode == ResourceMode::Managed
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mode == ResourceMode::Data {
            write!(f, "data.")?;
        }
        write!(f, "{}.{}", self.resource_type, self.name)?;
        if let Some(index) = &self.index {
            write!(f, "{index}")?;
        }
        Ok(())
    }
}

impl FromStr for ResourceAddress {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| VerifyError::InvalidAddress {
            address: s.to_owned(),
            reason: reason.to_owned(),
        };

        let (body, index) = match s.find('[') {
            Some(open) => {
                let rest = &s[open..];
                if !rest.ends_with(']') {
                    return Err(invalid("unterminated index"));
                }
                let inner = &rest[1..rest.len() - 1];
                let index = if let Some(key) = inner
                    .strip_prefix('"')
                    .and_then(|k| k.strip_suffix('"'))
                {
                    ResourceIndex::Key(key.to_owned())
                } else {
                    ResourceIndex::Int(
                        inner
                            .parse::<usize>()
                            .map_err(|_| invalid("index must be an integer or quoted key"))?,
                    )
                };
                (&s[..open], Some(index))
            }
            None => (s, None),
        };

        let parts: Vec<&str> = body.split('.').collect();
        let (mode, resource_type, name) = match parts.as_slice() {
            ["data", ty, name] => (ResourceMode::Data, *ty, *name),
            [ty, name] => (ResourceMode::Managed, *ty, *name),
            _ => return Err(invalid("expected [data.]<type>.<name>")),
        };

        if !is_identifier(resource_type) || !is_identifier(name) {
            return Err(invalid("type and name must be identifiers"));
        }

        Ok(Self {
            mode,
            resource_type: resource_type.to_owned(),
            name: name.to_owned(),
            index,
        })
    }
}

/// HCL 식별자 규칙 (문자로 시작, 문자/숫자/`_`/`-`)
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// 단일 리소스 인스턴스의 상태
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// 주소
    pub address: ResourceAddress,
    /// 속성 (JSON 객체)
    pub attributes: Map<String, Value>,
}

impl ResourceState {
    /// 새 리소스 상태를 만듭니다.
    pub fn new(address: ResourceAddress, attributes: Map<String, Value>) -> Self {
        Self {
            address,
            attributes,
        }
    }

    /// 원격 식별자 (`id` 속성)
    pub fn id(&self) -> Option<&str> {
        self.attributes.get("id").and_then(Value::as_str)
    }

    /// flatmap 형식의 속성
    pub fn flat(&self) -> BTreeMap<String, String> {
        flatmap::flatten(&self.attributes)
    }

    /// flatmap 경로로 속성 값을 조회합니다.
    pub fn attribute(&self, path: &str) -> Option<String> {
        self.flat().remove(path)
    }
}

/// apply 한 번의 결과 상태
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    resources: BTreeMap<ResourceAddress, ResourceState>,
}

impl StateSnapshot {
    /// 빈 스냅샷
    pub fn new() -> Self {
        Self::default()
    }

    /// 리소스 상태를 추가합니다 (같은 주소는 덮어씀).
    pub fn insert(&mut self, state: ResourceState) {
        self.resources.insert(state.address.clone(), state);
    }

    /// 주소로 리소스를 조회합니다.
    pub fn get(&self, address: &ResourceAddress) -> Option<&ResourceState> {
        self.resources.get(address)
    }

    /// 문자열 주소로 리소스를 조회합니다.
    pub fn lookup(&self, address: &str) -> Option<&ResourceState> {
        address.parse::<ResourceAddress>().ok().and_then(|a| self.resources.get(&a))
    }

    /// 모든 리소스 (주소 순)
    pub fn resources(&self) -> impl Iterator<Item = &ResourceState> {
        self.resources.values()
    }

    /// managed 리소스만
    pub fn managed(&self) -> impl Iterator<Item = &ResourceState> {
        self.resources.values().filter(|r| r.address.is_managed())
    }

    /// 리소스 수
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl FromIterator<ResourceState> for StateSnapshot {
    fn from_iter<T: IntoIterator<Item = ResourceState>>(iter: T) -> Self {
        let mut snapshot = Self::new();
        for state in iter {
            snapshot.insert(state);
        }
        snapshot
    }
}
