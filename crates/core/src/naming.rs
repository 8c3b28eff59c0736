//! 이름 생성기 -- 실행마다 무작위이면서 실행 내에서 유일한 리소스 이름
//!
//! 병렬 케이스들은 서로 다른 이름으로 원격 리소스를 구분하므로,
//! [`RandomNameGenerator`]는 발급한 이름을 기억해 같은 실행에서 충돌을 배제합니다.
//! 시드를 지정하면 결정적으로 생성합니다.

use std::collections::HashSet;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::NamingConfig;
use crate::error::TfaccError;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
/// 비밀번호 특수문자 집합
pub const SPECIALS: &[u8] = b"!#@$%";

/// 이름 구분자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `-` (대부분의 클라우드 리소스 이름)
    Dash,
    /// `_` (일부 리소스는 대시를 허용하지 않음)
    Underscore,
}

impl Separator {
    fn as_char(self) -> char {
        match self {
            Self::Dash => '-',
            Self::Underscore => '_',
        }
    }
}

/// 리소스 이름/비밀번호 생성기
///
/// 러너와 시나리오는 이 trait에만 의존하므로 테스트에서 고정 생성기로 교체할 수 있습니다.
pub trait NameGenerator: Send + Sync {
    /// 실행 내에서 유일한 리소스 이름을 생성합니다.
    fn resource_name(&self, separator: Separator) -> String;

    /// 복잡도 정책을 만족하는 비밀번호를 생성합니다.
    fn password(&self) -> String;
}

/// 비밀번호 복잡도 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// 최소 길이
    pub min_len: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_len: 8 }
    }
}

impl PasswordPolicy {
    /// 대문자, 소문자, 숫자, 특수문자를 각각 하나 이상 포함하고 길이를 만족하는지 확인합니다.
    pub fn satisfies(&self, password: &str) -> bool {
        let bytes = password.as_bytes();
        password.chars().count() >= self.min_len
            && bytes.iter().any(u8::is_ascii_uppercase)
            && bytes.iter().any(u8::is_ascii_lowercase)
            && bytes.iter().any(u8::is_ascii_digit)
            && bytes.iter().any(|b| SPECIALS.contains(b))
    }
}

struct GeneratorState {
    rng: StdRng,
    issued: HashSet<String>,
}

/// 무작위 이름 생성기
pub struct RandomNameGenerator {
    prefix: String,
    suffix_len: usize,
    max_len: usize,
    password_len: usize,
    state: Mutex<GeneratorState>,
}

impl RandomNameGenerator {
    /// 설정으로부터 생성기를 만듭니다.
    ///
    /// `seed`가 있으면 결정적 시퀀스를, 없으면 OS 엔트로피를 사용합니다.
    /// 접미사가 `max_len` 안에 들어가지 않는 설정은 거부합니다.
    pub fn new(config: &NamingConfig) -> Result<Self, TfaccError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            prefix: config.prefix.clone(),
            suffix_len: config.suffix_len,
            max_len: config.max_len,
            password_len: config.password_len,
            state: Mutex::new(GeneratorState {
                rng,
                issued: HashSet::new(),
            }),
        })
    }

    /// 지금까지 발급한 이름 수
    pub fn issued_count(&self) -> usize {
        self.lock().issued.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GeneratorState> {
        // poison 상태여도 내부 상태를 그대로 사용합니다.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn prefix_with(&self, separator: Separator) -> String {
        self.prefix.replace('-', &separator.as_char().to_string())
    }
}

impl NameGenerator for RandomNameGenerator {
    fn resource_name(&self, separator: Separator) -> String {
        let prefix = self.prefix_with(separator);
        let mut state = self.lock();
        // 이미 발급된 이름이면 다시 뽑습니다.
        loop {
            let suffix: String = (0..self.suffix_len)
                .map(|_| {
                    let idx = state.rng.gen_range(0..SUFFIX_ALPHABET.len());
                    char::from(SUFFIX_ALPHABET[idx])
                })
                .collect();
            let mut name = format!("{prefix}{}{suffix}", separator.as_char());
            name.truncate(self.max_len);
            if state.issued.insert(name.clone()) {
                debug!(name = %name, "issued resource name");
                return name;
            }
        }
    }

    fn password(&self) -> String {
        let mut state = self.lock();
        let rng = &mut state.rng;
        let mut chars: Vec<u8> = [UPPER, LOWER, DIGITS, SPECIALS]
            .iter()
            .map(|set| set[rng.gen_range(0..set.len())])
            .collect();
        let all: Vec<u8> = [UPPER, LOWER, DIGITS, SPECIALS].concat();
        while chars.len() < self.password_len {
            chars.push(all[rng.gen_range(0..all.len())]);
        }
        chars.shuffle(rng);
        chars.into_iter().map(char::from).collect()
    }
}
