//! 설정 관리 -- tfacc.toml 파싱 및 런타임 설정
//!
//! [`TfaccConfig`]는 하네스 전체 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. 환경변수 (`TFACC_RUNNER_MAX_PARALLEL=8`, `OS_REGION_NAME=eu-west-0` 형식)
//! 2. 설정 파일 (`tfacc.toml`)
//! 3. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), tfacc_core::error::TfaccError> {
//! use tfacc_core::config::TfaccConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TfaccConfig::load("tfacc.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TfaccConfig::parse("[runner]\nmax_parallel = 2")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TfaccError};

/// tfacc 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TfaccConfig {
    /// 일반 설정 (로깅)
    #[serde(default)]
    pub general: GeneralConfig,
    /// 대상 프로바이더 환경
    #[serde(default)]
    pub provider: ProviderConfig,
    /// 라이프사이클 드라이버 설정
    #[serde(default)]
    pub driver: DriverConfig,
    /// 스케줄러/스테이지 러너 설정
    #[serde(default)]
    pub runner: RunnerConfig,
    /// 리소스 이름 생성 설정
    #[serde(default)]
    pub naming: NamingConfig,
}

impl TfaccConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TfaccError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일 없이 기본값 + 환경변수만으로 설정을 만듭니다.
    pub fn from_env() -> Result<Self, TfaccError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TfaccError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TfaccError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TfaccError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TfaccError> {
        toml::from_str(toml_str).map_err(|e| {
            TfaccError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 네이밍 규칙: `TFACC_{SECTION}_{FIELD}`.
    /// 프로바이더 관례 변수(`OS_REGION_NAME`, `OS_ENTERPRISE_PROJECT_ID_TEST`)도 읽습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TFACC_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TFACC_GENERAL_LOG_FORMAT");

        // Provider
        override_string(&mut self.provider.name, "TFACC_PROVIDER_NAME");
        override_string(&mut self.provider.region, "OS_REGION_NAME");
        override_string(&mut self.provider.region, "TFACC_PROVIDER_REGION");
        override_string(
            &mut self.provider.enterprise_project_id,
            "OS_ENTERPRISE_PROJECT_ID_TEST",
        );
        override_string(
            &mut self.provider.enterprise_project_id,
            "TFACC_PROVIDER_ENTERPRISE_PROJECT_ID",
        );

        // Driver
        override_string(&mut self.driver.terraform_bin, "TFACC_DRIVER_TERRAFORM_BIN");
        override_string(&mut self.driver.work_dir, "TFACC_DRIVER_WORK_DIR");
        override_u64(
            &mut self.driver.apply_timeout_secs,
            "TFACC_DRIVER_APPLY_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.driver.destroy_timeout_secs,
            "TFACC_DRIVER_DESTROY_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.driver.import_timeout_secs,
            "TFACC_DRIVER_IMPORT_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.driver.read_timeout_secs,
            "TFACC_DRIVER_READ_TIMEOUT_SECS",
        );

        // Runner
        override_usize(&mut self.runner.max_parallel, "TFACC_RUNNER_MAX_PARALLEL");
        override_bool(
            &mut self.runner.stop_on_failure,
            "TFACC_RUNNER_STOP_ON_FAILURE",
        );
        override_bool(&mut self.runner.check_destroy, "TFACC_RUNNER_CHECK_DESTROY");
        override_csv(&mut self.runner.filter, "TFACC_RUNNER_FILTER");

        // Naming
        override_string(&mut self.naming.prefix, "TFACC_NAMING_PREFIX");
        override_usize(&mut self.naming.suffix_len, "TFACC_NAMING_SUFFIX_LEN");
        override_opt_u64(&mut self.naming.seed, "TFACC_NAMING_SEED");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TfaccError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.provider.name.is_empty() {
            return Err(invalid("provider.name", "must not be empty".to_owned()));
        }

        if self.driver.terraform_bin.is_empty() {
            return Err(invalid(
                "driver.terraform_bin",
                "must not be empty".to_owned(),
            ));
        }

        for (field, secs) in [
            ("driver.apply_timeout_secs", self.driver.apply_timeout_secs),
            ("driver.destroy_timeout_secs", self.driver.destroy_timeout_secs),
            ("driver.import_timeout_secs", self.driver.import_timeout_secs),
            ("driver.read_timeout_secs", self.driver.read_timeout_secs),
        ] {
            if secs == 0 || secs > MAX_TIMEOUT_SECS {
                return Err(invalid(field, format!("must be 1-{MAX_TIMEOUT_SECS}")));
            }
        }

        if self.runner.max_parallel == 0 || self.runner.max_parallel > MAX_PARALLEL {
            return Err(invalid(
                "runner.max_parallel",
                format!("must be 1-{MAX_PARALLEL}"),
            ));
        }

        self.naming.validate()?;

        Ok(())
    }
}

/// 설정 상한값 상수
const MAX_TIMEOUT_SECS: u64 = 6 * 3600;
const MAX_PARALLEL: usize = 64;
const MIN_SUFFIX_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 8;

fn invalid(field: &str, reason: String) -> TfaccError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 대상 프로바이더 환경
///
/// 값은 불투명한 문자열로 취급하며 이 레이어에서 해석하지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// 프로바이더 이름 (리소스 타입 접두어)
    pub name: String,
    /// 리전 이름
    pub region: String,
    /// 엔터프라이즈 프로젝트 ID (비어 있으면 관련 시나리오는 건너뜀)
    pub enterprise_project_id: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "flexibleengine".to_owned(),
            region: String::new(),
            enterprise_project_id: String::new(),
        }
    }
}

/// 라이프사이클 드라이버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// terraform 실행 파일 경로
    pub terraform_bin: String,
    /// 케이스별 작업 디렉토리의 상위 경로 (비어 있으면 시스템 임시 디렉토리)
    pub work_dir: String,
    /// apply 타임아웃 (초)
    pub apply_timeout_secs: u64,
    /// destroy 타임아웃 (초)
    pub destroy_timeout_secs: u64,
    /// import 타임아웃 (초)
    pub import_timeout_secs: u64,
    /// 존재 확인(read) 타임아웃 (초)
    pub read_timeout_secs: u64,
    /// 드라이버 프로세스에 그대로 전달할 환경변수 (자격 증명 등)
    pub env: BTreeMap<String, String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            terraform_bin: "terraform".to_owned(),
            work_dir: String::new(),
            apply_timeout_secs: 3600,
            destroy_timeout_secs: 1800,
            import_timeout_secs: 600,
            read_timeout_secs: 300,
            env: BTreeMap::new(),
        }
    }
}

impl DriverConfig {
    /// apply 타임아웃
    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }

    /// destroy 타임아웃
    pub fn destroy_timeout(&self) -> Duration {
        Duration::from_secs(self.destroy_timeout_secs)
    }

    /// import 타임아웃
    pub fn import_timeout(&self) -> Duration {
        Duration::from_secs(self.import_timeout_secs)
    }

    /// read 타임아웃
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// 스케줄러/스테이지 러너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// 동시에 실행할 케이스 최대 수
    pub max_parallel: usize,
    /// 스텝 실패 시 남은 스텝을 중단할지 여부
    pub stop_on_failure: bool,
    /// destroy 이후 원격 존재 여부를 확인할지 여부
    pub check_destroy: bool,
    /// 실행할 케이스 이름 필터 (부분 문자열, 비어 있으면 전체)
    pub filter: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            stop_on_failure: true,
            check_destroy: true,
            filter: Vec::new(),
        }
    }
}

/// 리소스 이름 생성 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// 이름 접두어 (소문자, 숫자, `-`)
    pub prefix: String,
    /// 무작위 접미어 길이
    pub suffix_len: usize,
    /// 생성 이름 최대 길이
    pub max_len: usize,
    /// 생성 비밀번호 길이
    pub password_len: usize,
    /// 난수 시드 (지정 시 결정적 생성)
    pub seed: Option<u64>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: "tf-test".to_owned(),
            suffix_len: 5,
            max_len: 64,
            password_len: 12,
            seed: None,
        }
    }
}

impl NamingConfig {
    /// 이름 제약 조건을 만족할 수 있는지 검증합니다.
    pub fn validate(&self) -> Result<(), TfaccError> {
        if self.prefix.is_empty()
            || !self
                .prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(invalid(
                "naming.prefix",
                "must be non-empty lowercase alphanumeric or '-'".to_owned(),
            ));
        }

        if self.suffix_len < MIN_SUFFIX_LEN {
            return Err(invalid(
                "naming.suffix_len",
                format!("must be at least {MIN_SUFFIX_LEN}"),
            ));
        }

        // prefix + separator + suffix
        let needed = self.prefix.len() + 1 + self.suffix_len;
        if needed > self.max_len {
            return Err(invalid(
                "naming.max_len",
                format!("prefix and suffix need {needed} characters"),
            ));
        }

        if self.password_len < MIN_PASSWORD_LEN {
            return Err(invalid(
                "naming.password_len",
                format!("must be at least {MIN_PASSWORD_LEN}"),
            ));
        }

        Ok(())
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_opt_u64(target: &mut Option<u64>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = Some(parsed),
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = TfaccConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.provider.name, "flexibleengine");
        assert!(config.provider.region.is_empty());
        assert_eq!(config.runner.max_parallel, 4);
        assert!(config.runner.stop_on_failure);
        assert_eq!(config.naming.prefix, "tf-test");
        assert!(config.naming.seed.is_none());
    }

    #[test]
    fn default_config_passes_validation() {
        TfaccConfig::default().validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = TfaccConfig::parse("").unwrap();
        assert_eq!(config.driver.terraform_bin, "terraform");
        assert_eq!(config.driver.apply_timeout_secs, 3600);
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[provider]
region = "eu-west-0"

[driver.env]
OS_ACCESS_KEY = "ak"
"#;
        let config = TfaccConfig::parse(toml).unwrap();
        assert_eq!(config.provider.region, "eu-west-0");
        assert_eq!(config.provider.name, "flexibleengine");
        assert_eq!(config.driver.env.get("OS_ACCESS_KEY").unwrap(), "ak");
        assert_eq!(config.runner.max_parallel, 4);
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let err = TfaccConfig::parse("runner = [[[").unwrap_err();
        assert!(matches!(
            err,
            TfaccError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = TfaccConfig::default();
        config.driver.destroy_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("destroy_timeout_secs"));
    }

    #[test]
    fn validate_rejects_zero_parallelism() {
        let mut config = TfaccConfig::default();
        config.runner.max_parallel = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_parallel"));
    }

    #[test]
    fn validate_rejects_uppercase_prefix() {
        let mut config = TfaccConfig::default();
        config.naming.prefix = "TF".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("naming.prefix"));
    }

    #[test]
    fn validate_rejects_unreachable_max_len() {
        let mut config = TfaccConfig::default();
        config.naming.max_len = 8;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_len"));
    }

    #[test]
    fn validate_rejects_bad_log_format() {
        let mut config = TfaccConfig::default();
        config.general.log_format = "xml".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn provider_env_overrides_apply() {
        // SAFETY: #[serial] 테스트에서만 환경변수를 조작합니다.
        unsafe {
            std::env::set_var("OS_REGION_NAME", "eu-west-0");
            std::env::set_var("OS_ENTERPRISE_PROJECT_ID_TEST", "eps-123");
        }
        let mut config = TfaccConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.provider.region, "eu-west-0");
        assert_eq!(config.provider.enterprise_project_id, "eps-123");
        unsafe {
            std::env::remove_var("OS_REGION_NAME");
            std::env::remove_var("OS_ENTERPRISE_PROJECT_ID_TEST");
        }
    }

    #[test]
    #[serial]
    fn tfacc_region_wins_over_provider_convention() {
        // SAFETY: #[serial] 테스트에서만 환경변수를 조작합니다.
        unsafe {
            std::env::set_var("OS_REGION_NAME", "eu-west-0");
            std::env::set_var("TFACC_PROVIDER_REGION", "eu-west-1");
        }
        let mut config = TfaccConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.provider.region, "eu-west-1");
        unsafe {
            std::env::remove_var("OS_REGION_NAME");
            std::env::remove_var("TFACC_PROVIDER_REGION");
        }
    }

    #[test]
    #[serial]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = true;
        // SAFETY: #[serial] 테스트에서만 환경변수를 조작합니다.
        unsafe { std::env::set_var("TEST_TFACC_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_TFACC_BOOL_BAD");
        assert!(val);
        unsafe { std::env::remove_var("TEST_TFACC_BOOL_BAD") };
    }

    #[test]
    #[serial]
    fn env_override_seed_and_filter() {
        // SAFETY: #[serial] 테스트에서만 환경변수를 조작합니다.
        unsafe {
            std::env::set_var("TFACC_NAMING_SEED", "42");
            std::env::set_var("TFACC_RUNNER_FILTER", "dms, ,evs");
        }
        let mut config = TfaccConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.naming.seed, Some(42));
        assert_eq!(config.runner.filter, vec!["dms", "evs"]);
        unsafe {
            std::env::remove_var("TFACC_NAMING_SEED");
            std::env::remove_var("TFACC_RUNNER_FILTER");
        }
    }

    #[test]
    fn config_serialize_roundtrip() {
        let mut config = TfaccConfig::default();
        config.naming.seed = Some(7);
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = TfaccConfig::parse(&toml_str).unwrap();
        assert_eq!(parsed.naming.seed, Some(7));
        assert_eq!(parsed.driver.read_timeout_secs, config.driver.read_timeout_secs);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = TfaccConfig::from_file("/nonexistent/path/tfacc.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TfaccError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
