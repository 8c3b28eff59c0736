//! tfacc.toml 통합 설정 테스트
//!
//! - tfacc.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use std::io::Write;

use tfacc_core::config::TfaccConfig;
use tfacc_core::error::{ConfigError, TfaccError};

const EXAMPLE: &str = include_str!("../../../tfacc.toml.example");

// =============================================================================
// tfacc.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let config = TfaccConfig::parse(EXAMPLE).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.provider.name, "flexibleengine");
    assert_eq!(config.provider.region, "eu-west-0");
    assert!(config.provider.enterprise_project_id.is_empty());
    assert!(config.driver.env.is_empty());
    assert!(config.runner.filter.is_empty());
}

#[test]
fn example_config_matches_code_defaults() {
    let from_file = TfaccConfig::parse(EXAMPLE).expect("should parse");
    let from_code = TfaccConfig::default();

    assert_eq!(from_file.general.log_level, from_code.general.log_level);
    assert_eq!(from_file.general.log_format, from_code.general.log_format);

    assert_eq!(from_file.driver.terraform_bin, from_code.driver.terraform_bin);
    assert_eq!(
        from_file.driver.apply_timeout_secs,
        from_code.driver.apply_timeout_secs
    );
    assert_eq!(
        from_file.driver.destroy_timeout_secs,
        from_code.driver.destroy_timeout_secs
    );
    assert_eq!(
        from_file.driver.import_timeout_secs,
        from_code.driver.import_timeout_secs
    );
    assert_eq!(
        from_file.driver.read_timeout_secs,
        from_code.driver.read_timeout_secs
    );

    assert_eq!(from_file.runner.max_parallel, from_code.runner.max_parallel);
    assert_eq!(
        from_file.runner.stop_on_failure,
        from_code.runner.stop_on_failure
    );
    assert_eq!(from_file.runner.check_destroy, from_code.runner.check_destroy);

    assert_eq!(from_file.naming.prefix, from_code.naming.prefix);
    assert_eq!(from_file.naming.suffix_len, from_code.naming.suffix_len);
    assert_eq!(from_file.naming.max_len, from_code.naming.max_len);
    assert_eq!(from_file.naming.password_len, from_code.naming.password_len);
    assert_eq!(from_file.naming.seed, from_code.naming.seed);
}

// =============================================================================
// 부분 설정 로딩 테스트
// =============================================================================

#[test]
fn partial_config_runner_only() {
    let toml = r#"
[runner]
max_parallel = 16
filter = ["dms_rabbitmq"]
"#;
    let config = TfaccConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.runner.max_parallel, 16);
    assert_eq!(config.runner.filter, vec!["dms_rabbitmq"]);
    // 나머지는 기본값
    assert!(config.runner.stop_on_failure);
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn partial_config_driver_env_table() {
    let toml = r#"
[driver]
apply_timeout_secs = 120

[driver.env]
OS_ACCESS_KEY = "ak"
OS_SECRET_KEY = "sk"
"#;
    let config = TfaccConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.driver.apply_timeout_secs, 120);
    assert_eq!(config.driver.env.len(), 2);
    assert_eq!(config.driver.terraform_bin, "terraform");
}

#[test]
fn partial_config_naming_with_seed() {
    let toml = r#"
[naming]
prefix = "acc"
seed = 1234
"#;
    let config = TfaccConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");
    assert_eq!(config.naming.prefix, "acc");
    assert_eq!(config.naming.seed, Some(1234));
    assert_eq!(config.naming.suffix_len, 5);
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[runner]
max_parallel = 2
"#;

    let original = std::env::var("TFACC_RUNNER_MAX_PARALLEL").ok();
    // SAFETY: #[serial] 테스트에서만 환경변수를 조작합니다.
    unsafe {
        std::env::set_var("TFACC_RUNNER_MAX_PARALLEL", "12");
    }

    let mut config = TfaccConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.runner.max_parallel;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("TFACC_RUNNER_MAX_PARALLEL", val),
            None => std::env::remove_var("TFACC_RUNNER_MAX_PARALLEL"),
        }
    }

    assert_eq!(result, 12);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_number_keeps_toml_value() {
    let toml = r#"
[driver]
destroy_timeout_secs = 900
"#;

    // SAFETY: #[serial] 테스트에서만 환경변수를 조작합니다.
    unsafe {
        std::env::set_var("TFACC_DRIVER_DESTROY_TIMEOUT_SECS", "soon");
    }

    let mut config = TfaccConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();

    unsafe {
        std::env::remove_var("TFACC_DRIVER_DESTROY_TIMEOUT_SECS");
    }

    assert_eq!(config.driver.destroy_timeout_secs, 900);
}

#[test]
#[serial_test::serial]
fn env_override_then_validate_rejects_bad_value() {
    // SAFETY: #[serial] 테스트에서만 환경변수를 조작합니다.
    unsafe {
        std::env::set_var("TFACC_GENERAL_LOG_LEVEL", "loud");
    }
    let result = TfaccConfig::from_env();
    unsafe {
        std::env::remove_var("TFACC_GENERAL_LOG_LEVEL");
    }

    assert!(matches!(
        result.unwrap_err(),
        TfaccError::Config(ConfigError::InvalidValue { .. })
    ));
}

// =============================================================================
// 빈 파일 / 잘못된 형식 에러 테스트
// =============================================================================

#[test]
fn empty_and_comment_only_parse_with_defaults() {
    for content in ["", "   \n\t", "# 주석만 있는 파일\n"] {
        let config = TfaccConfig::parse(content).expect("should parse");
        config.validate().expect("should validate");
        assert_eq!(config.runner.max_parallel, 4);
    }
}

#[test]
fn wrong_type_for_numeric_field() {
    let toml = r#"
[runner]
max_parallel = "many"
"#;
    assert!(matches!(
        TfaccConfig::parse(toml).unwrap_err(),
        TfaccError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let result = TfaccConfig::from_file("/tmp/tfacc_test_nonexistent_12345.toml").await;
    assert!(matches!(
        result.unwrap_err(),
        TfaccError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
async fn from_file_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[naming]\nprefix = \"Bad_Prefix\"").expect("write");

    let err = TfaccConfig::from_file(file.path()).await.unwrap_err();
    assert!(err.to_string().contains("naming.prefix"));
}

#[tokio::test]
#[serial_test::serial]
async fn load_example_config_from_disk() {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let example_path = format!("{}/../../tfacc.toml.example", manifest_dir);

    let config = TfaccConfig::load(&example_path)
        .await
        .expect("example should load");
    assert_eq!(config.provider.name, "flexibleengine");
}

// =============================================================================
// 직렬화 라운드트립 테스트
// =============================================================================

#[test]
fn example_config_serialize_roundtrip() {
    let config = TfaccConfig::parse(EXAMPLE).expect("should parse");
    let serialized = toml::to_string_pretty(&config).expect("should serialize");
    let reparsed = TfaccConfig::parse(&serialized).expect("should reparse");
    reparsed.validate().expect("should validate");

    assert_eq!(config.provider.region, reparsed.provider.region);
    assert_eq!(config.runner.max_parallel, reparsed.runner.max_parallel);
}
