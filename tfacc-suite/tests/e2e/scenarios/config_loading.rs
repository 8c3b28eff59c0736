//! Configuration file and environment handling.

use serial_test::serial;
use tfacc_core::config::TfaccConfig;
use tfacc_suite::Suite;
use tfacc_suite::scenarios::evs;

use crate::helpers::assertions::*;
use crate::helpers::config::*;

#[tokio::test]
#[serial]
async fn test_e2e_config_file_drives_the_run() {
    let file = write_config_file(
        r#"
[general]
log_level = "debug"

[provider]
region = "eu-west-0"

[runner]
max_parallel = 2
filter = ["evs_"]

[naming]
seed = 42
"#,
    );
    let config = TfaccConfig::load(file.path()).await.unwrap();
    assert_eq!(config.runner.max_parallel, 2);

    let suite = Suite::new(config).unwrap();
    let (report, _) = suite.run_simulated().await.unwrap();

    assert_eq!(report.cases.len(), 1);
    assert_passed(&report, evs::VOLUMES_BASIC);
}

#[tokio::test]
#[serial]
async fn test_e2e_provider_env_vars_override_file() {
    let file = write_config_file("[runner]\nfilter = [\"evs_\"]\n");
    // SAFETY: environment is only touched from #[serial] tests.
    unsafe {
        std::env::set_var("OS_REGION_NAME", "eu-west-0");
    }
    let config = TfaccConfig::load(file.path()).await;
    unsafe {
        std::env::remove_var("OS_REGION_NAME");
    }
    let config = config.unwrap();
    assert_eq!(config.provider.region, "eu-west-0");

    let (report, _) = Suite::new(config).unwrap().run_simulated().await.unwrap();
    assert_passed(&report, evs::VOLUMES_BASIC);
}

#[tokio::test]
#[serial]
async fn test_e2e_invalid_config_file_is_rejected() {
    let file = write_config_file("[runner]\nmax_parallel = \"many\"\n");
    assert!(TfaccConfig::load(file.path()).await.is_err());

    let file = write_config_file("[naming]\nprefix = \"\"\n");
    assert!(TfaccConfig::load(file.path()).await.is_err());
}

#[tokio::test]
#[serial]
async fn test_e2e_missing_config_file_is_an_error() {
    assert!(TfaccConfig::load("/nonexistent/tfacc.toml").await.is_err());
}
