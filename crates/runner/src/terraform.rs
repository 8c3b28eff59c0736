//! terraform CLI 드라이버
//!
//! 케이스마다 임시 작업 디렉토리를 만들고 `main.tf`를 쓴 뒤 CLI를 호출합니다.
//! 상태는 `terraform show -json` 출력에서 읽습니다.
//!
//! - import와 존재 확인은 별도 임시 디렉토리에서 수행하므로 케이스의
//!   상태 파일을 건드리지 않습니다.
//! - 자식 프로세스는 `kill_on_drop`으로 실행되어 타임아웃으로 future가
//!   취소되면 함께 종료됩니다.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use serde_json::{Map, Value};
use tempfile::TempDir;
use tfacc_core::config::DriverConfig;
use tfacc_core::error::DriverError;
use tfacc_core::types::{ResourceAddress, ResourceIndex, ResourceMode, ResourceState, StateSnapshot};
use tfacc_hcl::RenderedConfig;
use tokio::process::Command;
use tracing::{debug, info};

use crate::driver::{DriverFactory, LifecycleDriver};

/// 존재하지 않는 객체를 import할 때 terraform이 출력하는 문구
const NON_EXISTENT_MARKER: &str = "non-existent remote object";

/// 에러 메시지에 포함할 stderr 최대 길이
const MAX_STDERR_LEN: usize = 2048;

// ─── show -json 출력 ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ShowOutput {
    #[serde(default)]
    values: Option<ShowValues>,
}

#[derive(Debug, Deserialize)]
struct ShowValues {
    root_module: ShowModule,
}

#[derive(Debug, Deserialize)]
struct ShowModule {
    #[serde(default)]
    resources: Vec<ShowResource>,
}

#[derive(Debug, Deserialize)]
struct ShowResource {
    mode: String,
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    index: Option<Value>,
    #[serde(default)]
    values: Map<String, Value>,
}

/// `terraform show -json` 출력을 스냅샷으로 변환합니다.
///
/// 상태가 비어 있으면 빈 스냅샷입니다.
pub fn parse_show_json(json: &str) -> Result<StateSnapshot, DriverError> {
    let output: ShowOutput = serde_json::from_str(json).map_err(|e| DriverError::Process {
        program: "terraform show".to_owned(),
        reason: format!("unexpected JSON output: {e}"),
    })?;
    let Some(values) = output.values else {
        return Ok(StateSnapshot::new());
    };

    Ok(values
        .root_module
        .resources
        .into_iter()
        .map(|r| {
            let mode = if r.mode == "data" {
                ResourceMode::Data
            } else {
                ResourceMode::Managed
            };
            let index = match r.index {
                Some(Value::Number(n)) => n.as_u64().map(|i| ResourceIndex::Int(i as usize)),
                Some(Value::String(key)) => Some(ResourceIndex::Key(key)),
                _ => None,
            };
            let address = ResourceAddress {
                mode,
                resource_type: r.resource_type,
                name: r.name,
                index,
            };
            ResourceState::new(address, r.values)
        })
        .collect())
}

// ─── TerraformDriver ─────────────────────────────────────────────────

/// terraform CLI 드라이버
pub struct TerraformDriver {
    config: DriverConfig,
    case: String,
    workdir: TempDir,
    /// 구성 앞에 붙일 공통 파일 (`required_providers` 등)
    preamble: Option<String>,
    initialized: bool,
    /// 마지막으로 적용한 구성 (import 작업 디렉토리용)
    last_config: Option<String>,
}

impl TerraformDriver {
    /// 케이스용 작업 디렉토리를 만듭니다.
    pub fn new(
        config: DriverConfig,
        case: impl Into<String>,
        preamble: Option<String>,
    ) -> Result<Self, DriverError> {
        let case = case.into();
        let workdir = make_tempdir(&config, &case)?;
        debug!(case, workdir = %workdir.path().display(), "terraform workdir created");
        Ok(Self {
            config,
            case,
            workdir,
            preamble,
            initialized: false,
            last_config: None,
        })
    }

    /// 작업 디렉토리
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// 명령 인자 목록 (테스트와 로그용)
    pub fn command_args(operation: &str, extra: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = vec![operation.to_owned()];
        match operation {
            "init" | "import" => args.extend(["-input=false", "-no-color"].map(str::to_owned)),
            "apply" | "destroy" => args.extend(
                ["-auto-approve", "-input=false", "-no-color", "-lock-timeout=60s"].map(str::to_owned),
            ),
            "show" => args.extend(["-json", "-no-color"].map(str::to_owned)),
            _ => args.push("-no-color".to_owned()),
        }
        args.extend(extra.iter().map(|s| (*s).to_owned()));
        args
    }

    async fn run(&self, dir: &Path, operation: &str, extra: &[&str]) -> Result<String, DriverError> {
        let args = Self::command_args(operation, extra);
        debug!(case = %self.case, dir = %dir.display(), ?args, "running terraform");

        let output = Command::new(&self.config.terraform_bin)
            .args(&args)
            .current_dir(dir)
            .envs(&self.config.env)
            .env("TF_IN_AUTOMATION", "1")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DriverError::Process {
                program: self.config.terraform_bin.clone(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(DriverError::Process {
                program: format!("{} {operation}", self.config.terraform_bin),
                reason: stderr_tail(&output.stderr),
            })
        }
    }

    fn write_config(&self, dir: &Path, text: &str) -> Result<(), DriverError> {
        let io = |e: std::io::Error| DriverError::Process {
            program: "write configuration".to_owned(),
            reason: e.to_string(),
        };
        std::fs::write(dir.join("main.tf"), text).map_err(io)?;
        if let Some(preamble) = &self.preamble {
            std::fs::write(dir.join("providers.tf"), preamble).map_err(io)?;
        }
        Ok(())
    }

    async fn show(&self, dir: &Path) -> Result<StateSnapshot, DriverError> {
        let json = self.run(dir, "show", &[]).await?;
        parse_show_json(&json)
    }

    /// 별도 디렉토리에서 import하고 상태를 읽습니다.
    ///
    /// `refresh`이면 import 뒤 `apply -refresh-only`로 계산 속성까지 다시 읽습니다.
    async fn scratch_import(
        &self,
        address: &ResourceAddress,
        id: &str,
        refresh: bool,
    ) -> Result<(TempDir, Result<StateSnapshot, DriverError>), DriverError> {
        let text = self.last_config.as_deref().ok_or_else(|| DriverError::Import {
            address: address.to_string(),
            reason: "no configuration has been applied".to_owned(),
        })?;
        let scratch = make_tempdir(&self.config, &format!("{}-import", self.case))?;
        self.write_config(scratch.path(), text)?;
        self.run(scratch.path(), "init", &[]).await?;

        let target = address.to_string();
        let mut imported = self.run(scratch.path(), "import", &[&target, id]).await;
        if refresh && imported.is_ok() {
            imported = self.run(scratch.path(), "apply", &["-refresh-only"]).await;
        }
        let imported = match imported {
            Ok(_) => self.show(scratch.path()).await,
            Err(e) => Err(e),
        };
        Ok((scratch, imported))
    }
}

impl LifecycleDriver for TerraformDriver {
    fn name(&self) -> &str {
        "terraform"
    }

    async fn apply(&mut self, config: &RenderedConfig) -> Result<StateSnapshot, DriverError> {
        let dir = self.workdir.path().to_path_buf();
        self.write_config(&dir, &config.text)?;
        self.last_config = Some(config.text.clone());
        if !self.initialized {
            self.run(&dir, "init", &[]).await?;
            self.initialized = true;
        }
        self.run(&dir, "apply", &[])
            .await
            .map_err(|e| DriverError::Apply(e.to_string()))?;
        let snapshot = self.show(&dir).await?;
        info!(case = %self.case, scenario = %config.scenario, resources = snapshot.len(), "terraform apply finished");
        Ok(snapshot)
    }

    async fn destroy(&mut self) -> Result<(), DriverError> {
        if !self.initialized {
            return Ok(());
        }
        let dir: PathBuf = self.workdir.path().to_path_buf();
        self.run(&dir, "destroy", &[])
            .await
            .map_err(|e| DriverError::Destroy(e.to_string()))?;
        info!(case = %self.case, "terraform destroy finished");
        Ok(())
    }

    async fn import_and_read(
        &mut self,
        address: &ResourceAddress,
        id: &str,
    ) -> Result<ResourceState, DriverError> {
        let import_error = |reason: String| DriverError::Import {
            address: address.to_string(),
            reason,
        };
        let (_scratch, imported) = self.scratch_import(address, id, true).await?;
        let snapshot = imported.map_err(|e| import_error(e.to_string()))?;
        snapshot
            .get(address)
            .cloned()
            .ok_or_else(|| import_error("resource missing from imported state".to_owned()))
    }

    async fn exists(&mut self, address: &ResourceAddress, id: &str) -> Result<bool, DriverError> {
        let (_scratch, imported) = self.scratch_import(address, id, false).await?;
        match imported {
            Ok(_) => Ok(true),
            Err(e) if e.to_string().contains(NON_EXISTENT_MARKER) => Ok(false),
            Err(e) => Err(DriverError::Read {
                address: address.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for TerraformDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerraformDriver")
            .field("case", &self.case)
            .field("workdir", &self.workdir.path())
            .field("initialized", &self.initialized)
            .finish()
    }
}

/// 케이스마다 [`TerraformDriver`]를 만드는 팩토리
#[derive(Debug, Clone)]
pub struct TerraformDriverFactory {
    config: DriverConfig,
    preamble: Option<String>,
}

impl TerraformDriverFactory {
    /// 새 팩토리
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            preamble: None,
        }
    }

    /// 모든 작업 디렉토리에 쓸 공통 파일을 설정합니다.
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }
}

impl DriverFactory for TerraformDriverFactory {
    fn create(&self, case: &str) -> Result<Box<dyn crate::driver::DynDriver>, DriverError> {
        Ok(Box::new(TerraformDriver::new(
            self.config.clone(),
            case,
            self.preamble.clone(),
        )?))
    }
}

// --- helpers ---

fn make_tempdir(config: &DriverConfig, case: &str) -> Result<TempDir, DriverError> {
    let mut builder = tempfile::Builder::new();
    let prefix = format!("tfacc-{case}-");
    builder.prefix(&prefix);
    let result = if config.work_dir.is_empty() {
        builder.tempdir()
    } else {
        std::fs::create_dir_all(&config.work_dir).and_then(|_| builder.tempdir_in(&config.work_dir))
    };
    result.map_err(|e| DriverError::Process {
        program: "create workdir".to_owned(),
        reason: e.to_string(),
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= MAX_STDERR_LEN {
        return text.to_owned();
    }
    let mut start = text.len() - MAX_STDERR_LEN;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
