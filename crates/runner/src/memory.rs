//! 메모리 클라우드 -- 자격 증명 없이 하네스를 끝까지 실행하는 인프로세스 드라이버
//!
//! [`MemoryCloud`]는 모든 케이스가 공유하는 원격 객체 저장소이고,
//! [`MemoryDriver`]는 케이스 하나의 세션입니다. 드라이버는 렌더링된 문서를
//! 직접 평가하여 리소스를 생성/수정/교체/삭제합니다.
//!
//! # 모델링하는 프로바이더 동작
//! - 같은 구성을 다시 적용하면 아무것도 바뀌지 않음
//! - `force_new` 속성이 바뀌면 교체, 그 외 변경은 제자리 수정
//! - 문서에서 사라진 리소스는 삭제
//! - `write_only` 속성은 import 결과에서 빠짐
//! - 잠금 타입은 테넌트당 한 세션만 소유 (다른 세션이 생성하면 `Conflict`)
//! - 리소스 동작은 [`RemoteContext`]로 부수 객체를 만들거나 고칠 수 있음
//!   (예: 인스턴스의 시스템 디스크)
//!
//! 결함 주입([`Fault`])으로 지연, 실패, 타임아웃을 재현할 수 있습니다.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Map, Value};
use tfacc_core::error::DriverError;
use tfacc_core::types::{ResourceAddress, ResourceIndex, ResourceMode, ResourceState, StateSnapshot};
use tfacc_hcl::functions::as_index;
use tfacc_hcl::{Block, Body, BodyItem, Document, HclError, RenderedConfig, Resolved, Scope, evaluate};
use tracing::{debug, info, warn};

use crate::driver::{DriverFactory, LifecycleDriver};
use crate::error::RunnerError;

/// 평가하지 않는 메타 인자
const META_ARGUMENTS: &[&str] = &["count", "depends_on", "provider", "for_each"];

// ─── Remote objects ──────────────────────────────────────────────────

/// 원격 객체
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteObject {
    /// 원격 식별자
    pub id: String,
    /// 리소스 타입
    pub resource_type: String,
    /// 현재 속성 (`id` 포함)
    pub attributes: Map<String, Value>,
    /// 소유 세션
    pub owner: String,
    /// 마지막으로 적용된 입력 구성
    config: Map<String, Value>,
}

/// 누적 변경 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloudStats {
    /// 생성 수
    pub created: u64,
    /// 제자리 수정 수
    pub updated: u64,
    /// 교체 수
    pub replaced: u64,
    /// 삭제 수
    pub deleted: u64,
}

#[derive(Debug, Default)]
struct CloudState {
    objects: BTreeMap<String, RemoteObject>,
    /// 잠금 타입 → 소유 세션
    locks: HashMap<String, String>,
    faults: Vec<Fault>,
    stats: CloudStats,
}

// ─── Behaviors ───────────────────────────────────────────────────────

/// 리소스 타입별 원격 동작
///
/// 기본 구현은 입력 속성을 그대로 저장하는 일반 리소스입니다.
pub trait ResourceBehavior: Send + Sync {
    /// 생성 직후 계산 속성을 채웁니다.
    fn on_create(
        &self,
        _ctx: &mut RemoteContext<'_>,
        _attributes: &mut Map<String, Value>,
    ) -> Result<(), DriverError> {
        Ok(())
    }

    /// 제자리 수정 직후 호출됩니다.
    fn on_update(
        &self,
        _ctx: &mut RemoteContext<'_>,
        _previous: &Map<String, Value>,
        _attributes: &mut Map<String, Value>,
    ) -> Result<(), DriverError> {
        Ok(())
    }

    /// 삭제 직후 호출됩니다.
    fn on_delete(&self, _ctx: &mut RemoteContext<'_>, _object: &RemoteObject) {}

    /// 다시 읽을 때 값이 바뀔 수 있는 속성을 갱신합니다.
    fn on_read(&self, _attributes: &mut Map<String, Value>) {}

    /// 값이 바뀌면 교체가 필요한 속성
    fn force_new(&self) -> &[&str] {
        &[]
    }

    /// 원격에서 다시 읽을 수 없는 속성 (비밀번호 등)
    fn write_only(&self) -> &[&str] {
        &[]
    }
}

/// 입력 속성만 저장하는 리소스
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainResource;

impl ResourceBehavior for PlainResource {}

/// 데이터 소스 동작
pub trait DataSourceBehavior: Send + Sync {
    /// 인자로 원격 상태를 조회하여 계산 속성을 반환합니다.
    fn read(
        &self,
        ctx: &RemoteContext<'_>,
        args: &Map<String, Value>,
    ) -> Result<Map<String, Value>, DriverError>;
}

/// 고정 속성을 반환하는 데이터 소스
#[derive(Debug, Clone, Default)]
pub struct StaticDataSource {
    attributes: Map<String, Value>,
}

impl StaticDataSource {
    /// JSON 객체에서 만듭니다. 객체가 아니면 빈 속성입니다.
    pub fn new(attributes: Value) -> Self {
        Self {
            attributes: attributes.as_object().cloned().unwrap_or_default(),
        }
    }
}

impl DataSourceBehavior for StaticDataSource {
    fn read(
        &self,
        _ctx: &RemoteContext<'_>,
        _args: &Map<String, Value>,
    ) -> Result<Map<String, Value>, DriverError> {
        Ok(self.attributes.clone())
    }
}

/// 동작 훅에 노출되는 원격 상태
pub struct RemoteContext<'a> {
    state: &'a mut CloudState,
    session: &'a str,
}

impl RemoteContext<'_> {
    /// 현재 세션
    pub fn session(&self) -> &str {
        self.session
    }

    /// 부수 객체를 생성하고 id를 반환합니다.
    pub fn create(&mut self, resource_type: &str, mut attributes: Map<String, Value>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        attributes.insert("id".to_owned(), Value::String(id.clone()));
        self.state.objects.insert(
            id.clone(),
            RemoteObject {
                id: id.clone(),
                resource_type: resource_type.to_owned(),
                config: attributes.clone(),
                attributes,
                owner: self.session.to_owned(),
            },
        );
        self.state.stats.created += 1;
        id
    }

    /// 객체를 삭제합니다.
    pub fn delete(&mut self, id: &str) -> Option<RemoteObject> {
        let removed = self.state.objects.remove(id);
        if removed.is_some() {
            self.state.stats.deleted += 1;
        }
        removed
    }

    /// id로 객체를 조회합니다.
    pub fn get(&self, id: &str) -> Option<&RemoteObject> {
        self.state.objects.get(id)
    }

    /// id로 객체를 가변 조회합니다.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut RemoteObject> {
        self.state.objects.get_mut(id)
    }

    /// 타입별 객체 (id 순)
    pub fn objects_of<'b>(&'b self, resource_type: &'b str) -> impl Iterator<Item = &'b RemoteObject> + 'b {
        self.state
            .objects
            .values()
            .filter(move |o| o.resource_type == resource_type)
    }
}

// ─── Faults ──────────────────────────────────────────────────────────

/// 결함 주입 대상 작업
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// apply
    Apply,
    /// destroy
    Destroy,
    /// import
    Import,
    /// 존재 확인
    Read,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => write!(f, "apply"),
            Self::Destroy => write!(f, "destroy"),
            Self::Import => write!(f, "import"),
            Self::Read => write!(f, "read"),
        }
    }
}

/// 결함 주입 규칙
///
/// 일치하는 작업이 시작될 때마다 한 번 소비됩니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    operation: Operation,
    case: Option<String>,
    delay: Option<Duration>,
    error: Option<String>,
    remaining: usize,
}

impl Fault {
    /// 작업을 실패시킵니다.
    pub fn fail(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            operation,
            case: None,
            delay: None,
            error: Some(message.into()),
            remaining: 1,
        }
    }

    /// 작업을 지연시킵니다.
    pub fn delay(operation: Operation, delay: Duration) -> Self {
        Self {
            operation,
            case: None,
            delay: Some(delay),
            error: None,
            remaining: 1,
        }
    }

    /// 특정 케이스에만 적용합니다.
    pub fn for_case(mut self, case: impl Into<String>) -> Self {
        self.case = Some(case.into());
        self
    }

    /// 적용 횟수를 설정합니다.
    pub fn times(mut self, n: usize) -> Self {
        self.remaining = n;
        self
    }

    fn matches(&self, operation: Operation, case: &str) -> bool {
        self.operation == operation
            && self.remaining > 0
            && self.case.as_deref().is_none_or(|c| c == case)
    }
}

// ─── MemoryCloud ─────────────────────────────────────────────────────

/// 공유 원격 객체 저장소
///
/// 동작 등록은 `Arc`로 감싸기 전에 끝내야 합니다.
pub struct MemoryCloud {
    resources: HashMap<String, Arc<dyn ResourceBehavior>>,
    data_sources: HashMap<String, Arc<dyn DataSourceBehavior>>,
    locked_types: HashSet<String>,
    plain: Arc<dyn ResourceBehavior>,
    state: Mutex<CloudState>,
}

impl MemoryCloud {
    /// 빈 클라우드
    pub fn new() -> Self {
        Self {
            resources: HashMap::new(),
            data_sources: HashMap::new(),
            locked_types: HashSet::new(),
            plain: Arc::new(PlainResource),
            state: Mutex::new(CloudState::default()),
        }
    }

    /// 리소스 동작을 등록합니다.
    pub fn register_resource(
        &mut self,
        resource_type: impl Into<String>,
        behavior: Arc<dyn ResourceBehavior>,
    ) -> Result<(), RunnerError> {
        let resource_type = resource_type.into();
        if self.resources.contains_key(&resource_type) {
            return Err(RunnerError::AlreadyRegistered(resource_type));
        }
        self.resources.insert(resource_type, behavior);
        Ok(())
    }

    /// 데이터 소스 동작을 등록합니다.
    pub fn register_data_source(
        &mut self,
        data_type: impl Into<String>,
        behavior: Arc<dyn DataSourceBehavior>,
    ) -> Result<(), RunnerError> {
        let data_type = data_type.into();
        if self.data_sources.contains_key(&data_type) {
            return Err(RunnerError::AlreadyRegistered(format!("data.{data_type}")));
        }
        self.data_sources.insert(data_type, behavior);
        Ok(())
    }

    /// 테넌트당 한 세션만 소유할 수 있는 타입으로 지정합니다.
    pub fn lock_type(&mut self, resource_type: impl Into<String>) {
        self.locked_types.insert(resource_type.into());
    }

    /// 결함 규칙을 추가합니다.
    pub fn inject(&self, fault: Fault) {
        self.state().faults.push(fault);
    }

    /// 모든 원격 객체 (id 순)
    pub fn objects(&self) -> Vec<RemoteObject> {
        self.state().objects.values().cloned().collect()
    }

    /// 타입별 원격 객체
    pub fn objects_of(&self, resource_type: &str) -> Vec<RemoteObject> {
        self.state()
            .objects
            .values()
            .filter(|o| o.resource_type == resource_type)
            .cloned()
            .collect()
    }

    /// id로 객체를 조회합니다.
    pub fn object(&self, id: &str) -> Option<RemoteObject> {
        self.state().objects.get(id).cloned()
    }

    /// 원격 객체 수
    pub fn len(&self) -> usize {
        self.state().objects.len()
    }

    /// 원격 객체가 없으면 `true`
    pub fn is_empty(&self) -> bool {
        self.state().objects.is_empty()
    }

    /// 누적 변경 통계
    pub fn stats(&self) -> CloudStats {
        self.state().stats
    }

    /// 잠금 타입의 현재 소유 세션
    pub fn lock_holder(&self, resource_type: &str) -> Option<String> {
        self.state().locks.get(resource_type).cloned()
    }

    /// 테스트 밖에서 객체를 지웁니다 (수동 정리, 외부 삭제 재현).
    pub fn remove_out_of_band(&self, id: &str) -> Option<RemoteObject> {
        let mut state = self.state();
        let removed = state.objects.remove(id);
        if let Some(object) = &removed {
            release_lock_if_unused(&mut state, &object.resource_type, &object.owner);
        }
        removed
    }

    fn state(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn behavior(&self, resource_type: &str) -> Arc<dyn ResourceBehavior> {
        self.resources
            .get(resource_type)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.plain))
    }

    /// 일치하는 결함을 하나 소비합니다.
    fn take_fault(&self, operation: Operation, case: &str) -> Option<(Option<Duration>, Option<String>)> {
        let mut state = self.state();
        let fault = state.faults.iter_mut().find(|f| f.matches(operation, case))?;
        fault.remaining -= 1;
        let taken = (fault.delay, fault.error.clone());
        state.faults.retain(|f| f.remaining > 0);
        Some(taken)
    }
}

impl Default for MemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryCloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut resources: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        resources.sort_unstable();
        f.debug_struct("MemoryCloud")
            .field("resources", &resources)
            .field("data_sources", &self.data_sources.len())
            .field("locked_types", &self.locked_types)
            .field("objects", &self.len())
            .finish()
    }
}

fn release_lock_if_unused(state: &mut CloudState, resource_type: &str, session: &str) {
    let still_owned = state
        .objects
        .values()
        .any(|o| o.resource_type == resource_type && o.owner == session);
    if !still_owned && state.locks.get(resource_type).map(String::as_str) == Some(session) {
        state.locks.remove(resource_type);
    }
}

/// 객체를 삭제하고 삭제 훅과 잠금 해제를 수행합니다.
fn delete_object(cloud: &MemoryCloud, state: &mut CloudState, id: &str, session: &str) -> bool {
    let Some(object) = state.objects.remove(id) else {
        return false;
    };
    state.stats.deleted += 1;
    let behavior = cloud.behavior(&object.resource_type);
    behavior.on_delete(
        &mut RemoteContext {
            state: &mut *state,
            session,
        },
        &object,
    );
    release_lock_if_unused(state, &object.resource_type, &object.owner);
    true
}

// ─── MemoryDriver ────────────────────────────────────────────────────

/// 케이스 하나의 메모리 클라우드 세션
pub struct MemoryDriver {
    cloud: Arc<MemoryCloud>,
    case: String,
    session: String,
    /// 생성 순서의 추적 리소스
    tracked: Vec<(ResourceAddress, String)>,
}

impl MemoryDriver {
    /// 새 세션을 엽니다.
    pub fn new(cloud: Arc<MemoryCloud>, case: impl Into<String>) -> Self {
        let case = case.into();
        let session = format!("{case}-{}", uuid::Uuid::new_v4());
        Self {
            cloud,
            case,
            session,
            tracked: Vec::new(),
        }
    }

    /// 세션 이름
    pub fn session(&self) -> &str {
        &self.session
    }

    /// 추적 중인 리소스 (생성 순)
    pub fn tracked(&self) -> &[(ResourceAddress, String)] {
        &self.tracked
    }

    /// 결함 규칙을 적용합니다. 지연은 잠금 밖에서 기다립니다.
    async fn fault(&self, operation: Operation) -> Result<(), String> {
        let Some((delay, error)) = self.cloud.take_fault(operation, &self.case) else {
            return Ok(());
        };
        if let Some(delay) = delay {
            debug!(case = %self.case, %operation, ?delay, "injected delay");
            tokio::time::sleep(delay).await;
        }
        match error {
            Some(message) => Err(message),
            None => Ok(()),
        }
    }

    fn apply_document(&mut self, document: &Document) -> Result<StateSnapshot, DriverError> {
        let cloud = Arc::clone(&self.cloud);
        let mut state = cloud.state();
        let prior: BTreeMap<ResourceAddress, String> = self.tracked.iter().cloned().collect();

        let mut evaluator = Evaluator {
            doc: document,
            cloud: cloud.as_ref(),
            state: &mut *state,
            session: &self.session,
            prior: &prior,
            realized: BTreeMap::new(),
            locals: BTreeMap::new(),
            in_progress: Vec::new(),
            count_index: Vec::new(),
            applied: Vec::new(),
            snapshot: StateSnapshot::new(),
            driver_error: None,
        };

        let result = evaluator.realize_all();
        let applied = std::mem::take(&mut evaluator.applied);
        let snapshot = std::mem::take(&mut evaluator.snapshot);
        let driver_error = evaluator.driver_error.take();

        // 일부만 적용된 경우에도 만들어진 객체는 추적해야 destroy로 지울 수 있습니다.
        let kept: HashSet<&String> = applied.iter().map(|(_, id)| id).collect();
        let mut tracked = applied.clone();
        if let Err(e) = result {
            for (address, id) in &self.tracked {
                if !kept.contains(id) && state.objects.contains_key(id) {
                    tracked.push((address.clone(), id.clone()));
                }
            }
            self.tracked = tracked;
            return Err(driver_error.unwrap_or_else(|| DriverError::Apply(e.to_string())));
        }

        // 문서에서 사라진 리소스 삭제 (역순)
        let mut removed = 0;
        for (address, id) in self.tracked.iter().rev() {
            if !kept.contains(id) && delete_object(&cloud, &mut state, id, &self.session) {
                debug!(case = %self.case, %address, id, "resource removed from configuration deleted");
                removed += 1;
            }
        }
        self.tracked = tracked;

        info!(
            case = %self.case,
            blocks = document.blocks().len(),
            resources = self.tracked.len(),
            removed,
            "configuration applied"
        );
        Ok(snapshot)
    }
}

impl LifecycleDriver for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    async fn apply(&mut self, config: &RenderedConfig) -> Result<StateSnapshot, DriverError> {
        self.fault(Operation::Apply).await.map_err(DriverError::Apply)?;
        self.apply_document(&config.document)
    }

    async fn destroy(&mut self) -> Result<(), DriverError> {
        self.fault(Operation::Destroy).await.map_err(DriverError::Destroy)?;
        let cloud = Arc::clone(&self.cloud);
        let mut state = cloud.state();
        let mut deleted = 0;
        for (_, id) in self.tracked.iter().rev() {
            // 이미 없는 객체는 건너뜁니다.
            if delete_object(&cloud, &mut state, id, &self.session) {
                deleted += 1;
            }
        }
        self.tracked.clear();

        // 적용 도중 중단되어 추적되지 못한 세션 객체
        let orphans: Vec<String> = state
            .objects
            .values()
            .filter(|o| o.owner == self.session)
            .map(|o| o.id.clone())
            .collect();
        for id in orphans {
            if delete_object(&cloud, &mut state, &id, &self.session) {
                warn!(case = %self.case, id, "untracked session object deleted");
                deleted += 1;
            }
        }
        info!(case = %self.case, deleted, "resources destroyed");
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
        self.fault(Operation::Import).await.map_err(import_error)?;

        let state = self.cloud.state();
        let object = state
            .objects
            .get(id)
            .ok_or_else(|| import_error(format!("cannot import non-existent remote object {id}")))?;
        if object.resource_type != address.resource_type {
            return Err(import_error(format!(
                "object {id} is a {}, not a {}",
                object.resource_type, address.resource_type
            )));
        }

        let behavior = self.cloud.behavior(&object.resource_type);
        let mut attributes = object.attributes.clone();
        for key in behavior.write_only() {
            attributes.remove(*key);
        }
        behavior.on_read(&mut attributes);
        Ok(ResourceState::new(address.clone(), attributes))
    }

    async fn exists(&mut self, address: &ResourceAddress, id: &str) -> Result<bool, DriverError> {
        self.fault(Operation::Read)
            .await
            .map_err(|reason| DriverError::Read {
                address: address.to_string(),
                reason,
            })?;
        let state = self.cloud.state();
        Ok(state
            .objects
            .get(id)
            .is_some_and(|o| o.resource_type == address.resource_type))
    }
}

impl fmt::Debug for MemoryDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDriver")
            .field("session", &self.session)
            .field("tracked", &self.tracked.len())
            .finish()
    }
}

/// 케이스마다 [`MemoryDriver`] 세션을 만드는 팩토리
#[derive(Debug, Clone)]
pub struct MemoryDriverFactory {
    cloud: Arc<MemoryCloud>,
}

impl MemoryDriverFactory {
    /// 새 팩토리
    pub fn new(cloud: Arc<MemoryCloud>) -> Self {
        Self { cloud }
    }

    /// 공유 클라우드
    pub fn cloud(&self) -> &Arc<MemoryCloud> {
        &self.cloud
    }
}

impl DriverFactory for MemoryDriverFactory {
    fn create(&self, case: &str) -> Result<Box<dyn crate::driver::DynDriver>, DriverError> {
        Ok(Box::new(MemoryDriver::new(Arc::clone(&self.cloud), case)))
    }
}

// ─── Evaluator ───────────────────────────────────────────────────────

/// 참조를 만나면 대상 블록을 그때 실현하는 지연 스코프
struct Evaluator<'a> {
    doc: &'a Document,
    cloud: &'a MemoryCloud,
    state: &'a mut CloudState,
    session: &'a str,
    prior: &'a BTreeMap<ResourceAddress, String>,
    /// 블록 주소 → 값 (count가 있으면 배열)
    realized: BTreeMap<String, Value>,
    locals: BTreeMap<String, Value>,
    /// 순환 검출용 실현 스택
    in_progress: Vec<String>,
    count_index: Vec<usize>,
    /// 실현 순서의 managed 리소스
    applied: Vec<(ResourceAddress, String)>,
    snapshot: StateSnapshot,
    /// 분류를 유지해야 하는 드라이버 에러 (예: Conflict)
    driver_error: Option<DriverError>,
}

impl<'a> Evaluator<'a> {
    fn realize_all(&mut self) -> Result<(), HclError> {
        let doc = self.doc;
        for block in doc.blocks() {
            if matches!(block.kind.as_str(), "resource" | "data")
                && let Some(address) = block.address()
            {
                self.realize(&address)?;
            }
        }
        Ok(())
    }

    fn realize(&mut self, address: &str) -> Result<Value, HclError> {
        if let Some(value) = self.realized.get(address) {
            return Ok(value.clone());
        }
        if self.in_progress.iter().any(|a| a == address) {
            return Err(HclError::Eval(format!(
                "dependency cycle: {} -> {address}",
                self.in_progress.join(" -> ")
            )));
        }
        let doc = self.doc;
        let block = doc
            .find(address)
            .ok_or_else(|| HclError::Eval(format!("reference to undeclared resource '{address}'")))?;

        self.in_progress.push(address.to_owned());
        let value = self.realize_block(block);
        self.in_progress.pop();
        let value = value?;

        self.realized.insert(address.to_owned(), value.clone());
        Ok(value)
    }

    fn realize_block(&mut self, block: &'a Block) -> Result<Value, HclError> {
        if let Some(depends_on) = block.body.attribute("depends_on") {
            evaluate(&depends_on.value.to_expression()?, self)?;
        }
        match block.body.attribute("count") {
            Some(count) => {
                let n = as_index(&evaluate(&count.value.to_expression()?, self)?)?;
                let mut items = Vec::with_capacity(n);
                for i in 0..n {
                    self.count_index.push(i);
                    let item = self.realize_instance(block, Some(i));
                    self.count_index.pop();
                    items.push(item?);
                }
                Ok(Value::Array(items))
            }
            None => self.realize_instance(block, None),
        }
    }

    fn realize_instance(&mut self, block: &'a Block, index: Option<usize>) -> Result<Value, HclError> {
        let [resource_type, name] = block.labels.as_slice() else {
            return Err(HclError::Eval(format!("malformed {} block", block.kind)));
        };
        let config = self.evaluate_body(&block.body)?;
        let mode = if block.kind == "data" {
            ResourceMode::Data
        } else {
            ResourceMode::Managed
        };
        let address = ResourceAddress {
            mode,
            resource_type: resource_type.clone(),
            name: name.clone(),
            index: index.map(ResourceIndex::Int),
        };

        let attributes = match mode {
            ResourceMode::Data => self.read_data(&address, config)?,
            ResourceMode::Managed => self.reconcile(&address, config)?,
        };
        self.snapshot
            .insert(ResourceState::new(address, attributes.clone()));
        Ok(Value::Object(attributes))
    }

    fn read_data(
        &mut self,
        address: &ResourceAddress,
        config: Map<String, Value>,
    ) -> Result<Map<String, Value>, HclError> {
        let behavior = self
            .cloud
            .data_sources
            .get(&address.resource_type)
            .cloned()
            .ok_or_else(|| {
                HclError::Eval(format!(
                    "data source type '{}' is not supported",
                    address.resource_type
                ))
            })?;
        let ctx = RemoteContext {
            state: &mut *self.state,
            session: self.session,
        };
        let computed = behavior.read(&ctx, &config).map_err(|e| self.keep(e))?;

        let mut attributes = config;
        attributes.extend(computed);
        attributes
            .entry("id".to_owned())
            .or_insert_with(|| Value::String(address.to_string()));
        Ok(attributes)
    }

    /// 이전 객체와 비교하여 생성/수정/교체합니다.
    fn reconcile(
        &mut self,
        address: &ResourceAddress,
        config: Map<String, Value>,
    ) -> Result<Map<String, Value>, HclError> {
        let behavior = self.cloud.behavior(&address.resource_type);
        let previous = self
            .prior
            .get(address)
            .and_then(|id| self.state.objects.get(id))
            .cloned();

        let attributes = match previous {
            Some(old) if old.config == config => old.attributes,
            Some(old)
                if behavior
                    .force_new()
                    .iter()
                    .any(|k| old.config.get(*k) != config.get(*k)) =>
            {
                debug!(%address, id = %old.id, "replacing resource");
                delete_object(self.cloud, &mut *self.state, &old.id, self.session);
                let attributes = self.create(address, config, behavior.as_ref())?;
                self.state.stats.replaced += 1;
                attributes
            }
            Some(old) => {
                let mut attributes = old.attributes.clone();
                for key in old.config.keys() {
                    if !config.contains_key(key) {
                        attributes.remove(key);
                    }
                }
                attributes.extend(config.clone());
                let mut ctx = RemoteContext {
                    state: &mut *self.state,
                    session: self.session,
                };
                behavior
                    .on_update(&mut ctx, &old.attributes, &mut attributes)
                    .map_err(|e| self.keep(e))?;
                if let Some(object) = self.state.objects.get_mut(&old.id) {
                    object.attributes = attributes.clone();
                    object.config = config;
                }
                self.state.stats.updated += 1;
                debug!(%address, id = %old.id, "resource updated in place");
                attributes
            }
            None => self.create(address, config, behavior.as_ref())?,
        };

        if let Some(id) = attributes.get("id").and_then(Value::as_str) {
            self.applied.push((address.clone(), id.to_owned()));
        }
        Ok(attributes)
    }

    fn create(
        &mut self,
        address: &ResourceAddress,
        config: Map<String, Value>,
        behavior: &dyn ResourceBehavior,
    ) -> Result<Map<String, Value>, HclError> {
        let resource_type = &address.resource_type;
        if self.cloud.locked_types.contains(resource_type) {
            match self.state.locks.get(resource_type).cloned() {
                Some(holder) if holder != self.session => {
                    return Err(self.keep(DriverError::Conflict {
                        resource_type: resource_type.clone(),
                        reason: format!("tenant resource is held by session {holder}"),
                    }));
                }
                _ => {
                    self.state
                        .locks
                        .insert(resource_type.clone(), self.session.to_owned());
                }
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let mut attributes = config.clone();
        attributes.insert("id".to_owned(), Value::String(id.clone()));
        let mut ctx = RemoteContext {
            state: &mut *self.state,
            session: self.session,
        };
        if let Err(e) = behavior.on_create(&mut ctx, &mut attributes) {
            release_lock_if_unused(&mut *self.state, resource_type, self.session);
            return Err(self.keep(e));
        }

        self.state.objects.insert(
            id.clone(),
            RemoteObject {
                id: id.clone(),
                resource_type: resource_type.clone(),
                attributes: attributes.clone(),
                owner: self.session.to_owned(),
                config,
            },
        );
        self.state.stats.created += 1;
        debug!(%address, id, "resource created");
        Ok(attributes)
    }

    fn evaluate_body(&mut self, body: &'a Body) -> Result<Map<String, Value>, HclError> {
        let mut map = Map::new();
        for item in body.items() {
            match item {
                BodyItem::Attribute(attr) => {
                    if META_ARGUMENTS.contains(&attr.name.as_str()) {
                        continue;
                    }
                    let value = evaluate(&attr.value.to_expression()?, self)?;
                    if !value.is_null() {
                        map.insert(attr.name.clone(), value);
                    }
                }
                BodyItem::Block(block) if block.kind == "lifecycle" => {}
                BodyItem::Block(block) if block.kind == "timeouts" => {
                    let value = self.evaluate_body(&block.body)?;
                    map.insert(block.kind.clone(), Value::Object(value));
                }
                BodyItem::Block(block) => {
                    let value = Value::Object(self.evaluate_body(&block.body)?);
                    match map
                        .entry(block.kind.clone())
                        .or_insert_with(|| Value::Array(Vec::new()))
                    {
                        Value::Array(items) => items.push(value),
                        other => *other = Value::Array(vec![value]),
                    }
                }
                BodyItem::Blank => {}
            }
        }
        Ok(map)
    }

    fn local(&mut self, name: &str) -> Result<Value, HclError> {
        if let Some(value) = self.locals.get(name) {
            return Ok(value.clone());
        }
        let key = format!("local.{name}");
        if self.in_progress.contains(&key) {
            return Err(HclError::Eval(format!("dependency cycle through {key}")));
        }
        let doc = self.doc;
        let locals = doc.locals();
        let expr = locals
            .get(name)
            .ok_or_else(|| HclError::Eval(format!("reference to undeclared '{key}'")))?;

        self.in_progress.push(key);
        let value = expr.to_expression().and_then(|e| evaluate(&e, self));
        self.in_progress.pop();
        let value = value?;
        self.locals.insert(name.to_owned(), value.clone());
        Ok(value)
    }

    fn variable(&mut self, name: &str) -> Result<Value, HclError> {
        let doc = self.doc;
        let block = doc
            .find(&format!("var.{name}"))
            .ok_or_else(|| HclError::Eval(format!("reference to undeclared 'var.{name}'")))?;
        match block.body.attribute("default") {
            Some(default) => evaluate(&default.value.to_expression()?, self),
            None => Err(HclError::Eval(format!("variable '{name}' has no default value"))),
        }
    }

    /// 드라이버 에러를 보관하고 평가 중단용 에러로 바꿉니다.
    fn keep(&mut self, err: DriverError) -> HclError {
        let message = err.to_string();
        if self.driver_error.is_none() {
            self.driver_error = Some(err);
        }
        HclError::Eval(message)
    }
}

impl Scope for Evaluator<'_> {
    fn resolve(&mut self, root: &str, attrs: &[&str]) -> Result<Resolved, HclError> {
        let first = |n: usize| {
            attrs.get(n).copied().ok_or_else(|| {
                HclError::Eval(format!("incomplete reference starting with '{root}'"))
            })
        };
        match root {
            "var" => Ok(Resolved {
                value: self.variable(first(0)?)?,
                consumed: 1,
            }),
            "local" => Ok(Resolved {
                value: self.local(first(0)?)?,
                consumed: 1,
            }),
            "data" => {
                let address = format!("data.{}.{}", first(0)?, first(1)?);
                Ok(Resolved {
                    value: self.realize(&address)?,
                    consumed: 2,
                })
            }
            "count" => {
                let index = self.count_index.last().copied().ok_or_else(|| {
                    HclError::Eval("count.index used outside a counted resource".to_owned())
                })?;
                Ok(Resolved {
                    value: Value::from(index as u64),
                    consumed: 1,
                })
            }
            "each" | "path" | "self" | "terraform" | "module" => Err(HclError::Eval(format!(
                "'{root}' references are not supported by the memory cloud"
            ))),
            resource_type => {
                let address = format!("{resource_type}.{}", first(0)?);
                Ok(Resolved {
                    value: self.realize(&address)?,
                    consumed: 1,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tfacc_hcl::{Expr, TemplateRegistry};

    /// 인스턴스 생성 시 시스템 디스크를 함께 만드는 동작
    struct InstanceWithDisk;

    impl ResourceBehavior for InstanceWithDisk {
        fn on_create(
            &self,
            ctx: &mut RemoteContext<'_>,
            attributes: &mut Map<String, Value>,
        ) -> Result<(), DriverError> {
            let disk = ctx.create("disk", Map::new());
            attributes.insert("system_disk_id".to_owned(), Value::String(disk));
            Ok(())
        }

        fn on_delete(&self, ctx: &mut RemoteContext<'_>, object: &RemoteObject) {
            if let Some(disk) = object.attributes.get("system_disk_id").and_then(Value::as_str) {
                ctx.delete(disk);
            }
        }

        fn force_new(&self) -> &[&str] {
            &["flavor"]
        }

        fn write_only(&self) -> &[&str] {
            &["admin_pass"]
        }
    }

    fn cloud() -> Arc<MemoryCloud> {
        let mut cloud = MemoryCloud::new();
        cloud
            .register_resource("instance", Arc::new(InstanceWithDisk))
            .unwrap();
        cloud
            .register_data_source("zones", Arc::new(StaticDataSource::new(json!({"names": ["z1", "z2"]}))))
            .unwrap();
        cloud.lock_type("exclusive");
        Arc::new(cloud)
    }

    fn rendered(document: Document) -> RenderedConfig {
        RenderedConfig {
            scenario: "test".to_owned(),
            text: document.to_string(),
            document,
        }
    }

    fn network(cidr: &str) -> Document {
        let mut doc = Document::new();
        doc.push(Block::variable("prefix").attr("default", "tf")).unwrap();
        doc.push(Block::locals().attr("label", "${var.prefix}-net")).unwrap();
        doc.push(Block::data("zones", "all")).unwrap();
        doc.push(
            Block::resource("subnet", "test")
                .attr("vpc_id", Expr::raw("vpc.test.id"))
                .attr("zone", Expr::raw("data.zones.all.names[0]")),
        )
        .unwrap();
        doc.push(
            Block::resource("vpc", "test")
                .attr("name", Expr::raw("local.label"))
                .attr("cidr", cidr),
        )
        .unwrap();
        doc
    }

    #[tokio::test]
    async fn references_are_realized_in_dependency_order() {
        let cloud = cloud();
        let mut driver = MemoryDriver::new(Arc::clone(&cloud), "net");
        let snapshot = driver.apply(&rendered(network("10.0.0.0/16"))).await.unwrap();

        let vpc = snapshot.lookup("vpc.test").unwrap();
        let subnet = snapshot.lookup("subnet.test").unwrap();
        assert_eq!(subnet.attribute("vpc_id").as_deref(), vpc.id());
        assert_eq!(subnet.attribute("zone").as_deref(), Some("z1"));
        assert_eq!(vpc.attribute("name").as_deref(), Some("tf-net"));
        assert!(snapshot.lookup("data.zones.all").is_some());
        // vpc가 subnet보다 먼저 생성됨
        assert_eq!(driver.tracked()[0].0.resource_type, "vpc");
        assert_eq!(cloud.len(), 2);
    }

    #[tokio::test]
    async fn reapply_is_idempotent_and_updates_in_place() {
        let cloud = cloud();
        let mut driver = MemoryDriver::new(Arc::clone(&cloud), "net");
        let first = driver.apply(&rendered(network("10.0.0.0/16"))).await.unwrap();
        let stats = cloud.stats();
        let again = driver.apply(&rendered(network("10.0.0.0/16"))).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(cloud.stats(), stats);

        let updated = driver.apply(&rendered(network("10.1.0.0/16"))).await.unwrap();
        let vpc_id = |s: &StateSnapshot| s.lookup("vpc.test").and_then(|r| r.id().map(str::to_owned));
        assert_eq!(vpc_id(&first), vpc_id(&updated));
        assert_eq!(cloud.stats().updated, stats.updated + 1);
    }

    #[tokio::test]
    async fn force_new_replaces_and_companions_follow() {
        let cloud = cloud();
        let mut driver = MemoryDriver::new(Arc::clone(&cloud), "vm");
        let doc = |flavor: &str| {
            let mut doc = Document::new();
            doc.push(Block::resource("instance", "test").attr("flavor", flavor).attr("admin_pass", "secret"))
                .unwrap();
            doc
        };
        let first = driver.apply(&rendered(doc("s3.small"))).await.unwrap();
        assert_eq!(cloud.objects_of("disk").len(), 1);

        let second = driver.apply(&rendered(doc("s3.large"))).await.unwrap();
        let id = |s: &StateSnapshot| s.lookup("instance.test").and_then(|r| r.id().map(str::to_owned));
        assert_ne!(id(&first), id(&second));
        assert_eq!(cloud.objects_of("disk").len(), 1);
        assert_eq!(cloud.stats().replaced, 1);

        let instance_id = id(&second).unwrap();
        let address: ResourceAddress = "instance.test".parse().unwrap();
        let imported = driver.import_and_read(&address, &instance_id).await.unwrap();
        assert!(imported.attribute("admin_pass").is_none());
        assert_eq!(imported.attribute("flavor").as_deref(), Some("s3.large"));

        driver.destroy().await.unwrap();
        assert!(cloud.is_empty());
        assert!(!driver.exists(&address, &instance_id).await.unwrap());
    }

    #[tokio::test]
    async fn count_expands_instances() {
        let cloud = cloud();
        let mut driver = MemoryDriver::new(Arc::clone(&cloud), "volumes");
        let mut doc = Document::new();
        doc.push(
            Block::resource("volume", "test")
                .attr("count", Expr::Int(3))
                .attr("name", "vol-${count.index}"),
        )
        .unwrap();
        let snapshot = driver.apply(&rendered(doc)).await.unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(
            snapshot.lookup("volume.test[2]").and_then(|r| r.attribute("name")).as_deref(),
            Some("vol-2")
        );
    }

    #[tokio::test]
    async fn removed_blocks_are_deleted() {
        let cloud = cloud();
        let mut driver = MemoryDriver::new(Arc::clone(&cloud), "net");
        driver.apply(&rendered(network("10.0.0.0/16"))).await.unwrap();

        let mut only_vpc = Document::new();
        only_vpc.push(Block::resource("vpc", "test").attr("cidr", "10.0.0.0/16")).unwrap();
        driver.apply(&rendered(only_vpc)).await.unwrap();
        assert_eq!(cloud.len(), 1);
        assert_eq!(driver.tracked().len(), 1);
    }

    #[tokio::test]
    async fn locked_type_conflicts_across_sessions() {
        let cloud = cloud();
        let mut doc = Document::new();
        doc.push(Block::resource("exclusive", "test").attr("name", "x")).unwrap();

        let mut first = MemoryDriver::new(Arc::clone(&cloud), "a");
        let mut second = MemoryDriver::new(Arc::clone(&cloud), "b");
        first.apply(&rendered(doc.clone())).await.unwrap();
        assert_eq!(cloud.lock_holder("exclusive").as_deref(), Some(first.session()));

        let err = second.apply(&rendered(doc.clone())).await.unwrap_err();
        assert!(matches!(err, DriverError::Conflict { .. }), "{err}");

        first.destroy().await.unwrap();
        assert!(cloud.lock_holder("exclusive").is_none());
        second.apply(&rendered(doc)).await.unwrap();
    }

    #[tokio::test]
    async fn cycles_are_rejected() {
        let cloud = cloud();
        let mut driver = MemoryDriver::new(cloud, "cycle");
        let mut doc = Document::new();
        doc.push(Block::resource("a", "x").attr("peer", Expr::raw("b.x.id"))).unwrap();
        doc.push(Block::resource("b", "x").attr("peer", Expr::raw("a.x.id"))).unwrap();
        let err = driver.apply(&rendered(doc)).await.unwrap_err();
        assert!(err.to_string().contains("cycle"), "{err}");
    }

    #[tokio::test]
    async fn faults_are_consumed_per_case() {
        let cloud = cloud();
        cloud.inject(Fault::fail(Operation::Destroy, "dependency violation").for_case("b"));
        let mut a = MemoryDriver::new(Arc::clone(&cloud), "a");
        let mut b = MemoryDriver::new(Arc::clone(&cloud), "b");
        a.destroy().await.unwrap();
        assert!(matches!(b.destroy().await, Err(DriverError::Destroy(_))));
        b.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn import_of_missing_object_fails() {
        let cloud = cloud();
        let mut driver = MemoryDriver::new(cloud, "x");
        let address: ResourceAddress = "vpc.test".parse().unwrap();
        let err = driver.import_and_read(&address, "nope").await.unwrap_err();
        assert!(err.to_string().contains("non-existent"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut cloud = MemoryCloud::new();
        cloud.register_resource("vpc", Arc::new(PlainResource)).unwrap();
        assert!(matches!(
            cloud.register_resource("vpc", Arc::new(PlainResource)),
            Err(RunnerError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn works_through_the_template_registry() {
        let mut registry = TemplateRegistry::new();
        registry
            .register_fn("net", |params| {
                let mut doc = network(params.str("cidr")?);
                doc.push(Block::output("vpc_id").attr("value", Expr::raw("vpc.test.id")))?;
                Ok(doc)
            })
            .unwrap();
        let config = registry
            .render("net", &tfacc_hcl::TemplateParams::new().with("cidr", "10.0.0.0/16"))
            .unwrap();
        let mut driver = MemoryDriver::new(cloud(), "net");
        let snapshot = driver.apply(&config).await.unwrap();
        assert_eq!(snapshot.managed().count(), 2);
    }
}
