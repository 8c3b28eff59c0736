//! 러너 통합 테스트 -- 인메모리 클라우드 위에서 스케줄러 → 단계 실행기 전체 흐름

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};
use tfacc_core::error::DriverError;
use tfacc_hcl::{Block, Document, Expr, TemplateParams, TemplateRegistry};
use tfacc_runner::{
    CaseStatus, Fault, FailureKind, Isolation, MemoryCloud, MemoryDriverFactory, Operation,
    RemoteContext, ResourceBehavior, RunSettings, Scheduler, StageRunner, StaticDataSource,
    StepCheck, StepStatus, TestCase,
};
use tfacc_verify::AttributeCheck;

const QUEUE: &str = "queue.test";

/// 비밀번호는 읽기 불가, 사용량은 읽을 때마다 바뀜
struct Queue;

impl ResourceBehavior for Queue {
    fn on_create(
        &self,
        _ctx: &mut RemoteContext<'_>,
        attributes: &mut Map<String, Value>,
    ) -> Result<(), DriverError> {
        attributes.insert("status".to_owned(), json!("RUNNING"));
        attributes.insert("used_storage".to_owned(), json!(0));
        Ok(())
    }

    fn on_read(&self, attributes: &mut Map<String, Value>) {
        attributes.insert("used_storage".to_owned(), json!(42));
    }

    fn force_new(&self) -> &[&str] {
        &["engine_version"]
    }

    fn write_only(&self) -> &[&str] {
        &["password"]
    }
}

fn cloud() -> Arc<MemoryCloud> {
    let mut cloud = MemoryCloud::new();
    cloud.register_resource("queue", Arc::new(Queue)).unwrap();
    cloud
        .register_data_source("product", Arc::new(StaticDataSource::new(json!({"id": "p-100"}))))
        .unwrap();
    cloud.lock_type("queue");
    Arc::new(cloud)
}

fn registry() -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();
    registry
        .register_fn("queue", |params| {
            let mut doc = Document::new();
            doc.push(Block::data("product", "test"))?;
            doc.push(
                Block::resource("queue", "test")
                    .attr("name", params.str("name")?)
                    .attr("engine_version", params.str("version")?)
                    .attr("product_id", Expr::raw("data.product.test.id"))
                    .attr("password", "Secret#123"),
            )?;
            Ok(doc)
        })
        .unwrap();
    registry
}

fn scheduler(cloud: &Arc<MemoryCloud>, max_parallel: usize) -> Scheduler {
    let runner = StageRunner::new(
        Arc::new(registry()),
        Arc::new(MemoryDriverFactory::new(Arc::clone(cloud))),
        RunSettings::default(),
    );
    Scheduler::new(Arc::new(runner), max_parallel)
}

fn params(name: &str, version: &str) -> TemplateParams {
    TemplateParams::new().with("name", name).with("version", version)
}

fn queue_case(name: &str, isolation: Isolation) -> TestCase {
    TestCase::builder(name)
        .isolation(isolation)
        .apply(
            "queue",
            params(name, "3.7"),
            vec![
                StepCheck::Exists(QUEUE.parse().unwrap()),
                StepCheck::Attribute(AttributeCheck::equals(QUEUE, "name", name).unwrap()),
                StepCheck::Attribute(
                    AttributeCheck::equals_reference(QUEUE, "product_id", "${data.product.test.id}")
                        .unwrap(),
                ),
            ],
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn create_update_import_lifecycle() {
    let cloud = cloud();
    let case = TestCase::builder("queue_lifecycle")
        .apply(
            "queue",
            params("tf-test-abc", "3.7"),
            vec![StepCheck::Attribute(
                AttributeCheck::equals(QUEUE, "status", "RUNNING").unwrap(),
            )],
        )
        .apply(
            "queue",
            params("tf-test-abc-update", "3.8"),
            vec![StepCheck::Attribute(
                AttributeCheck::equals(QUEUE, "engine_version", "3.8").unwrap(),
            )],
        )
        .import_verify(QUEUE, ["password", "used_storage"])
        .build()
        .unwrap();

    let suite = scheduler(&cloud, 2).run(vec![case]).await.unwrap();
    let report = suite.case("queue_lifecycle").unwrap();
    assert!(report.passed(), "{report}");
    assert_eq!(report.steps.len(), 3);
    assert!(report.steps.iter().all(|s| s.status == StepStatus::Passed));
    assert!(report.steps[2].import_diff.as_ref().is_some_and(|d| d.is_clean()));

    // 버전 변경은 교체, 이후 destroy로 모두 정리
    assert_eq!(cloud.stats().replaced, 1);
    assert!(cloud.is_empty());
    assert!(cloud.lock_holder("queue").is_none());
}

#[tokio::test]
async fn import_without_ignore_reports_write_only_mismatch() {
    let cloud = cloud();
    let case = TestCase::builder("queue_import_strict")
        .apply("queue", params("tf-test-x", "3.7"), vec![])
        .import_verify(QUEUE, ["used_storage"])
        .build()
        .unwrap();

    let suite = scheduler(&cloud, 1).run(vec![case]).await.unwrap();
    let report = &suite.cases[0];
    assert_eq!(report.status, CaseStatus::Failed);
    assert_eq!(report.failure_kind(), Some(FailureKind::Import));
    assert!(report.failure.as_ref().unwrap().message.contains("password"));
    assert!(cloud.is_empty());
}

#[tokio::test]
async fn exclusive_group_serializes_locked_type() {
    let cloud = cloud();
    // 첫 케이스의 destroy를 늦춰도 배타 그룹이면 충돌하지 않음
    cloud.inject(Fault::delay(Operation::Destroy, Duration::from_millis(50)).for_case("queue_a"));
    cloud.inject(Fault::delay(Operation::Apply, Duration::from_millis(10)).for_case("queue_b"));

    let cases = vec![
        queue_case("queue_a", Isolation::exclusive("queue")),
        queue_case("queue_b", Isolation::exclusive("queue")),
    ];
    let suite = scheduler(&cloud, 4).run(cases).await.unwrap();
    assert!(suite.passed(), "{suite}");
    assert_eq!(suite.count(CaseStatus::Passed), 2);
    assert!(cloud.is_empty());
}

#[tokio::test]
async fn parallel_cases_conflict_on_locked_type() {
    let cloud = cloud();
    cloud.inject(Fault::delay(Operation::Destroy, Duration::from_millis(50)).for_case("queue_a"));
    cloud.inject(Fault::delay(Operation::Apply, Duration::from_millis(10)).for_case("queue_b"));

    let cases = vec![
        queue_case("queue_a", Isolation::Parallel),
        queue_case("queue_b", Isolation::Parallel),
    ];
    let suite = scheduler(&cloud, 4).run(cases).await.unwrap();
    assert!(suite.case("queue_a").unwrap().passed());
    let b = suite.case("queue_b").unwrap();
    assert_eq!(b.failure_kind(), Some(FailureKind::Driver));
    assert!(b.failure.as_ref().unwrap().message.contains("queue"));
    assert!(cloud.is_empty());
}

#[tokio::test]
async fn apply_fault_fails_only_its_case() {
    let cloud = cloud();
    cloud.inject(Fault::fail(Operation::Apply, "quota exceeded").for_case("queue_a"));

    let cases = vec![
        queue_case("queue_a", Isolation::exclusive("queue")),
        queue_case("queue_b", Isolation::exclusive("queue")),
    ];
    let suite = scheduler(&cloud, 2).run(cases).await.unwrap();
    let a = suite.case("queue_a").unwrap();
    assert_eq!(a.failure_kind(), Some(FailureKind::Driver));
    assert!(a.failure.as_ref().unwrap().message.contains("quota exceeded"));
    assert!(suite.case("queue_b").unwrap().passed());
    assert!(!suite.passed());
    assert!(suite.to_string().contains("1 passed; 1 failed; 0 skipped"));
}

#[tokio::test(start_paused = true)]
async fn slow_apply_times_out_and_is_cleaned_up() {
    let cloud = cloud();
    cloud.inject(Fault::delay(Operation::Apply, Duration::from_secs(120)));

    let runner = StageRunner::new(
        Arc::new(registry()),
        Arc::new(MemoryDriverFactory::new(Arc::clone(&cloud))),
        RunSettings::default().with_timeout(Duration::from_secs(5)),
    );
    let report = runner
        .run_case(&queue_case("queue_slow", Isolation::Parallel))
        .await;
    assert_eq!(report.failure_kind(), Some(FailureKind::Timeout));
    assert!(report.cleanup_errors.is_empty());
    assert!(cloud.is_empty());
}

#[tokio::test]
async fn destroy_fault_is_a_cleanup_error() {
    let cloud = cloud();
    cloud.inject(Fault::fail(Operation::Destroy, "backend unavailable"));

    let suite = scheduler(&cloud, 1)
        .run(vec![queue_case("queue_leak", Isolation::Parallel)])
        .await
        .unwrap();
    let report = &suite.cases[0];
    assert_eq!(report.status, CaseStatus::Failed);
    assert!(report.failure.is_none());
    assert_eq!(report.failure_kind(), Some(FailureKind::Cleanup));
    // destroy가 실패했으므로 객체는 남아 있음
    assert_eq!(cloud.objects_of("queue").len(), 1);
}

#[tokio::test]
async fn exists_check_read_error_fails_the_step() {
    let cloud = cloud();
    let mut registry = registry();
    registry
        .register_fn("queue_gone", |_| {
            let mut doc = Document::new();
            doc.push(Block::resource("queue", "gone").attr("name", "tmp"))?;
            Ok(doc)
        })
        .unwrap();

    let runner = StageRunner::new(
        Arc::new(registry),
        Arc::new(MemoryDriverFactory::new(Arc::clone(&cloud))),
        RunSettings::default(),
    );
    cloud.inject(Fault::fail(Operation::Read, "object lookup failed"));
    let case = TestCase::builder("queue_gone")
        .apply("queue_gone", TemplateParams::new(), vec![StepCheck::Exists("queue.gone".parse().unwrap())])
        .build()
        .unwrap();
    let report = runner.run_case(&case).await;
    assert_eq!(report.failure_kind(), Some(FailureKind::Driver));
    assert!(cloud.is_empty());
}

/// 생성 중 panic하는 결함 있는 리소스
struct Broken;

impl ResourceBehavior for Broken {
    fn on_create(
        &self,
        _ctx: &mut RemoteContext<'_>,
        _attributes: &mut Map<String, Value>,
    ) -> Result<(), DriverError> {
        panic!("behavior bug");
    }
}

#[tokio::test]
async fn panicking_apply_still_releases_tenant_lock() {
    let mut cloud = MemoryCloud::new();
    cloud.register_resource("queue", Arc::new(Queue)).unwrap();
    cloud.register_resource("broken", Arc::new(Broken)).unwrap();
    cloud
        .register_data_source("product", Arc::new(StaticDataSource::new(json!({"id": "p-100"}))))
        .unwrap();
    cloud.lock_type("queue");
    let cloud = Arc::new(cloud);

    let mut registry = registry();
    registry
        .register_fn("queue_broken", |params| {
            let mut doc = Document::new();
            doc.push(
                Block::resource("queue", "test")
                    .attr("name", params.str("name")?)
                    .attr("engine_version", "3.7"),
            )?;
            // 큐를 참조하므로 큐가 먼저 만들어진 뒤 panic
            doc.push(Block::resource("broken", "test").attr("queue_id", Expr::raw("queue.test.id")))?;
            Ok(doc)
        })
        .unwrap();
    let runner = StageRunner::new(
        Arc::new(registry),
        Arc::new(MemoryDriverFactory::new(Arc::clone(&cloud))),
        RunSettings::default(),
    );
    let scheduler = Scheduler::new(Arc::new(runner), 1);

    let broken = TestCase::builder("queue_broken")
        .isolation(Isolation::exclusive("queue"))
        .apply("queue_broken", params("queue_broken", "3.7"), vec![])
        .build()
        .unwrap();
    let cases = vec![broken, queue_case("queue_after", Isolation::exclusive("queue"))];
    let suite = scheduler.run(cases).await.unwrap();

    let report = suite.case("queue_broken").unwrap();
    assert_eq!(report.failure_kind(), Some(FailureKind::Internal));
    assert_eq!(report.steps[0].status, StepStatus::Failed);
    assert!(report.failure.as_ref().unwrap().message.contains("behavior bug"));
    assert!(suite.case("queue_after").unwrap().passed(), "{suite}");
    assert!(cloud.is_empty());
    assert!(cloud.lock_holder("queue").is_none());
}
