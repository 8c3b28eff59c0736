//! 메트릭 상수 및 설명 등록
//!
//! 하네스가 기록하는 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 러너와 드라이버는 이 상수로 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다. 익스포터는 설치하지 않으며,
//! 레코더가 없으면 기록은 무시됩니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `tfacc_`
//! - 영역: `case_`, `step_`, `driver_`, `check_`, `cleanup_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(tfacc_core::metrics::CASES_TOTAL, tfacc_core::metrics::LABEL_RESULT => "passed")
//!     .increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (passed, failed, skipped)
pub const LABEL_RESULT: &str = "result";

/// 드라이버 작업 레이블 키 (apply, destroy, import, exists)
pub const LABEL_OPERATION: &str = "operation";

/// 스텝 종류 레이블 키 (apply, import)
pub const LABEL_STEP_KIND: &str = "kind";

/// 드라이버 구현 레이블 키 (terraform, memory)
pub const LABEL_DRIVER: &str = "driver";

// ─── 케이스 메트릭 ──────────────────────────────────────────────────

/// 완료된 케이스 수 (counter, label: result)
pub const CASES_TOTAL: &str = "tfacc_cases_total";

/// 케이스 소요 시간 (histogram, 초)
pub const CASE_DURATION_SECONDS: &str = "tfacc_case_duration_seconds";

/// 실행 중인 케이스 수 (gauge)
pub const CASES_RUNNING: &str = "tfacc_cases_running";

// ─── 스텝 메트릭 ────────────────────────────────────────────────────

/// 실행된 스텝 수 (counter, labels: kind, result)
pub const STEPS_TOTAL: &str = "tfacc_steps_total";

/// 스텝 소요 시간 (histogram, 초, label: kind)
pub const STEP_DURATION_SECONDS: &str = "tfacc_step_duration_seconds";

// ─── 드라이버 메트릭 ────────────────────────────────────────────────

/// 드라이버 호출 수 (counter, labels: operation, result)
pub const DRIVER_OPERATIONS_TOTAL: &str = "tfacc_driver_operations_total";

/// 드라이버 타임아웃 수 (counter, label: operation)
pub const DRIVER_TIMEOUTS_TOTAL: &str = "tfacc_driver_timeouts_total";

/// 드라이버 호출 소요 시간 (histogram, 초, label: operation)
pub const DRIVER_OPERATION_DURATION_SECONDS: &str = "tfacc_driver_operation_duration_seconds";

// ─── 검증 / 정리 메트릭 ─────────────────────────────────────────────

/// 평가된 속성 체크 수 (counter, label: result)
pub const CHECKS_TOTAL: &str = "tfacc_checks_total";

/// 정리(destroy) 에러 수 (counter)
pub const CLEANUP_ERRORS_TOTAL: &str = "tfacc_cleanup_errors_total";

/// destroy 이후에도 남아 있는 리소스 수 (counter)
pub const DANGLING_RESOURCES_TOTAL: &str = "tfacc_dangling_resources_total";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 드라이버/스텝 소요 시간 히스토그램 버킷 (초)
///
/// 10ms ~ 1h 범위 (실제 클라우드 apply는 수십 분까지 걸림)
pub const LIFECYCLE_DURATION_BUCKETS: [f64; 10] = [
    0.01, 0.1, 1.0, 10.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 레코더를 설치한 쪽에서 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(CASES_TOTAL, "Total number of test cases finished, by result");
    describe_histogram!(
        CASE_DURATION_SECONDS,
        "Wall-clock time of a single test case in seconds"
    );
    describe_gauge!(CASES_RUNNING, "Number of test cases currently running");

    describe_counter!(STEPS_TOTAL, "Total number of steps executed, by kind and result");
    describe_histogram!(
        STEP_DURATION_SECONDS,
        "Time to execute a single step in seconds"
    );

    describe_counter!(
        DRIVER_OPERATIONS_TOTAL,
        "Total number of lifecycle driver operations, by operation and result"
    );
    describe_counter!(
        DRIVER_TIMEOUTS_TOTAL,
        "Total number of lifecycle driver operations that timed out"
    );
    describe_histogram!(
        DRIVER_OPERATION_DURATION_SECONDS,
        "Time spent in a lifecycle driver operation in seconds"
    );

    describe_counter!(CHECKS_TOTAL, "Total number of attribute checks evaluated");
    describe_counter!(
        CLEANUP_ERRORS_TOTAL,
        "Total number of errors raised while tearing down test resources"
    );
    describe_counter!(
        DANGLING_RESOURCES_TOTAL,
        "Total number of resources still present after destroy"
    );
}
