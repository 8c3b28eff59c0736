//! 라이프사이클 드라이버 추상화
//!
//! [`LifecycleDriver`]는 구성 적용, 제거, import, 존재 확인을 수행하는 비동기 trait입니다.
//! 케이스마다 드라이버 인스턴스 하나를 [`DriverFactory`]로 만듭니다.
//!
//! # 구현체
//! ```text
//!             ┌──────────────┐
//!             │  StageRunner │
//!             └──────┬───────┘
//!                    ▼
//!           ┌──────────────────┐
//!           │ LifecycleDriver  │ (trait)
//!           └──────────────────┘
//!              │            │
//!              ▼            ▼
//!     ┌─────────────────┐ ┌──────────────┐
//!     │ TerraformDriver │ │ MemoryDriver │
//!     └────────┬────────┘ └──────┬───────┘
//!              ▼                 ▼
//!       terraform CLI       MemoryCloud
//! ```

use std::future::Future;
use std::pin::Pin;

use tfacc_core::error::DriverError;
use tfacc_core::types::{ResourceAddress, ResourceState, StateSnapshot};
use tfacc_hcl::RenderedConfig;

/// 동적 디스패치용 Future 타입
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ─── LifecycleDriver Trait ───────────────────────────────────────────

/// 라이프사이클 드라이버
///
/// 한 인스턴스는 한 케이스의 원격 리소스만 추적합니다.
pub trait LifecycleDriver: Send {
    /// 드라이버 이름 (메트릭 라벨)
    fn name(&self) -> &str;

    /// 구성을 적용하고 결과 상태를 반환합니다.
    ///
    /// 같은 구성을 다시 적용해도 원격 객체는 바뀌지 않습니다.
    fn apply(
        &mut self,
        config: &RenderedConfig,
    ) -> impl Future<Output = Result<StateSnapshot, DriverError>> + Send;

    /// 추적 중인 모든 리소스를 제거합니다.
    fn destroy(&mut self) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// 원격 객체를 다시 읽어 상태를 반환합니다.
    ///
    /// 반환 상태는 write-only 속성을 제외하고 추적 상태의 상위집합입니다.
    fn import_and_read(
        &mut self,
        address: &ResourceAddress,
        id: &str,
    ) -> impl Future<Output = Result<ResourceState, DriverError>> + Send;

    /// 원격 객체가 존재하는지 확인합니다.
    fn exists(
        &mut self,
        address: &ResourceAddress,
        id: &str,
    ) -> impl Future<Output = Result<bool, DriverError>> + Send;
}

// ─── DynDriver Trait ─────────────────────────────────────────────────

/// dyn-compatible 드라이버 trait
///
/// `LifecycleDriver`는 RPITIT를 사용하므로 `dyn LifecycleDriver`가 불가합니다.
/// `DynDriver`는 `BoxFuture`를 반환하여 팩토리가 `Box<dyn DynDriver>`를
/// 돌려줄 수 있게 합니다.
pub trait DynDriver: Send {
    /// 드라이버 이름
    fn name(&self) -> &str;

    /// 구성 적용
    fn apply<'a>(
        &'a mut self,
        config: &'a RenderedConfig,
    ) -> BoxFuture<'a, Result<StateSnapshot, DriverError>>;

    /// 제거
    fn destroy(&mut self) -> BoxFuture<'_, Result<(), DriverError>>;

    /// import 후 읽기
    fn import_and_read<'a>(
        &'a mut self,
        address: &'a ResourceAddress,
        id: &'a str,
    ) -> BoxFuture<'a, Result<ResourceState, DriverError>>;

    /// 존재 확인
    fn exists<'a>(
        &'a mut self,
        address: &'a ResourceAddress,
        id: &'a str,
    ) -> BoxFuture<'a, Result<bool, DriverError>>;
}

/// LifecycleDriver를 구현한 타입은 자동으로 DynDriver도 구현됩니다.
impl<T: LifecycleDriver> DynDriver for T {
    fn name(&self) -> &str {
        LifecycleDriver::name(self)
    }

    fn apply<'a>(
        &'a mut self,
        config: &'a RenderedConfig,
    ) -> BoxFuture<'a, Result<StateSnapshot, DriverError>> {
        Box::pin(LifecycleDriver::apply(self, config))
    }

    fn destroy(&mut self) -> BoxFuture<'_, Result<(), DriverError>> {
        Box::pin(LifecycleDriver::destroy(self))
    }

    fn import_and_read<'a>(
        &'a mut self,
        address: &'a ResourceAddress,
        id: &'a str,
    ) -> BoxFuture<'a, Result<ResourceState, DriverError>> {
        Box::pin(LifecycleDriver::import_and_read(self, address, id))
    }

    fn exists<'a>(
        &'a mut self,
        address: &'a ResourceAddress,
        id: &'a str,
    ) -> BoxFuture<'a, Result<bool, DriverError>> {
        Box::pin(LifecycleDriver::exists(self, address, id))
    }
}

// ─── DriverFactory ───────────────────────────────────────────────────

/// 케이스별 드라이버 생성기
pub trait DriverFactory: Send + Sync {
    /// 케이스 하나를 위한 드라이버를 만듭니다.
    fn create(&self, case: &str) -> Result<Box<dyn DynDriver>, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    /// 호출 횟수만 세는 드라이버
    #[derive(Default)]
    struct CountingDriver {
        applies: usize,
        destroys: usize,
    }

    impl LifecycleDriver for CountingDriver {
        fn name(&self) -> &str {
            "counting"
        }

        async fn apply(&mut self, _config: &RenderedConfig) -> Result<StateSnapshot, DriverError> {
            self.applies += 1;
            Ok(StateSnapshot::new())
        }

        async fn destroy(&mut self) -> Result<(), DriverError> {
            self.destroys += 1;
            Ok(())
        }

        async fn import_and_read(
            &mut self,
            address: &ResourceAddress,
            _id: &str,
        ) -> Result<ResourceState, DriverError> {
            Ok(ResourceState::new(address.clone(), Map::new()))
        }

        async fn exists(&mut self, _address: &ResourceAddress, _id: &str) -> Result<bool, DriverError> {
            Ok(false)
        }
    }

    struct CountingFactory;

    impl DriverFactory for CountingFactory {
        fn create(&self, _case: &str) -> Result<Box<dyn DynDriver>, DriverError> {
            Ok(Box::new(CountingDriver::default()))
        }
    }

    fn config() -> RenderedConfig {
        RenderedConfig {
            scenario: "empty".to_owned(),
            text: String::new(),
            document: tfacc_hcl::Document::new(),
        }
    }

    #[tokio::test]
    async fn blanket_impl_dispatches_through_box() {
        let mut driver = CountingFactory.create("case").unwrap();
        assert_eq!(driver.name(), "counting");
        let cfg = config();
        driver.apply(&cfg).await.unwrap();
        driver.apply(&cfg).await.unwrap();
        driver.destroy().await.unwrap();
        let address = ResourceAddress::managed("t", "n");
        assert!(!driver.exists(&address, "id").await.unwrap());
        let state = driver.import_and_read(&address, "id").await.unwrap();
        assert_eq!(state.address, address);
    }
}
