//! In-Memory Service Availability Cache

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::application::ports::HealthStatus;

/// 服务可达性（三态）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAvailability {
    /// 尚未探测
    Unknown,
    Available,
    Unavailable,
}

impl ServiceAvailability {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAvailability::Unknown => "unknown",
            ServiceAvailability::Available => "available",
            ServiceAvailability::Unavailable => "unavailable",
        }
    }
}

/// 可达性缓存
///
/// 第一次探测的结果在缓存生命周期内视为永久事实，不过期、不自动重新探测。
/// 探测期间持有锁，并发的首次调用只会触发一次探测。
/// 由网关实例持有，可通过 `Arc` 注入，测试中可以 `reset`。
pub struct AvailabilityCache {
    status: Mutex<Option<HealthStatus>>,
}

impl AvailabilityCache {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(None),
        }
    }

    /// 以已知状态创建（跳过探测）
    pub fn with_status(status: HealthStatus) -> Self {
        Self {
            status: Mutex::new(Some(status)),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub async fn current(&self) -> ServiceAvailability {
        match self.status.lock().await.as_ref() {
            None => ServiceAvailability::Unknown,
            Some(s) if s.reachable => ServiceAvailability::Available,
            Some(_) => ServiceAvailability::Unavailable,
        }
    }

    /// 返回缓存的探测结果；尚未探测时执行 `probe` 并记录结果
    pub async fn get_or_probe<F, Fut>(&self, probe: F) -> HealthStatus
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HealthStatus>,
    {
        let mut guard = self.status.lock().await;
        if let Some(status) = guard.as_ref() {
            return status.clone();
        }

        let status = probe().await;
        tracing::info!(
            reachable = status.reachable,
            message = %status.message,
            "Service availability recorded"
        );
        *guard = Some(status.clone());
        status
    }

    /// 清空缓存，下一次调用会重新探测
    pub async fn reset(&self) {
        *self.status.lock().await = None;
        tracing::debug!("Service availability reset");
    }
}

impl Default for AvailabilityCache {
    fn default() -> Self {
        Self::new()
    }
}
