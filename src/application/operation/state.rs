//! Operation State

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{OperationKind, OperationResult};

/// 操作阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationPhase {
    Idle,
    Pending,
    SettledOk,
    SettledError,
}

impl OperationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationPhase::Idle => "idle",
            OperationPhase::Pending => "pending",
            OperationPhase::SettledOk => "settled_ok",
            OperationPhase::SettledError => "settled_error",
        }
    }
}

/// 同一控制器上并发调用 `run` 时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// 不加保护，最后完成的操作写入最终状态
    #[default]
    LastWriterWins,
    /// 已有操作进行中时拒绝新的调用
    RejectWhilePending,
}

/// 控制器对外暴露的状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationState {
    pub phase: OperationPhase,
    pub last_result: Option<OperationResult>,
    pub last_error: Option<String>,
    /// 快照所属的操作
    pub operation_id: Option<Uuid>,
    pub kind: Option<OperationKind>,
    pub started_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl OperationState {
    pub fn idle() -> Self {
        Self {
            phase: OperationPhase::Idle,
            last_result: None,
            last_error: None,
            operation_id: None,
            kind: None,
            started_at: None,
            settled_at: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.phase == OperationPhase::Pending
    }
}

impl Default for OperationState {
    fn default() -> Self {
        Self::idle()
    }
}
