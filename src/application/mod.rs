//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（WatermarkService）
//! - operation: 操作控制器及其可观察状态

pub mod operation;
pub mod ports;

pub use operation::{
    render_failure, ConcurrencyPolicy, OperationController, OperationPhase, OperationState,
};

pub use ports::{GatewayError, HealthReport, HealthStatus, WatermarkServicePort};
