//! Operation Controller - 单个操作的异步生命周期
//!
//! 把一次网关调用包装成 idle → pending → settled 的可观察状态，供展示层读取。

mod controller;
mod messages;
mod state;

pub use controller::OperationController;
pub use messages::{
    render_failure, CONNECTION_MESSAGE, TIMEOUT_MESSAGE, UNAVAILABLE_MESSAGE, VALIDATION_MESSAGE,
};
pub use state::{ConcurrencyPolicy, OperationPhase, OperationState};
