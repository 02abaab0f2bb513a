//! Memory Layer - In-Memory State Management
//!
//! 进程内的服务可达性缓存

mod availability;

pub use availability::{AvailabilityCache, ServiceAvailability};
