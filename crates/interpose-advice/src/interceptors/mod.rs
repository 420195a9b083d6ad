//! Stock interceptors

mod monitor;
mod trace;

pub use monitor::{OperationStats, PerformanceMonitorInterceptor};
pub use trace::TraceInterceptor;
