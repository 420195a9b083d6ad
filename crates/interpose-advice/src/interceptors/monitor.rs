//! Times intercepted calls and keeps per-operation statistics

use crate::advice::Interceptor;
use crate::invocation::MethodInvocation;
use interpose_core::{Result, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationStats {
    pub calls: u64,
    pub failures: u64,
    pub total: Duration,
    pub max: Duration,
}

pub struct PerformanceMonitorInterceptor {
    slow_threshold: Duration,
    stats: Mutex<HashMap<String, OperationStats>>,
}

impl PerformanceMonitorInterceptor {
    /// Calls taking at least `slow_threshold` are logged as warnings.
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            slow_threshold,
            stats: Mutex::new(HashMap::new()),
        }
    }

    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    /// Statistics for `Type.operation(params)`.
    pub fn stats_for(&self, signature: &str) -> Option<OperationStats> {
        self.stats.lock().get(signature).copied()
    }

    pub fn snapshot(&self) -> HashMap<String, OperationStats> {
        self.stats.lock().clone()
    }

    fn record(&self, signature: &str, elapsed: Duration, failed: bool) {
        let mut stats = self.stats.lock();
        let entry = stats.entry(signature.to_string()).or_default();
        entry.calls += 1;
        entry.total += elapsed;
        entry.max = entry.max.max(elapsed);
        if failed {
            entry.failures += 1;
        }
    }
}

impl Interceptor for PerformanceMonitorInterceptor {
    fn invoke(&self, inv: &mut dyn MethodInvocation) -> Result<Value> {
        let signature = inv.static_part().signature();
        let started = Instant::now();
        let outcome = inv.proceed();
        let elapsed = started.elapsed();
        self.record(&signature, elapsed, outcome.is_err());

        if elapsed >= self.slow_threshold {
            warn!(call = %signature, elapsed_ms = elapsed.as_millis() as u64, "Slow call");
        } else {
            debug!(call = %signature, elapsed_us = elapsed.as_micros() as u64, "Call timed");
        }
        outcome
    }

    fn describe(&self) -> String {
        format!("performance-monitor(>= {}ms)", self.slow_threshold.as_millis())
    }
}
