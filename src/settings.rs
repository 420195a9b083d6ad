//! Interpose settings
//!
//! Proxy flags and the stock interceptors, loaded from TOML. Missing or
//! unreadable files fall back to defaults.

use interpose_advice::{Advice, Advisor, PerformanceMonitorInterceptor, TraceInterceptor};
use interpose_proxy::{ProxyFactory, ProxyFlags};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Flags copied onto every configuration the settings are applied to.
    pub proxy: ProxyFlags,
    pub trace: TraceSettings,
    pub monitor: MonitorSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceSettings {
    /// Install a tracing interceptor ahead of other advice.
    pub enabled: bool,
    /// Log call arguments as JSON.
    pub include_arguments: bool,
    /// Log return values as JSON.
    pub include_result: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Install a performance monitor ahead of other advice.
    pub enabled: bool,
    /// Calls slower than this are logged as warnings.
    pub slow_threshold_ms: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            slow_threshold_ms: 500,
        }
    }
}

impl Settings {
    /// Default settings file name, looked up in the working directory.
    pub const FILE_NAME: &'static str = "interpose.toml";

    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => {
                    tracing::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}; using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No settings at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Install the enabled interceptors, then copy the flags.
    ///
    /// Interceptors go first so a `frozen` flag does not lock them out.
    pub fn apply(&self, factory: &ProxyFactory) -> interpose_core::Result<()> {
        if self.trace.enabled {
            let trace = TraceInterceptor::new()
                .include_arguments(self.trace.include_arguments)
                .include_result(self.trace.include_result);
            factory
                .config()
                .add_advisor_at(0, Advisor::for_advice(Advice::interceptor(Arc::new(trace))))?;
        }
        if self.monitor.enabled {
            let monitor = PerformanceMonitorInterceptor::new(Duration::from_millis(self.monitor.slow_threshold_ms));
            let pos = usize::from(self.trace.enabled);
            factory
                .config()
                .add_advisor_at(pos, Advisor::for_advice(Advice::interceptor(Arc::new(monitor))))?;
        }
        factory.set_flags(self.proxy)
    }

    /// One line per effective setting, for the launcher's startup log.
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "proxy: proxy_target_class={} expose_proxy={} frozen={} optimize={} opaque={}",
            self.proxy.proxy_target_class, self.proxy.expose_proxy, self.proxy.frozen, self.proxy.optimize, self.proxy.opaque
        )];
        if self.trace.enabled {
            lines.push(format!(
                "trace: arguments={} result={}",
                self.trace.include_arguments, self.trace.include_result
            ));
        }
        if self.monitor.enabled {
            lines.push(format!("monitor: slow_threshold_ms={}", self.monitor.slow_threshold_ms));
        }
        lines
    }
}
