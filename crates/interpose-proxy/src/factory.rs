//! Programmatic proxy construction

use crate::config::{ConfigListener, ProxyConfig, ProxyFlags};
use crate::dispatch::{create_dispatch_object, DispatchObject};
use crate::resolver::AdvisorRegistry;
use crate::target::{SingletonTargetSource, TargetSource};
use interpose_advice::{Advice, Advisor};
use interpose_core::{builtin, ObjectRef, Result, TypeRef};
use std::sync::Arc;
use tracing::debug;

/// Builds dispatch objects over a shared configuration.
///
/// Every dispatch object obtained from one factory sees later changes
/// to its configuration.
#[derive(Clone, Default)]
pub struct ProxyFactory {
    config: Arc<ProxyConfig>,
}

impl ProxyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Proxy `target`, exposing every interface its type implements.
    pub fn for_target(target: ObjectRef) -> Self {
        Self::for_target_source(SingletonTargetSource::shared(target))
    }

    pub fn for_target_source(source: Arc<dyn TargetSource>) -> Self {
        let interfaces = source
            .target_type()
            .map(|t| t.all_interfaces())
            .unwrap_or_default();
        let config = ProxyConfig::new(source);
        for iface in interfaces.iter().filter(|i| !builtin::is_proxy_marker(i.name())) {
            // A fresh configuration is never frozen
            let _ = config.add_interface(iface);
        }
        Self {
            config: Arc::new(config),
        }
    }

    /// A target-less proxy for `iface` answered by `advice` alone.
    pub fn for_interface(iface: &TypeRef, advice: Advice) -> Result<Self> {
        let factory = Self::new();
        factory.add_interface(iface)?;
        factory.add_advice(advice)?;
        Ok(factory)
    }

    pub fn config(&self) -> &Arc<ProxyConfig> {
        &self.config
    }

    pub fn set_target(&self, target: ObjectRef) -> Result<()> {
        self.config.set_target_source(SingletonTargetSource::shared(target))
    }

    pub fn set_target_source(&self, source: Arc<dyn TargetSource>) -> Result<()> {
        self.config.set_target_source(source)
    }

    pub fn add_interface(&self, iface: &TypeRef) -> Result<()> {
        self.config.add_interface(iface)
    }

    pub fn add_advice(&self, advice: Advice) -> Result<()> {
        self.config.add_advice(advice)
    }

    pub fn add_advisor(&self, advisor: impl Into<Arc<Advisor>>) -> Result<()> {
        self.config.add_advisor(advisor)
    }

    /// Add the registry's advisors that can apply to the target type, in
    /// chain order. Returns how many were added.
    pub fn add_applicable_advisors(&self, registry: &AdvisorRegistry) -> Result<usize> {
        let advisors = match self.config.target_type() {
            Some(ty) => registry.advisors_for(&ty),
            None => registry.sorted(),
        };
        let count = advisors.len();
        self.config.add_advisors(advisors)?;
        debug!(count, candidates = registry.len(), "Applicable advisors added");
        Ok(count)
    }

    pub fn add_listener(&self, listener: Arc<dyn ConfigListener>) {
        self.config.add_listener(listener);
    }

    pub fn set_flags(&self, flags: ProxyFlags) -> Result<()> {
        self.config.set_flags(flags)
    }

    pub fn set_proxy_target_class(&self, value: bool) -> Result<()> {
        self.config.set_proxy_target_class(value)
    }

    pub fn set_expose_proxy(&self, value: bool) -> Result<()> {
        self.config.set_expose_proxy(value)
    }

    pub fn set_optimize(&self, value: bool) -> Result<()> {
        self.config.set_optimize(value)
    }

    pub fn set_opaque(&self, value: bool) -> Result<()> {
        self.config.set_opaque(value)
    }

    pub fn set_frozen(&self, value: bool) -> Result<()> {
        self.config.set_frozen(value)
    }

    pub fn get_proxy(&self) -> Result<ObjectRef> {
        let object: ObjectRef = self.get_dispatch_object()?;
        Ok(object)
    }

    pub fn get_dispatch_object(&self) -> Result<Arc<DispatchObject>> {
        create_dispatch_object(&self.config)
    }
}
