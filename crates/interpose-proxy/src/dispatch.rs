//! Dispatch objects and the two ways of building them
//!
//! A capability-set dispatch object implements the configured interfaces
//! plus the marker capabilities. A subclass dispatch object is a subtype
//! of the target's concrete type, so it also answers the class's own
//! operations; final operations stay with the target.

use crate::config::{ConfigSnapshot, ProxyConfig};
use crate::context::ProxyScope;
use crate::invocation::Invocation;
use crate::target::TargetSource;
use interpose_core::{builtin, same_object, Error, Object, ObjectRef, Operation, Result, TypeBuilder, TypeRef, Value};
use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

static NEXT_PROXY_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStrategy {
    CapabilitySet,
    Subclass,
}

impl fmt::Display for DispatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapabilitySet => f.write_str("capability-set"),
            Self::Subclass => f.write_str("subclass"),
        }
    }
}

pub trait DispatchBuilder: Send + Sync {
    fn strategy(&self) -> DispatchStrategy;

    fn build(&self, config: &Arc<ProxyConfig>) -> Result<Arc<DispatchObject>>;
}

/// Pick the strategy for a configuration.
///
/// `optimize`, `proxy_target_class` or a capability set holding nothing but
/// markers ask for subclass substitution. Interface targets and targets
/// that are already generated types fall back to a capability set.
pub fn select_strategy(snapshot: &ConfigSnapshot) -> Result<DispatchStrategy> {
    let flags = snapshot.flags;
    let only_markers = snapshot.interfaces.iter().all(|i| i.is_marker());
    if !(flags.optimize || flags.proxy_target_class || only_markers) {
        return Ok(DispatchStrategy::CapabilitySet);
    }
    let target_type = snapshot.target_source.target_type().ok_or_else(|| Error::MissingTargetClass {
        proxy: snapshot.describe(),
    })?;
    if target_type.is_interface() || target_type.is_generated() {
        Ok(DispatchStrategy::CapabilitySet)
    } else {
        Ok(DispatchStrategy::Subclass)
    }
}

/// Build a dispatch object for the configuration as it is now.
pub fn create_dispatch_object(config: &Arc<ProxyConfig>) -> Result<Arc<DispatchObject>> {
    let snapshot = config.snapshot();
    if snapshot.advisors.is_empty() && snapshot.target_source.is_empty() {
        return Err(Error::NoTargetOrAdvisors);
    }
    let builder: &dyn DispatchBuilder = match select_strategy(&snapshot)? {
        DispatchStrategy::CapabilitySet => &CapabilitySetBuilder,
        DispatchStrategy::Subclass => &SubclassBuilder,
    };
    let object = builder.build(config)?;
    config.activate();
    debug!(
        strategy = %object.strategy,
        proxy_type = %object.proxy_type.name(),
        advisors = snapshot.advisors.len(),
        "Dispatch object created"
    );
    Ok(object)
}

fn marker_interfaces(opaque: bool) -> Vec<TypeRef> {
    let mut markers = vec![builtin::aop_proxy()];
    if !opaque {
        markers.push(builtin::advised());
    }
    markers.push(builtin::decorating_proxy());
    markers
}

pub struct CapabilitySetBuilder;

impl DispatchBuilder for CapabilitySetBuilder {
    fn strategy(&self) -> DispatchStrategy {
        DispatchStrategy::CapabilitySet
    }

    fn build(&self, config: &Arc<ProxyConfig>) -> Result<Arc<DispatchObject>> {
        let snapshot = config.snapshot();
        let target_type = snapshot.target_source.target_type();

        let mut interfaces = snapshot.interfaces.clone();
        if let Some(ty) = target_type.as_ref().filter(|t| t.is_interface()) {
            if !interfaces.iter().any(|i| i.name() == ty.name()) {
                interfaces.insert(0, ty.clone());
            }
        }
        for marker in marker_interfaces(snapshot.flags.opaque) {
            if !interfaces.iter().any(|i| i.name() == marker.name()) {
                interfaces.push(marker);
            }
        }

        let id = NEXT_PROXY_ID.fetch_add(1, Ordering::Relaxed);
        let mut builder = TypeBuilder::class(format!("$Proxy{}", id))
            .final_type()
            .generated(target_type.as_ref());
        for iface in &interfaces {
            builder = builder.implements(iface);
        }
        Ok(DispatchObject::new(config, builder.build(), DispatchStrategy::CapabilitySet, &snapshot))
    }
}

pub struct SubclassBuilder;

impl DispatchBuilder for SubclassBuilder {
    fn strategy(&self) -> DispatchStrategy {
        DispatchStrategy::Subclass
    }

    fn build(&self, config: &Arc<ProxyConfig>) -> Result<Arc<DispatchObject>> {
        let snapshot = config.snapshot();
        let target_type = snapshot.target_source.target_type().ok_or_else(|| Error::MissingTargetClass {
            proxy: snapshot.describe(),
        })?;
        if target_type.is_final() {
            return Err(Error::FinalClass {
                type_name: target_type.name().to_string(),
            });
        }
        let finals: Vec<String> = target_type
            .all_operations()
            .iter()
            .filter(|op| op.is_final())
            .map(|op| op.name().to_string())
            .collect();
        if !finals.is_empty() {
            warn!(
                target_type = %target_type.name(),
                operations = %finals.join(", "),
                "Final operations cannot be advised and go straight to the target"
            );
        }

        let id = NEXT_PROXY_ID.fetch_add(1, Ordering::Relaxed);
        let mut builder = TypeBuilder::class(format!("{}$$Interposed{}", target_type.name(), id))
            .extends(&target_type)
            .generated(Some(&target_type));
        for iface in snapshot.interfaces.iter().chain(marker_interfaces(snapshot.flags.opaque).iter()) {
            if !iface.is_assignable_from(&target_type) {
                builder = builder.implements(iface);
            }
        }
        Ok(DispatchObject::new(config, builder.build(), DispatchStrategy::Subclass, &snapshot))
    }
}

// ============================================================================
// Dispatch object
// ============================================================================

/// The generated substitute that routes calls through the chain.
pub struct DispatchObject {
    config: Arc<ProxyConfig>,
    proxy_type: TypeRef,
    strategy: DispatchStrategy,
    operations: HashMap<String, Arc<Operation>>,
    target_defines_equals: bool,
    target_defines_hash: bool,
    target_defines_decorated_type: bool,
}

impl DispatchObject {
    fn new(
        config: &Arc<ProxyConfig>,
        proxy_type: TypeRef,
        strategy: DispatchStrategy,
        snapshot: &ConfigSnapshot,
    ) -> Arc<Self> {
        let mut operations = HashMap::new();
        for op in proxy_type.all_operations() {
            operations.entry(op.signature()).or_insert(op);
        }
        let target_type = snapshot.target_source.target_type();
        let defines = |name: &str| target_type.as_ref().is_some_and(|t| t.defines_operation(name));
        Arc::new(Self {
            config: config.clone(),
            strategy,
            operations,
            target_defines_equals: defines(builtin::EQUALS),
            target_defines_hash: defines(builtin::HASH_CODE),
            target_defines_decorated_type: defines(builtin::DECORATED_TYPE),
            proxy_type,
        })
    }

    pub fn strategy(&self) -> DispatchStrategy {
        self.strategy
    }

    pub fn proxy_type(&self) -> &TypeRef {
        &self.proxy_type
    }

    /// The configuration, unless the dispatch object is opaque.
    pub fn config(&self) -> Option<&Arc<ProxyConfig>> {
        (!self.config.flags().opaque).then_some(&self.config)
    }

    /// Same configuration, or the same interfaces, advisors and target.
    pub fn equivalent(&self, other: &DispatchObject) -> bool {
        if Arc::ptr_eq(&self.config, &other.config) {
            return true;
        }
        let a = self.config.snapshot();
        let b = other.config.snapshot();
        let same_interfaces = a.interfaces.len() == b.interfaces.len()
            && a.interfaces.iter().zip(&b.interfaces).all(|(x, y)| x.name() == y.name());
        let same_advisors = a.advisors.len() == b.advisors.len()
            && a.advisors.iter().zip(&b.advisors).all(|(x, y)| Arc::ptr_eq(x, y));
        same_interfaces && same_advisors && a.target_source.identity() == b.target_source.identity()
    }

    fn hash_value(&self) -> i64 {
        let mut hasher = DefaultHasher::new();
        "DispatchObject".hash(&mut hasher);
        self.config.snapshot().target_source.identity().hash(&mut hasher);
        hasher.finish() as i64
    }

    fn decorated_type_name(snapshot: &ConfigSnapshot) -> Value {
        match snapshot.target_source.target_type() {
            Some(mut ty) => {
                while let Some(original) = ty.substituted_from().cloned() {
                    ty = original;
                }
                Value::str(ty.name())
            }
            None => Value::Null,
        }
    }

    fn answer_advised(&self, op: &Operation, snapshot: &ConfigSnapshot) -> Result<Value> {
        let value = match op.name() {
            "is_frozen" => Value::Bool(snapshot.flags.frozen),
            "is_proxy_target_class" => Value::Bool(snapshot.flags.proxy_target_class),
            "is_expose_proxy" => Value::Bool(snapshot.flags.expose_proxy),
            "advisor_count" => Value::Int(snapshot.advisors.len() as i64),
            "proxied_interfaces" => {
                Value::List(snapshot.interfaces.iter().map(|i| Value::str(i.name())).collect())
            }
            "target_type_name" => snapshot
                .target_source
                .target_type()
                .map_or(Value::Null, |t| Value::str(t.name())),
            "describe" => Value::str(snapshot.describe()),
            other => return Err(Error::no_such_operation(other, self.proxy_type.name())),
        };
        Ok(value)
    }

    /// Hand out the dispatch object in place of a target returning itself.
    fn massage_result(&self, result: Value, op: &Operation, target: Option<&ObjectRef>, this: &ObjectRef) -> Result<Value> {
        if let (Value::Object(returned), Some(target)) = (&result, target) {
            if same_object(returned, target) && !self.is_raw_access(op) {
                let compatible = op
                    .return_type()
                    .map_or(true, |rt| rt.is_assignable_from(&self.proxy_type));
                if compatible {
                    trace!(operation = %op.qualified_name(), "Substituting dispatch object for returned target");
                    return Ok(Value::Object(this.clone()));
                }
            }
        }
        if result.is_absent() && op.returns_primitive() {
            return Err(Error::NullReturn {
                operation: op.qualified_name(),
            });
        }
        Ok(result)
    }

    fn is_raw_access(&self, op: &Operation) -> bool {
        self.proxy_type
            .find_supertype(op.declaring_type())
            .is_some_and(|decl| builtin::raw_target_access().is_assignable_from(&decl))
    }
}

/// Lends a target for one call and gives it back however the call ends.
struct TargetLease {
    source: Arc<dyn TargetSource>,
    target: Option<ObjectRef>,
}

impl TargetLease {
    fn acquire(source: Arc<dyn TargetSource>) -> Result<Self> {
        let target = source.get_target()?;
        Ok(Self { source, target })
    }
}

impl Drop for TargetLease {
    fn drop(&mut self) {
        if self.source.is_static() {
            return;
        }
        if let Some(target) = self.target.take() {
            if let Err(e) = self.source.release_target(target) {
                warn!(error = %e, "Failed to release target");
            }
        }
    }
}

impl Object for DispatchObject {
    fn type_ref(&self) -> TypeRef {
        self.proxy_type.clone()
    }

    fn invoke(self: Arc<Self>, operation: &Operation, args: Vec<Value>) -> Result<Value> {
        let snapshot = self.config.snapshot();
        let this: ObjectRef = self.clone();

        if operation.name() == builtin::EQUALS && args.len() == 1 && !self.target_defines_equals {
            let equal = match &args[0] {
                Value::Object(other) => {
                    same_object(other, &this)
                        || other
                            .as_any()
                            .downcast_ref::<DispatchObject>()
                            .is_some_and(|o| self.equivalent(o))
                }
                _ => false,
            };
            return Ok(Value::Bool(equal));
        }
        if operation.name() == builtin::HASH_CODE && args.is_empty() && !self.target_defines_hash {
            return Ok(Value::Int(self.hash_value()));
        }
        if operation.name() == builtin::DECORATED_TYPE && args.is_empty() && !self.target_defines_decorated_type {
            return Ok(Self::decorated_type_name(&snapshot));
        }

        let op = match self.operations.get(&operation.signature()) {
            Some(op) => op.clone(),
            None if snapshot.flags.opaque && operation.declaring_type() == builtin::ADVISED => {
                // Hidden configuration: the target answers, if it can
                let lease = TargetLease::acquire(snapshot.target_source.clone())?;
                return match &lease.target {
                    Some(target) => target.clone().invoke(operation, args),
                    None => Err(Error::no_such_operation(operation.name(), self.proxy_type.name())),
                };
            }
            None => return Err(Error::no_such_operation(operation.name(), self.proxy_type.name())),
        };
        if op.declaring_type() == builtin::ADVISED {
            return self.answer_advised(&op, &snapshot);
        }

        let _scope = snapshot.flags.expose_proxy.then(|| ProxyScope::enter(this.clone()));

        let target_type = snapshot
            .target_source
            .target_type()
            .unwrap_or_else(|| self.proxy_type.clone());
        let chain = if self.strategy == DispatchStrategy::Subclass && op.is_final() {
            None
        } else {
            Some(self.config.chain_for(&op, &target_type))
        };

        let lease = TargetLease::acquire(snapshot.target_source.clone())?;
        let target = lease.target.clone();
        let result = match chain.filter(|c| !c.is_empty()) {
            Some(chain) => {
                trace!(operation = %op.qualified_name(), steps = chain.len(), "Dispatching through chain");
                Invocation::new(this.clone(), target.clone(), op.clone(), args, target_type, chain).run()?
            }
            None => match &target {
                Some(target) => target.clone().invoke(&op, args)?,
                None => {
                    return Err(Error::illegal_state(format!(
                        "no target for {} and no advice to answer it",
                        op.qualified_name()
                    )))
                }
            },
        };
        self.massage_result(result, &op, target.as_ref(), &this)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for DispatchObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchObject")
            .field("type", &self.proxy_type.name())
            .field("strategy", &self.strategy)
            .finish()
    }
}
