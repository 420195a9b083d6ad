//! Target sources: where a dispatch object gets the object it wraps
//!
//! A static source hands out the same target on every call and is never
//! asked to take it back. Non-static sources lend a target for the length
//! of one call and get it back through `release_target`.

use interpose_core::{Error, ObjectRef, Result, TypeRef};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

pub trait TargetSource: Send + Sync {
    /// Concrete type of the targets handed out, when known.
    fn target_type(&self) -> Option<TypeRef>;

    fn is_static(&self) -> bool;

    /// Borrow a target for one call. `None` when there is nothing to wrap.
    fn get_target(&self) -> Result<Option<ObjectRef>>;

    fn release_target(&self, _target: ObjectRef) -> Result<()> {
        Ok(())
    }

    /// True only for the source standing in for "no target at all".
    fn is_empty(&self) -> bool {
        false
    }

    /// Two sources with the same identity hand out the same targets.
    fn identity(&self) -> usize {
        self as *const Self as *const () as usize
    }
}

pub type TargetFactory = dyn Fn() -> Result<ObjectRef> + Send + Sync;

// ============================================================================
// Singleton
// ============================================================================

pub struct SingletonTargetSource {
    target: ObjectRef,
}

impl SingletonTargetSource {
    pub fn new(target: ObjectRef) -> Self {
        Self { target }
    }

    pub fn shared(target: ObjectRef) -> Arc<dyn TargetSource> {
        Arc::new(Self::new(target))
    }
}

impl TargetSource for SingletonTargetSource {
    fn target_type(&self) -> Option<TypeRef> {
        Some(self.target.type_ref())
    }

    fn is_static(&self) -> bool {
        true
    }

    fn get_target(&self) -> Result<Option<ObjectRef>> {
        Ok(Some(self.target.clone()))
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.target) as *const () as usize
    }
}

impl fmt::Debug for SingletonTargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SingletonTargetSource({})", self.target.type_ref().name())
    }
}

// ============================================================================
// Empty
// ============================================================================

/// No target. Calls must be answered entirely by interceptors.
#[derive(Default)]
pub struct EmptyTargetSource {
    target_type: Option<TypeRef>,
}

impl EmptyTargetSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty source that still reports a type, so subclass dispatch
    /// can be built for it.
    pub fn of_type(ty: &TypeRef) -> Self {
        Self {
            target_type: Some(ty.clone()),
        }
    }
}

impl TargetSource for EmptyTargetSource {
    fn target_type(&self) -> Option<TypeRef> {
        self.target_type.clone()
    }

    fn is_static(&self) -> bool {
        true
    }

    fn get_target(&self) -> Result<Option<ObjectRef>> {
        Ok(None)
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn identity(&self) -> usize {
        self.target_type
            .as_ref()
            .map_or(0, |t| Arc::as_ptr(t) as *const () as usize)
    }
}

// ============================================================================
// Prototype
// ============================================================================

/// A fresh target for every call, dropped when the call ends.
pub struct PrototypeTargetSource {
    target_type: TypeRef,
    factory: Arc<TargetFactory>,
}

impl PrototypeTargetSource {
    pub fn new<F>(target_type: &TypeRef, factory: F) -> Self
    where
        F: Fn() -> Result<ObjectRef> + Send + Sync + 'static,
    {
        Self {
            target_type: target_type.clone(),
            factory: Arc::new(factory),
        }
    }
}

impl TargetSource for PrototypeTargetSource {
    fn target_type(&self) -> Option<TypeRef> {
        Some(self.target_type.clone())
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> Result<Option<ObjectRef>> {
        (self.factory)().map(Some)
    }

    fn release_target(&self, _target: ObjectRef) -> Result<()> {
        debug!(target_type = %self.target_type.name(), "Prototype target released");
        Ok(())
    }
}

// ============================================================================
// Pooled
// ============================================================================

struct PoolState {
    idle: Vec<ObjectRef>,
    active: usize,
}

/// A bounded pool. Borrowing from an exhausted pool fails rather than waits.
pub struct PooledTargetSource {
    target_type: TypeRef,
    factory: Arc<TargetFactory>,
    max_size: usize,
    state: Mutex<PoolState>,
}

impl PooledTargetSource {
    pub fn new<F>(target_type: &TypeRef, max_size: usize, factory: F) -> Self
    where
        F: Fn() -> Result<ObjectRef> + Send + Sync + 'static,
    {
        Self {
            target_type: target_type.clone(),
            factory: Arc::new(factory),
            max_size,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                active: 0,
            }),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().active
    }

    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }
}

impl TargetSource for PooledTargetSource {
    fn target_type(&self) -> Option<TypeRef> {
        Some(self.target_type.clone())
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> Result<Option<ObjectRef>> {
        let mut state = self.state.lock();
        if let Some(target) = state.idle.pop() {
            state.active += 1;
            return Ok(Some(target));
        }
        if state.active >= self.max_size {
            return Err(Error::illegal_state(format!(
                "target pool for {} exhausted ({} active)",
                self.target_type.name(),
                state.active
            )));
        }
        let target = (self.factory)()?;
        state.active += 1;
        debug!(target_type = %self.target_type.name(), active = state.active, "Pooled target created");
        Ok(Some(target))
    }

    fn release_target(&self, target: ObjectRef) -> Result<()> {
        let mut state = self.state.lock();
        if state.active == 0 {
            return Err(Error::illegal_state(format!(
                "target returned to pool for {} with no active borrow",
                self.target_type.name()
            )));
        }
        state.active -= 1;
        state.idle.push(target);
        Ok(())
    }
}

// ============================================================================
// Hot-swappable
// ============================================================================

/// A target that can be replaced while dispatch objects are live.
pub struct HotSwappableTargetSource {
    target: RwLock<ObjectRef>,
}

impl HotSwappableTargetSource {
    pub fn new(target: ObjectRef) -> Self {
        Self {
            target: RwLock::new(target),
        }
    }

    /// Replace the target, returning the previous one.
    pub fn swap(&self, target: ObjectRef) -> ObjectRef {
        let old = std::mem::replace(&mut *self.target.write(), target);
        info!(
            old = %old.type_ref().name(),
            new = %self.target.read().type_ref().name(),
            "Target swapped"
        );
        old
    }
}

impl TargetSource for HotSwappableTargetSource {
    fn target_type(&self) -> Option<TypeRef> {
        Some(self.target.read().type_ref())
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> Result<Option<ObjectRef>> {
        Ok(Some(self.target.read().clone()))
    }
}
