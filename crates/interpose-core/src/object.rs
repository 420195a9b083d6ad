//! The object capability implemented by targets, delegates and dispatch objects

use crate::error::{Error, Result};
use crate::types::{Operation, TypeRef};
use crate::value::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// An object that answers operations declared on its type.
///
/// `invoke` takes the receiver by `Arc` so an implementation can hand out a
/// reference to itself as a result.
pub trait Object: Send + Sync + fmt::Debug {
    fn type_ref(&self) -> TypeRef;

    fn invoke(self: Arc<Self>, operation: &Operation, args: Vec<Value>) -> Result<Value>;

    fn as_any(&self) -> &dyn Any;
}

pub type ObjectRef = Arc<dyn Object>;

/// Pointer identity of two object references.
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

type Handler = dyn Fn(&ObjectRef, &[Value]) -> Result<Value> + Send + Sync;

/// An object whose operations are answered by closures keyed by operation name.
///
/// Handlers receive the object itself, so an operation can return its own
/// receiver.
pub struct ClosureObject {
    ty: TypeRef,
    handlers: HashMap<String, Arc<Handler>>,
}

impl ClosureObject {
    pub fn builder(ty: &TypeRef) -> ClosureObjectBuilder {
        ClosureObjectBuilder {
            ty: ty.clone(),
            handlers: HashMap::new(),
        }
    }
}

impl fmt::Debug for ClosureObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ops: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ops.sort_unstable();
        f.debug_struct("ClosureObject")
            .field("type", &self.ty.name())
            .field("operations", &ops)
            .finish()
    }
}

impl Object for ClosureObject {
    fn type_ref(&self) -> TypeRef {
        self.ty.clone()
    }

    fn invoke(self: Arc<Self>, operation: &Operation, args: Vec<Value>) -> Result<Value> {
        let handler = self
            .handlers
            .get(operation.name())
            .cloned()
            .ok_or_else(|| Error::no_such_operation(operation.name(), self.ty.name()))?;
        let this: ObjectRef = self;
        handler(&this, &args)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct ClosureObjectBuilder {
    ty: TypeRef,
    handlers: HashMap<String, Arc<Handler>>,
}

impl ClosureObjectBuilder {
    /// Register the handler for an operation. Replaces an existing one.
    pub fn on<F>(mut self, operation: &str, handler: F) -> Self
    where
        F: Fn(&ObjectRef, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.handlers.insert(operation.to_string(), Arc::new(handler));
        self
    }

    pub fn build(self) -> ObjectRef {
        Arc::new(ClosureObject {
            ty: self.ty,
            handlers: self.handlers,
        })
    }
}
