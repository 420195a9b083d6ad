//! The join point seen by interceptors

use interpose_core::{ObjectRef, Operation, Result, TypeRef, Value};
use interpose_pointcut::Bindings;
use std::fmt;
use std::sync::Arc;

/// A call in progress, as seen by the interceptor currently running.
///
/// `proceed` runs the rest of the chain and finally the target operation.
/// It may be called more than once; each call re-runs everything
/// downstream of the current interceptor.
pub trait MethodInvocation {
    fn operation(&self) -> &Arc<Operation>;

    fn arguments(&self) -> &[Value];

    /// Arguments passed downstream by the next `proceed`.
    fn arguments_mut(&mut self) -> &mut Vec<Value>;

    /// The dispatch object the call entered through.
    fn this(&self) -> &ObjectRef;

    /// The target, once acquired. Absent for target-less configurations.
    fn target(&self) -> Option<&ObjectRef>;

    fn target_type(&self) -> &TypeRef;

    fn proceed(&mut self) -> Result<Value>;

    /// Values bound by the pointcut with the given expression for this call.
    fn bindings(&self, expression: &str) -> Option<&Bindings>;

    fn static_part(&self) -> JoinPointStaticPart {
        JoinPointStaticPart {
            operation: self.operation().clone(),
            target_type: self.target_type().clone(),
        }
    }
}

/// The part of a join point that does not change between calls.
#[derive(Clone, Debug)]
pub struct JoinPointStaticPart {
    pub operation: Arc<Operation>,
    pub target_type: TypeRef,
}

impl JoinPointStaticPart {
    /// `Type.operation(params)`
    pub fn signature(&self) -> String {
        format!("{}.{}", self.target_type.name(), self.operation.signature())
    }
}

impl fmt::Display for JoinPointStaticPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "execution({})", self.signature())
    }
}
