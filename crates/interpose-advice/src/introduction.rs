//! Introduction by delegation
//!
//! Operations of the introduced interfaces are answered by a delegate
//! object; everything else proceeds down the chain.

use crate::advice::Interceptor;
use crate::invocation::MethodInvocation;
use interpose_core::{builtin, same_object, ObjectRef, Result, TypeRef, Value};
use tracing::trace;

pub struct DelegatingIntroduction {
    delegate: ObjectRef,
    interfaces: Vec<TypeRef>,
}

impl DelegatingIntroduction {
    /// Introduce every interface the delegate implements.
    pub fn new(delegate: ObjectRef) -> Self {
        let interfaces = delegate
            .type_ref()
            .all_interfaces()
            .into_iter()
            .filter(|i| !builtin::is_proxy_marker(i.name()))
            .collect();
        Self { delegate, interfaces }
    }

    /// Introduce only the given interfaces.
    pub fn with_interfaces(delegate: ObjectRef, interfaces: Vec<TypeRef>) -> Self {
        Self { delegate, interfaces }
    }

    pub fn interfaces(&self) -> &[TypeRef] {
        &self.interfaces
    }

    pub fn delegate(&self) -> &ObjectRef {
        &self.delegate
    }

    fn is_introduced(&self, declaring_type: &str) -> bool {
        self.interfaces
            .iter()
            .any(|i| i.find_supertype(declaring_type).is_some())
    }
}

impl Interceptor for DelegatingIntroduction {
    fn invoke(&self, inv: &mut dyn MethodInvocation) -> Result<Value> {
        if !self.is_introduced(inv.operation().declaring_type()) {
            return inv.proceed();
        }
        trace!(operation = %inv.operation().qualified_name(), "Answering introduced operation from delegate");
        let op = inv.operation().clone();
        let result = self.delegate.clone().invoke(&op, inv.arguments().to_vec())?;
        // A delegate returning itself hands out the dispatch object instead
        match &result {
            Value::Object(obj) if same_object(obj, &self.delegate) => Ok(Value::Object(inv.this().clone())),
            _ => Ok(result),
        }
    }

    fn describe(&self) -> String {
        let names: Vec<&str> = self.interfaces.iter().map(|i| i.name()).collect();
        format!("introduction({})", names.join(", "))
    }
}
