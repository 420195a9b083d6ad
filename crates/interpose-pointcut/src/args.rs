//! Runtime pointcut over call arguments
//!
//! Statically an `ArgsPointcut` only checks the operation name and that the
//! declared parameters could hold the requested types. At call time it
//! checks the actual argument values and binds them to names.

use crate::filter::{ClassFilter, TrueClassFilter};
use crate::glob::Glob;
use crate::matcher::OperationMatcher;
use crate::pointcut::{Bindings, Pointcut};
use interpose_core::{Operation, Result, TypeDescriptor, TypeRef, Value};
use std::sync::Arc;

type Guard = dyn Fn(&[Value]) -> bool + Send + Sync;

/// A name bound to the argument at `position`, optionally type-constrained.
#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub name: String,
    pub position: usize,
    pub ty: Option<TypeRef>,
}

#[derive(Clone)]
pub struct ArgsPointcut {
    operations: Glob,
    specs: Vec<ArgSpec>,
    guard: Option<Arc<Guard>>,
    class_filter: Arc<dyn ClassFilter>,
}

impl ArgsPointcut {
    /// Calls of operations whose name matches `operation_pattern`.
    pub fn new(operation_pattern: &str) -> Self {
        Self {
            operations: Glob::new(operation_pattern),
            specs: Vec::new(),
            guard: None,
            class_filter: TrueClassFilter::shared(),
        }
    }

    pub fn arg(mut self, name: impl Into<String>, position: usize) -> Self {
        self.specs.push(ArgSpec {
            name: name.into(),
            position,
            ty: None,
        });
        self
    }

    pub fn arg_typed(mut self, name: impl Into<String>, position: usize, ty: &TypeRef) -> Self {
        self.specs.push(ArgSpec {
            name: name.into(),
            position,
            ty: Some(ty.clone()),
        });
        self
    }

    /// Extra runtime condition on the argument values.
    pub fn guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&[Value]) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    pub fn within(mut self, filter: Arc<dyn ClassFilter>) -> Self {
        self.class_filter = filter;
        self
    }

    pub fn specs(&self) -> &[ArgSpec] {
        &self.specs
    }

    fn args_match(&self, args: &[Value]) -> bool {
        let positions_ok = self.specs.iter().all(|spec| match args.get(spec.position) {
            Some(value) => spec.ty.as_ref().map_or(true, |ty| ty.accepts(value)),
            None => false,
        });
        positions_ok && self.guard.as_ref().map_or(true, |g| g(args))
    }
}

impl OperationMatcher for ArgsPointcut {
    fn matches(&self, op: &Operation, _target: &TypeDescriptor) -> bool {
        if !self.operations.matches(op.name()) {
            return false;
        }
        let params = op.params();
        self.specs.iter().all(|spec| match params.get(spec.position) {
            // A declared parameter can carry the value if the types are
            // related in either direction
            Some(param) => spec
                .ty
                .as_ref()
                .map_or(true, |ty| ty.is_assignable_from(param) || param.is_assignable_from(ty)),
            None => false,
        })
    }

    fn is_runtime(&self) -> bool {
        true
    }

    fn matches_runtime(&self, _op: &Operation, _target: &TypeDescriptor, args: &[Value]) -> Result<bool> {
        Ok(self.args_match(args))
    }

    fn describe(&self) -> String {
        let specs: Vec<String> = self
            .specs
            .iter()
            .map(|s| match &s.ty {
                Some(ty) => format!("{}: {}", s.name, ty.name()),
                None => s.name.clone(),
            })
            .collect();
        format!("execution({}) && args({})", self.operations, specs.join(", "))
    }
}

impl Pointcut for ArgsPointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        self.class_filter.as_ref()
    }

    fn operation_matcher(&self) -> &dyn OperationMatcher {
        self
    }

    fn expression(&self) -> String {
        self.describe()
    }

    fn binding_names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    fn bind(&self, _op: &Operation, _target: &TypeDescriptor, args: &[Value]) -> Bindings {
        self.specs
            .iter()
            .filter_map(|spec| args.get(spec.position).map(|v| (spec.name.clone(), v.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointcut::Pointcuts;
    use interpose_core::{builtin, TypeBuilder};

    fn transfers() -> TypeRef {
        TypeBuilder::class("Transfers")
            .operation(
                Operation::new("transfer")
                    .param(&builtin::string())
                    .param(&builtin::int()),
            )
            .operation(Operation::new("ping"))
            .build()
    }

    #[test]
    fn static_check_uses_declared_parameters() {
        let ty = transfers();
        let pc = ArgsPointcut::new("transfer").arg_typed("amount", 1, &builtin::int());
        assert!(pc.matches(&ty.find_operation("transfer").unwrap(), &ty));
        assert!(!pc.matches(&ty.find_operation("ping").unwrap(), &ty));

        let wrong_type = ArgsPointcut::new("transfer").arg_typed("amount", 1, &builtin::string());
        assert!(!wrong_type.matches(&ty.find_operation("transfer").unwrap(), &ty));
    }

    #[test]
    fn runtime_check_and_binding() {
        let ty = transfers();
        let op = ty.find_operation("transfer").unwrap();
        let pc = ArgsPointcut::new("transfer")
            .arg("account", 0)
            .arg_typed("amount", 1, &builtin::int())
            .guard(|args| args.get(1).and_then(Value::as_int).is_some_and(|a| a > 100));

        let args = [Value::str("acc-1"), Value::Int(500)];
        assert!(Pointcuts::matches(&pc, &op, &ty, &args).unwrap());
        let bound = pc.bind(&op, &ty, &args);
        assert_eq!(bound.get("account"), Some(&Value::str("acc-1")));
        assert_eq!(bound.get("amount"), Some(&Value::Int(500)));

        assert!(!Pointcuts::matches(&pc, &op, &ty, &[Value::str("acc-1"), Value::Int(5)]).unwrap());
    }

    #[test]
    fn expression_lists_bound_names() {
        let pc = ArgsPointcut::new("transfer*").arg("account", 0).arg_typed("amount", 1, &builtin::int());
        assert_eq!(pc.expression(), "execution(transfer*) && args(account, amount: int)");
        assert_eq!(pc.binding_names(), vec!["account", "amount"]);
    }
}
