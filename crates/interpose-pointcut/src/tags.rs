//! Pointcut selecting by tags on operations or types

use crate::filter::{ClassFilter, TrueClassFilter};
use crate::matcher::{OperationMatcher, TrueMatcher};
use crate::pointcut::Pointcut;
use interpose_core::{Operation, TypeDescriptor};

/// Type tag, checked on the type and its supertypes.
struct TypeTag(String);

impl ClassFilter for TypeTag {
    fn matches(&self, ty: &TypeDescriptor) -> bool {
        let ty = ty.substituted_from().map(|t| t.as_ref()).unwrap_or(ty);
        has_type_tag(ty, &self.0)
    }

    fn describe(&self) -> String {
        format!("@within({})", self.0)
    }
}

fn has_type_tag(ty: &TypeDescriptor, tag: &str) -> bool {
    ty.has_tag(tag) || ty.super_type().is_some_and(|p| has_type_tag(p, tag))
}

/// Operation tag, checked on the operation as called and on the target's
/// own declaration of the same signature.
struct OperationTag(String);

impl OperationMatcher for OperationTag {
    fn matches(&self, op: &Operation, target: &TypeDescriptor) -> bool {
        if op.has_tag(&self.0) {
            return true;
        }
        target
            .find_signature(op)
            .is_some_and(|resolved| resolved.has_tag(&self.0))
    }

    fn describe(&self) -> String {
        format!("@annotation({})", self.0)
    }
}

pub struct TagMatchingPointcut {
    class_filter: Box<dyn ClassFilter>,
    matcher: Box<dyn OperationMatcher>,
}

impl TagMatchingPointcut {
    pub fn for_type_tag(tag: impl Into<String>) -> Self {
        Self {
            class_filter: Box::new(TypeTag(tag.into())),
            matcher: Box::new(TrueMatcher),
        }
    }

    pub fn for_operation_tag(tag: impl Into<String>) -> Self {
        Self {
            class_filter: Box::new(TrueClassFilter),
            matcher: Box::new(OperationTag(tag.into())),
        }
    }

    pub fn new(type_tag: impl Into<String>, operation_tag: impl Into<String>) -> Self {
        Self {
            class_filter: Box::new(TypeTag(type_tag.into())),
            matcher: Box::new(OperationTag(operation_tag.into())),
        }
    }
}

impl Pointcut for TagMatchingPointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        self.class_filter.as_ref()
    }

    fn operation_matcher(&self) -> &dyn OperationMatcher {
        self.matcher.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointcut::Pointcuts;
    use interpose_core::TypeBuilder;

    #[test]
    fn operation_tag_matches_tagged_operations() {
        let ty = TypeBuilder::class("Inventory")
            .operation(Operation::new("reserve").tag("transactional"))
            .operation(Operation::new("count"))
            .build();
        let pc = TagMatchingPointcut::for_operation_tag("transactional");
        assert!(Pointcuts::matches(&pc, &ty.find_operation("reserve").unwrap(), &ty, &[]).unwrap());
        assert!(!Pointcuts::matches(&pc, &ty.find_operation("count").unwrap(), &ty, &[]).unwrap());
    }

    #[test]
    fn operation_tag_on_target_override() {
        let api = TypeBuilder::interface("Inventory")
            .operation(Operation::new("reserve"))
            .build();
        let imp = TypeBuilder::class("InventoryImpl")
            .implements(&api)
            .operation(Operation::new("reserve").tag("transactional"))
            .build();
        let declared = api.find_operation("reserve").unwrap();
        let pc = TagMatchingPointcut::for_operation_tag("transactional");
        assert!(pc.operation_matcher().matches(&declared, &imp));
        assert!(!pc.operation_matcher().matches(&declared, &api));
    }

    #[test]
    fn type_tag_is_inherited_by_subclasses() {
        let base = TypeBuilder::class("Base").tag("service").build();
        let derived = TypeBuilder::class("Derived").extends(&base).build();
        let plain = TypeBuilder::class("Plain").build();
        let pc = TagMatchingPointcut::for_type_tag("service");
        assert!(Pointcuts::can_apply(&pc, &derived, false));
        assert!(!Pointcuts::can_apply(&pc, &plain, false));
        assert_eq!(pc.expression(), "@within(service) && true");
    }
}
