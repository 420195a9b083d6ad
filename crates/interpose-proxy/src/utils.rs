//! Helpers for code holding an object that may be a dispatch object

use crate::config::ProxyConfig;
use crate::dispatch::{DispatchObject, DispatchStrategy};
use crate::resolver::find_applicable_advisors;
use interpose_advice::Advisor;
use interpose_core::{builtin, ObjectRef, TypeDescriptor, TypeRef};
use interpose_pointcut::Pointcuts;
use std::sync::Arc;

pub struct AopUtils;

impl AopUtils {
    pub fn is_aop_proxy(object: &ObjectRef) -> bool {
        object.type_ref().find_supertype(builtin::AOP_PROXY).is_some()
    }

    pub fn is_capability_set_proxy(object: &ObjectRef) -> bool {
        Self::dispatch_object(object).is_some_and(|d| d.strategy() == DispatchStrategy::CapabilitySet)
    }

    pub fn is_subclass_proxy(object: &ObjectRef) -> bool {
        Self::dispatch_object(object).is_some_and(|d| d.strategy() == DispatchStrategy::Subclass)
    }

    pub fn dispatch_object(object: &ObjectRef) -> Option<&DispatchObject> {
        object.as_any().downcast_ref::<DispatchObject>()
    }

    /// The configuration behind a dispatch object. Absent for plain
    /// objects and opaque dispatch objects.
    pub fn advised(object: &ObjectRef) -> Option<Arc<ProxyConfig>> {
        Self::dispatch_object(object).and_then(|d| d.config().cloned())
    }

    /// The type a caller would see with every layer of dispatch removed.
    pub fn ultimate_target_type(object: &ObjectRef) -> TypeRef {
        let mut current = object.clone();
        loop {
            let Some(config) = Self::advised(&current) else {
                break;
            };
            let source = config.target_source();
            let next = match source.get_target() {
                Ok(Some(target)) if source.is_static() => target,
                _ => {
                    if let Some(ty) = source.target_type() {
                        return ty;
                    }
                    break;
                }
            };
            current = next;
        }
        let mut ty = current.type_ref();
        while let Some(original) = ty.substituted_from().cloned() {
            ty = original;
        }
        ty
    }

    pub fn can_apply(advisor: &Advisor, ty: &TypeDescriptor, has_introductions: bool) -> bool {
        match advisor {
            Advisor::Introduction(intro) => intro.class_filter().matches(ty),
            Advisor::Pointcut(pa) => pa.is_global() || Pointcuts::can_apply(pa.pointcut().as_ref(), ty, has_introductions),
        }
    }

    pub fn find_advisors_that_can_apply(candidates: &[Arc<Advisor>], ty: &TypeDescriptor) -> Vec<Arc<Advisor>> {
        find_applicable_advisors(candidates, ty)
    }
}
