//! Operation matchers
//!
//! Every runtime matcher is also a static matcher: the static check rejects
//! early, the runtime check decides once arguments are known, and it is only
//! consulted after the static check passed.

use crate::filter::ClassFilter;
use interpose_core::{Error, Operation, Result, TypeDescriptor, Value};
use std::sync::Arc;

pub trait OperationMatcher: Send + Sync {
    fn matches(&self, op: &Operation, target: &TypeDescriptor) -> bool;

    /// Static check used while resolving advisors for a type that also has
    /// introductions. Matchers that care about introduced operations may
    /// broaden their acceptance here.
    fn matches_with_introductions(
        &self,
        op: &Operation,
        target: &TypeDescriptor,
        _has_introductions: bool,
    ) -> bool {
        self.matches(op, target)
    }

    fn is_runtime(&self) -> bool {
        false
    }

    fn matches_runtime(&self, op: &Operation, _target: &TypeDescriptor, _args: &[Value]) -> Result<bool> {
        Err(Error::StaticMatcher {
            matcher: self.describe(),
            operation: op.qualified_name(),
        })
    }

    /// True only for the constant matcher; composition skips it.
    fn is_true(&self) -> bool {
        false
    }

    fn describe(&self) -> String;
}

/// Matches every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrueMatcher;

impl TrueMatcher {
    pub fn shared() -> Arc<dyn OperationMatcher> {
        Arc::new(TrueMatcher)
    }
}

impl OperationMatcher for TrueMatcher {
    fn matches(&self, _op: &Operation, _target: &TypeDescriptor) -> bool {
        true
    }

    fn is_true(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "true".to_string()
    }
}

/// Full evaluation of one matcher: static, then runtime if declared.
pub(crate) fn evaluate(
    matcher: &dyn OperationMatcher,
    op: &Operation,
    target: &TypeDescriptor,
    args: &[Value],
) -> Result<bool> {
    if !matcher.matches(op, target) {
        return Ok(false);
    }
    if matcher.is_runtime() {
        return matcher.matches_runtime(op, target, args);
    }
    Ok(true)
}

/// One side of a union: an optional class filter guarding a matcher.
#[derive(Clone)]
pub(crate) struct Side {
    pub(crate) filter: Option<Arc<dyn ClassFilter>>,
    pub(crate) matcher: Arc<dyn OperationMatcher>,
}

impl Side {
    fn filter_matches(&self, target: &TypeDescriptor) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(target))
    }

    fn matches(&self, op: &Operation, target: &TypeDescriptor, has_introductions: bool) -> bool {
        self.filter_matches(target) && self.matcher.matches_with_introductions(op, target, has_introductions)
    }

    fn matches_runtime(&self, op: &Operation, target: &TypeDescriptor, args: &[Value]) -> Result<bool> {
        if !self.filter_matches(target) {
            return Ok(false);
        }
        evaluate(self.matcher.as_ref(), op, target, args)
    }
}

/// `left || right`, keeping each side's class filter attached to its matcher
/// so `(cf1 && m1) || (cf2 && m2)` is not widened to
/// `(cf1 || cf2) && (m1 || m2)`.
pub(crate) struct UnionMatcher {
    left: Side,
    right: Side,
}

impl OperationMatcher for UnionMatcher {
    fn matches(&self, op: &Operation, target: &TypeDescriptor) -> bool {
        self.matches_with_introductions(op, target, false)
    }

    fn matches_with_introductions(&self, op: &Operation, target: &TypeDescriptor, has_introductions: bool) -> bool {
        self.left.matches(op, target, has_introductions) || self.right.matches(op, target, has_introductions)
    }

    fn is_runtime(&self) -> bool {
        self.left.matcher.is_runtime() || self.right.matcher.is_runtime()
    }

    fn matches_runtime(&self, op: &Operation, target: &TypeDescriptor, args: &[Value]) -> Result<bool> {
        if self.left.matches_runtime(op, target, args)? {
            return Ok(true);
        }
        self.right.matches_runtime(op, target, args)
    }

    fn describe(&self) -> String {
        format!("({} || {})", self.left.matcher.describe(), self.right.matcher.describe())
    }
}

pub(crate) struct IntersectionMatcher {
    left: Arc<dyn OperationMatcher>,
    right: Arc<dyn OperationMatcher>,
}

impl OperationMatcher for IntersectionMatcher {
    fn matches(&self, op: &Operation, target: &TypeDescriptor) -> bool {
        self.left.matches(op, target) && self.right.matches(op, target)
    }

    fn matches_with_introductions(&self, op: &Operation, target: &TypeDescriptor, has_introductions: bool) -> bool {
        self.left.matches_with_introductions(op, target, has_introductions)
            && self.right.matches_with_introductions(op, target, has_introductions)
    }

    fn is_runtime(&self) -> bool {
        self.left.is_runtime() || self.right.is_runtime()
    }

    fn matches_runtime(&self, op: &Operation, target: &TypeDescriptor, args: &[Value]) -> Result<bool> {
        // Both static checks already passed
        if self.left.is_runtime() && !self.left.matches_runtime(op, target, args)? {
            return Ok(false);
        }
        if self.right.is_runtime() && !self.right.matches_runtime(op, target, args)? {
            return Ok(false);
        }
        Ok(true)
    }

    fn describe(&self) -> String {
        format!("({} && {})", self.left.describe(), self.right.describe())
    }
}

/// `a || b`. TRUE absorbs the other side.
pub fn union(a: Arc<dyn OperationMatcher>, b: Arc<dyn OperationMatcher>) -> Arc<dyn OperationMatcher> {
    union_filtered(None, a, None, b)
}

/// `(fa && a) || (fb && b)`, where an absent filter means TRUE.
pub fn union_filtered(
    fa: Option<Arc<dyn ClassFilter>>,
    a: Arc<dyn OperationMatcher>,
    fb: Option<Arc<dyn ClassFilter>>,
    b: Arc<dyn OperationMatcher>,
) -> Arc<dyn OperationMatcher> {
    let fa = fa.filter(|f| !f.is_true());
    let fb = fb.filter(|f| !f.is_true());
    if a.is_true() && fa.is_none() {
        return a;
    }
    if b.is_true() && fb.is_none() {
        return b;
    }
    Arc::new(UnionMatcher {
        left: Side { filter: fa, matcher: a },
        right: Side { filter: fb, matcher: b },
    })
}

/// `a && b`. TRUE is the identity.
pub fn intersection(a: Arc<dyn OperationMatcher>, b: Arc<dyn OperationMatcher>) -> Arc<dyn OperationMatcher> {
    if a.is_true() {
        return b;
    }
    if b.is_true() {
        return a;
    }
    Arc::new(IntersectionMatcher { left: a, right: b })
}
