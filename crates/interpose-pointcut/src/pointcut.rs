//! Pointcuts: a class filter plus an operation matcher

use crate::filter::{self, ClassFilter, TrueClassFilter};
use crate::matcher::{self, OperationMatcher, TrueMatcher};
use interpose_core::{Error, Operation, Result, TypeDescriptor, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Named values a pointcut extracted from a matching call.
pub type Bindings = BTreeMap<String, Value>;

pub trait Pointcut: Send + Sync {
    fn class_filter(&self) -> &dyn ClassFilter;

    fn operation_matcher(&self) -> &dyn OperationMatcher;

    /// Text identifying this pointcut in diagnostics and binding lookups.
    fn expression(&self) -> String {
        format!(
            "{} && {}",
            self.class_filter().describe(),
            self.operation_matcher().describe()
        )
    }

    /// Names this pointcut can bind from a matching call.
    fn binding_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Extract the named values for a call that matched.
    fn bind(&self, _op: &Operation, _target: &TypeDescriptor, _args: &[Value]) -> Bindings {
        Bindings::new()
    }
}

/// Matches every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruePointcut;

impl TruePointcut {
    pub fn shared() -> Arc<dyn Pointcut> {
        Arc::new(TruePointcut)
    }
}

impl Pointcut for TruePointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        &TrueClassFilter
    }

    fn operation_matcher(&self) -> &dyn OperationMatcher {
        &TrueMatcher
    }

    fn expression(&self) -> String {
        "true".to_string()
    }
}

// Adapters so a shared pointcut can take part in composition.

struct PointcutFilter(Arc<dyn Pointcut>);

impl ClassFilter for PointcutFilter {
    fn matches(&self, ty: &TypeDescriptor) -> bool {
        self.0.class_filter().matches(ty)
    }

    fn is_true(&self) -> bool {
        self.0.class_filter().is_true()
    }

    fn describe(&self) -> String {
        self.0.class_filter().describe()
    }
}

struct PointcutMatcher(Arc<dyn Pointcut>);

impl OperationMatcher for PointcutMatcher {
    fn matches(&self, op: &Operation, target: &TypeDescriptor) -> bool {
        self.0.operation_matcher().matches(op, target)
    }

    fn matches_with_introductions(&self, op: &Operation, target: &TypeDescriptor, has_introductions: bool) -> bool {
        self.0
            .operation_matcher()
            .matches_with_introductions(op, target, has_introductions)
    }

    fn is_runtime(&self) -> bool {
        self.0.operation_matcher().is_runtime()
    }

    fn matches_runtime(&self, op: &Operation, target: &TypeDescriptor, args: &[Value]) -> Result<bool> {
        self.0.operation_matcher().matches_runtime(op, target, args)
    }

    fn is_true(&self) -> bool {
        self.0.operation_matcher().is_true()
    }

    fn describe(&self) -> String {
        self.0.operation_matcher().describe()
    }
}

/// A pointcut built up by union and intersection.
///
/// Parts that bind names are remembered so the composite binds what its
/// matching parts bind.
#[derive(Clone)]
pub struct ComposablePointcut {
    class_filter: Arc<dyn ClassFilter>,
    matcher: Arc<dyn OperationMatcher>,
    binders: Vec<Arc<dyn Pointcut>>,
    expression: Option<String>,
}

impl Default for ComposablePointcut {
    fn default() -> Self {
        Self::new()
    }
}

impl ComposablePointcut {
    /// The TRUE pointcut, ready for composition.
    pub fn new() -> Self {
        Self {
            class_filter: TrueClassFilter::shared(),
            matcher: TrueMatcher::shared(),
            binders: Vec::new(),
            expression: None,
        }
    }

    pub fn from_parts(class_filter: Arc<dyn ClassFilter>, matcher: Arc<dyn OperationMatcher>) -> Self {
        Self {
            class_filter,
            matcher,
            binders: Vec::new(),
            expression: None,
        }
    }

    pub fn from_pointcut(pointcut: Arc<dyn Pointcut>) -> Self {
        Self::new().intersection(pointcut)
    }

    /// Override the generated expression text.
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn union_class_filter(mut self, other: Arc<dyn ClassFilter>) -> Self {
        self.class_filter = filter::union(self.class_filter, other);
        self
    }

    pub fn intersection_class_filter(mut self, other: Arc<dyn ClassFilter>) -> Self {
        self.class_filter = filter::intersection(self.class_filter, other);
        self
    }

    pub fn union_matcher(mut self, other: Arc<dyn OperationMatcher>) -> Self {
        self.matcher = matcher::union(self.matcher, other);
        self
    }

    pub fn intersection_matcher(mut self, other: Arc<dyn OperationMatcher>) -> Self {
        self.matcher = matcher::intersection(self.matcher, other);
        self
    }

    /// `self || other`, each side keeping its own class filter.
    pub fn union(mut self, other: Arc<dyn Pointcut>) -> Self {
        let other_filter: Arc<dyn ClassFilter> = Arc::new(PointcutFilter(other.clone()));
        let other_matcher: Arc<dyn OperationMatcher> = Arc::new(PointcutMatcher(other.clone()));
        self.matcher = matcher::union_filtered(
            Some(self.class_filter.clone()),
            self.matcher,
            Some(other_filter.clone()),
            other_matcher,
        );
        self.class_filter = filter::union(self.class_filter, other_filter);
        self.adopt_binder(other);
        self
    }

    /// `self && other`.
    pub fn intersection(mut self, other: Arc<dyn Pointcut>) -> Self {
        let other_filter: Arc<dyn ClassFilter> = Arc::new(PointcutFilter(other.clone()));
        let other_matcher: Arc<dyn OperationMatcher> = Arc::new(PointcutMatcher(other.clone()));
        self.class_filter = filter::intersection(self.class_filter, other_filter);
        self.matcher = matcher::intersection(self.matcher, other_matcher);
        self.adopt_binder(other);
        self
    }

    fn adopt_binder(&mut self, other: Arc<dyn Pointcut>) {
        if !other.binding_names().is_empty() {
            self.binders.push(other);
        }
    }
}

impl Pointcut for ComposablePointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        self.class_filter.as_ref()
    }

    fn operation_matcher(&self) -> &dyn OperationMatcher {
        self.matcher.as_ref()
    }

    fn expression(&self) -> String {
        match &self.expression {
            Some(e) => e.clone(),
            None => format!("{} && {}", self.class_filter.describe(), self.matcher.describe()),
        }
    }

    fn binding_names(&self) -> Vec<String> {
        let names: BTreeSet<String> = self.binders.iter().flat_map(|b| b.binding_names()).collect();
        names.into_iter().collect()
    }

    fn bind(&self, op: &Operation, target: &TypeDescriptor, args: &[Value]) -> Bindings {
        let mut bound = Bindings::new();
        for binder in &self.binders {
            // A part that does not match this call contributes nothing
            if Pointcuts::matches(binder.as_ref(), op, target, args).unwrap_or(false) {
                bound.extend(binder.bind(op, target, args));
            }
        }
        bound
    }
}

/// Helpers over pointcuts.
pub struct Pointcuts;

impl Pointcuts {
    pub fn union(a: Arc<dyn Pointcut>, b: Arc<dyn Pointcut>) -> ComposablePointcut {
        ComposablePointcut::from_pointcut(a).union(b)
    }

    pub fn intersection(a: Arc<dyn Pointcut>, b: Arc<dyn Pointcut>) -> ComposablePointcut {
        ComposablePointcut::from_pointcut(a).intersection(b)
    }

    /// Full match of a call: class filter, static check, runtime check if declared.
    pub fn matches(pointcut: &dyn Pointcut, op: &Operation, target: &TypeDescriptor, args: &[Value]) -> Result<bool> {
        if !pointcut.class_filter().matches(target) {
            return Ok(false);
        }
        matcher::evaluate(pointcut.operation_matcher(), op, target, args)
    }

    /// Definitive answer without arguments. A runtime matcher cannot give
    /// one and is reported as a configuration error.
    pub fn matches_static(pointcut: &dyn Pointcut, op: &Operation, target: &TypeDescriptor) -> Result<bool> {
        let matcher = pointcut.operation_matcher();
        if matcher.is_runtime() {
            return Err(Error::DynamicMatcher {
                expression: pointcut.expression(),
            });
        }
        Ok(pointcut.class_filter().matches(target) && matcher.matches(op, target))
    }

    /// True if the pointcut could match some operation of `ty`, judged by
    /// the class filter and the static check only.
    pub fn can_apply(pointcut: &dyn Pointcut, ty: &TypeDescriptor, has_introductions: bool) -> bool {
        Self::can_apply_with(pointcut, ty, &[], has_introductions)
    }

    /// As [`Pointcuts::can_apply`], also considering operations introduced
    /// onto the type.
    pub fn can_apply_with(
        pointcut: &dyn Pointcut,
        ty: &TypeDescriptor,
        introduced: &[Arc<Operation>],
        has_introductions: bool,
    ) -> bool {
        if !pointcut.class_filter().matches(ty) {
            return false;
        }
        let matcher = pointcut.operation_matcher();
        if matcher.is_true() {
            return true;
        }
        ty.all_operations()
            .iter()
            .chain(introduced.iter())
            .any(|op| matcher.matches_with_introductions(op, ty, has_introductions))
    }
}
