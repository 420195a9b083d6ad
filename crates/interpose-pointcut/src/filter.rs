//! Class filters: predicates over the target type

use crate::glob::Glob;
use interpose_core::{TypeDescriptor, TypeRef};
use std::sync::Arc;

pub trait ClassFilter: Send + Sync {
    fn matches(&self, ty: &TypeDescriptor) -> bool;

    /// True only for the constant filter; composition skips it.
    fn is_true(&self) -> bool {
        false
    }

    fn describe(&self) -> String;
}

/// Matches every type.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrueClassFilter;

impl TrueClassFilter {
    pub fn shared() -> Arc<dyn ClassFilter> {
        Arc::new(TrueClassFilter)
    }
}

impl ClassFilter for TrueClassFilter {
    fn matches(&self, _ty: &TypeDescriptor) -> bool {
        true
    }

    fn is_true(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "true".to_string()
    }
}

/// Class filter by type identity, assignability or name pattern.
#[derive(Debug, Clone)]
pub enum TypeFilter {
    /// The type itself, by name.
    Exact(String),
    /// The type or any subtype/implementor.
    AssignableTo(TypeRef),
    /// Type name matching a glob.
    NamePattern(Glob),
}

impl TypeFilter {
    pub fn exact(name: impl Into<String>) -> Self {
        Self::Exact(name.into())
    }

    pub fn assignable_to(ty: &TypeRef) -> Self {
        Self::AssignableTo(ty.clone())
    }

    pub fn name_pattern(pattern: &str) -> Self {
        Self::NamePattern(Glob::new(pattern))
    }
}

impl ClassFilter for TypeFilter {
    fn matches(&self, ty: &TypeDescriptor) -> bool {
        // Generated types are judged by the type they stand in for
        let ty = ty.substituted_from().map(|t| t.as_ref()).unwrap_or(ty);
        match self {
            Self::Exact(name) => ty.name() == name,
            Self::AssignableTo(base) => base.is_assignable_from(ty),
            Self::NamePattern(glob) => glob.matches(ty.name()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Exact(name) => format!("target({})", name),
            Self::AssignableTo(base) => format!("this({}+)", base.name()),
            Self::NamePattern(glob) => format!("within({})", glob),
        }
    }
}

struct UnionClassFilter(Vec<Arc<dyn ClassFilter>>);

impl ClassFilter for UnionClassFilter {
    fn matches(&self, ty: &TypeDescriptor) -> bool {
        self.0.iter().any(|f| f.matches(ty))
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.0.iter().map(|f| f.describe()).collect();
        format!("({})", parts.join(" || "))
    }
}

struct IntersectionClassFilter(Vec<Arc<dyn ClassFilter>>);

impl ClassFilter for IntersectionClassFilter {
    fn matches(&self, ty: &TypeDescriptor) -> bool {
        self.0.iter().all(|f| f.matches(ty))
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.0.iter().map(|f| f.describe()).collect();
        format!("({})", parts.join(" && "))
    }
}

/// `a || b`. TRUE absorbs the other side.
pub fn union(a: Arc<dyn ClassFilter>, b: Arc<dyn ClassFilter>) -> Arc<dyn ClassFilter> {
    if a.is_true() {
        return a;
    }
    if b.is_true() {
        return b;
    }
    Arc::new(UnionClassFilter(vec![a, b]))
}

/// `a && b`. TRUE is the identity.
pub fn intersection(a: Arc<dyn ClassFilter>, b: Arc<dyn ClassFilter>) -> Arc<dyn ClassFilter> {
    if a.is_true() {
        return b;
    }
    if b.is_true() {
        return a;
    }
    Arc::new(IntersectionClassFilter(vec![a, b]))
}
