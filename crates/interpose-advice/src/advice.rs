//! Advice variants
//!
//! Every variant ends up as an [`Interceptor`] in the call chain. Plain
//! before/after advice is adapted by [`crate::adapters`]; declared advice
//! by [`crate::declared`].

use crate::adapters::{AfterInterceptor, AfterReturningInterceptor, AfterThrowingInterceptor, BeforeInterceptor};
use crate::declared::{DeclaredAdvice, DeclaredAdviceInterceptor};
use crate::invocation::MethodInvocation;
use interpose_core::{Error, ObjectRef, Operation, Result, TypeRef, Value};
use std::fmt;
use std::sync::Arc;

/// Around advice: receives the invocation and decides whether and how
/// often to proceed.
pub trait Interceptor: Send + Sync {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> Result<Value>;

    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

pub trait BeforeAdvice: Send + Sync {
    /// An error aborts the call; the target is not reached.
    fn before(&self, op: &Operation, args: &[Value], target: Option<&ObjectRef>) -> Result<()>;
}

pub trait AfterReturningAdvice: Send + Sync {
    fn after_returning(&self, ret: &Value, op: &Operation, args: &[Value], target: Option<&ObjectRef>) -> Result<()>;
}

pub trait AfterThrowingAdvice: Send + Sync {
    fn after_throwing(&self, op: &Operation, args: &[Value], target: Option<&ObjectRef>, error: &Error) -> Result<()>;

    /// Only errors of this fault type or a subtype are delivered.
    fn fault_type(&self) -> Option<TypeRef> {
        None
    }
}

/// Runs after the call however it completed.
pub trait AfterAdvice: Send + Sync {
    fn after(&self, op: &Operation, args: &[Value], target: Option<&ObjectRef>) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdviceKind {
    Before,
    AfterReturning,
    AfterThrowing,
    After,
    Around,
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Before => "before",
            Self::AfterReturning => "after-returning",
            Self::AfterThrowing => "after-throwing",
            Self::After => "after",
            Self::Around => "around",
        };
        f.write_str(s)
    }
}

/// Either a plain implementation of the variant's trait, or a declared
/// advice method with binding metadata.
pub enum AdviceBody<P: ?Sized> {
    Plain(Arc<P>),
    Declared(Arc<DeclaredAdvice>),
}

impl<P: ?Sized> Clone for AdviceBody<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Plain(p) => Self::Plain(p.clone()),
            Self::Declared(d) => Self::Declared(d.clone()),
        }
    }
}

#[derive(Clone)]
pub enum Advice {
    Before(AdviceBody<dyn BeforeAdvice>),
    AfterReturning(AdviceBody<dyn AfterReturningAdvice>),
    AfterThrowing(AdviceBody<dyn AfterThrowingAdvice>),
    After(AdviceBody<dyn AfterAdvice>),
    Around(AdviceBody<dyn Interceptor>),
}

impl Advice {
    pub fn before<F>(f: F) -> Self
    where
        F: Fn(&Operation, &[Value], Option<&ObjectRef>) -> Result<()> + Send + Sync + 'static,
    {
        Self::Before(AdviceBody::Plain(Arc::new(FnAdvice(f))))
    }

    pub fn after_returning<F>(f: F) -> Self
    where
        F: Fn(&Value, &Operation, &[Value], Option<&ObjectRef>) -> Result<()> + Send + Sync + 'static,
    {
        Self::AfterReturning(AdviceBody::Plain(Arc::new(FnAdvice(f))))
    }

    /// After-throwing advice for every error.
    pub fn after_throwing<F>(f: F) -> Self
    where
        F: Fn(&Operation, &[Value], Option<&ObjectRef>, &Error) -> Result<()> + Send + Sync + 'static,
    {
        Self::AfterThrowing(AdviceBody::Plain(Arc::new(FnThrows {
            fault_type: None,
            f,
        })))
    }

    /// After-throwing advice for faults of `fault_type` or a subtype.
    pub fn after_throwing_of<F>(fault_type: &TypeRef, f: F) -> Self
    where
        F: Fn(&Operation, &[Value], Option<&ObjectRef>, &Error) -> Result<()> + Send + Sync + 'static,
    {
        Self::AfterThrowing(AdviceBody::Plain(Arc::new(FnThrows {
            fault_type: Some(fault_type.clone()),
            f,
        })))
    }

    pub fn after<F>(f: F) -> Self
    where
        F: Fn(&Operation, &[Value], Option<&ObjectRef>) -> Result<()> + Send + Sync + 'static,
    {
        Self::After(AdviceBody::Plain(Arc::new(FnAfter(f))))
    }

    pub fn around<F>(f: F) -> Self
    where
        F: Fn(&mut dyn MethodInvocation) -> Result<Value> + Send + Sync + 'static,
    {
        Self::Around(AdviceBody::Plain(Arc::new(FnInterceptor(f))))
    }

    pub fn interceptor(interceptor: Arc<dyn Interceptor>) -> Self {
        Self::Around(AdviceBody::Plain(interceptor))
    }

    /// Wrap declared advice in the variant matching its kind.
    pub fn declared(advice: Arc<DeclaredAdvice>) -> Self {
        match advice.kind() {
            AdviceKind::Before => Self::Before(AdviceBody::Declared(advice)),
            AdviceKind::AfterReturning => Self::AfterReturning(AdviceBody::Declared(advice)),
            AdviceKind::AfterThrowing => Self::AfterThrowing(AdviceBody::Declared(advice)),
            AdviceKind::After => Self::After(AdviceBody::Declared(advice)),
            AdviceKind::Around => Self::Around(AdviceBody::Declared(advice)),
        }
    }

    pub fn kind(&self) -> AdviceKind {
        match self {
            Self::Before(_) => AdviceKind::Before,
            Self::AfterReturning(_) => AdviceKind::AfterReturning,
            Self::AfterThrowing(_) => AdviceKind::AfterThrowing,
            Self::After(_) => AdviceKind::After,
            Self::Around(_) => AdviceKind::Around,
        }
    }

    pub fn as_declared(&self) -> Option<&Arc<DeclaredAdvice>> {
        match self {
            Self::Before(AdviceBody::Declared(d))
            | Self::AfterReturning(AdviceBody::Declared(d))
            | Self::AfterThrowing(AdviceBody::Declared(d))
            | Self::After(AdviceBody::Declared(d))
            | Self::Around(AdviceBody::Declared(d)) => Some(d),
            _ => None,
        }
    }

    /// The interceptor placed in the call chain for this advice.
    pub fn to_interceptor(&self) -> Arc<dyn Interceptor> {
        match self {
            Self::Before(AdviceBody::Plain(a)) => Arc::new(BeforeInterceptor::new(a.clone())),
            Self::AfterReturning(AdviceBody::Plain(a)) => Arc::new(AfterReturningInterceptor::new(a.clone())),
            Self::AfterThrowing(AdviceBody::Plain(a)) => Arc::new(AfterThrowingInterceptor::new(a.clone())),
            Self::After(AdviceBody::Plain(a)) => Arc::new(AfterInterceptor::new(a.clone())),
            Self::Around(AdviceBody::Plain(a)) => a.clone(),
            Self::Before(AdviceBody::Declared(d))
            | Self::AfterReturning(AdviceBody::Declared(d))
            | Self::AfterThrowing(AdviceBody::Declared(d))
            | Self::After(AdviceBody::Declared(d))
            | Self::Around(AdviceBody::Declared(d)) => Arc::new(DeclaredAdviceInterceptor::new(d.clone())),
        }
    }

    pub fn describe(&self) -> String {
        match self.as_declared() {
            Some(d) => format!("{} advice {}", self.kind(), d.name()),
            None => format!("{} advice", self.kind()),
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

// Closure wrappers

struct FnAdvice<F>(F);

impl<F> BeforeAdvice for FnAdvice<F>
where
    F: Fn(&Operation, &[Value], Option<&ObjectRef>) -> Result<()> + Send + Sync,
{
    fn before(&self, op: &Operation, args: &[Value], target: Option<&ObjectRef>) -> Result<()> {
        (self.0)(op, args, target)
    }
}

impl<F> AfterReturningAdvice for FnAdvice<F>
where
    F: Fn(&Value, &Operation, &[Value], Option<&ObjectRef>) -> Result<()> + Send + Sync,
{
    fn after_returning(&self, ret: &Value, op: &Operation, args: &[Value], target: Option<&ObjectRef>) -> Result<()> {
        (self.0)(ret, op, args, target)
    }
}

struct FnAfter<F>(F);

impl<F> AfterAdvice for FnAfter<F>
where
    F: Fn(&Operation, &[Value], Option<&ObjectRef>) -> Result<()> + Send + Sync,
{
    fn after(&self, op: &Operation, args: &[Value], target: Option<&ObjectRef>) -> Result<()> {
        (self.0)(op, args, target)
    }
}

struct FnThrows<F> {
    fault_type: Option<TypeRef>,
    f: F,
}

impl<F> AfterThrowingAdvice for FnThrows<F>
where
    F: Fn(&Operation, &[Value], Option<&ObjectRef>, &Error) -> Result<()> + Send + Sync,
{
    fn after_throwing(&self, op: &Operation, args: &[Value], target: Option<&ObjectRef>, error: &Error) -> Result<()> {
        (self.f)(op, args, target, error)
    }

    fn fault_type(&self) -> Option<TypeRef> {
        self.fault_type.clone()
    }
}

struct FnInterceptor<F>(F);

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(&mut dyn MethodInvocation) -> Result<Value> + Send + Sync,
{
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> Result<Value> {
        (self.0)(invocation)
    }

    fn describe(&self) -> String {
        "around".to_string()
    }
}
