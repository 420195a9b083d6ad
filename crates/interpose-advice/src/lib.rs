//! Interpose Advice - advice variants, join points and argument binding
//!
//! Plain advice implements one of the small traits in [`advice`]. Declared
//! advice is a method reference with a parameter list; its parameters are
//! bound from the call (join point, arguments captured by the pointcut,
//! the return value or the raised fault) by [`binding`].

pub mod adapters;
pub mod advice;
pub mod advisor;
pub mod binding;
pub mod declared;
pub mod interceptors;
pub mod introduction;
pub mod invocation;

pub use advice::{
    Advice, AdviceBody, AdviceKind, AfterAdvice, AfterReturningAdvice, AfterThrowingAdvice, BeforeAdvice,
    Interceptor,
};
pub use advisor::{Advisor, IntroductionAdvisor, PointcutAdvisor, LOWEST_PRECEDENCE};
pub use binding::{ArgumentBindings, DeclaredNames, ParameterNameResolver, ResolverChain, THIS_JOIN_POINT};
pub use declared::{
    AdviceArg, AdviceMethod, AdviceMethodError, AdviceParam, DeclaredAdvice, DeclaredAdviceBuilder, JoinPoint,
    ParamKind, ProceedingJoinPoint,
};
pub use interceptors::{OperationStats, PerformanceMonitorInterceptor, TraceInterceptor};
pub use introduction::DelegatingIntroduction;
pub use invocation::{JoinPointStaticPart, MethodInvocation};
