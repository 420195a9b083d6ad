//! Interpose - interception and dynamic dispatch
//!
//! Pointcuts pick operations, advisors pair them with advice, and a
//! [`ProxyFactory`] builds dispatch objects that run every call through
//! the resulting chain before it reaches the target.

pub mod settings;

pub use interpose_advice as advice;
pub use interpose_core::{
    builtin, same_object, ClosureObject, Error, Fault, Object, ObjectRef, Operation, Result, TypeBuilder, TypeDescriptor, TypeRef,
    Value,
};
pub use interpose_pointcut as pointcut;
pub use interpose_proxy as proxy;
pub use interpose_proxy::{AopContext, ProxyConfig, ProxyFactory, ProxyFlags};
pub use settings::Settings;
