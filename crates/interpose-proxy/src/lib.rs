//! Interpose Proxy - configuration, chain resolution and dispatch
//!
//! A [`ProxyFactory`] owns a shared [`ProxyConfig`]. Dispatch objects built
//! from it resolve the chain for each (operation, target type) pair once
//! per configuration generation and run calls through an [`Invocation`].

pub mod config;
pub mod context;
pub mod dispatch;
pub mod expose;
pub mod factory;
pub mod invocation;
pub mod resolver;
pub mod target;
pub mod utils;

pub use config::{ConfigListener, ConfigSnapshot, ProxyConfig, ProxyFlags};
pub use context::AopContext;
pub use dispatch::{
    create_dispatch_object, select_strategy, CapabilitySetBuilder, DispatchBuilder, DispatchObject, DispatchStrategy,
    SubclassBuilder,
};
pub use expose::{current_join_point, ExposeInvocationInterceptor, JoinPointSnapshot};
pub use factory::ProxyFactory;
pub use invocation::{Invocation, InvocationState};
pub use resolver::{build_chain, find_applicable_advisors, AdvisorRegistry, ChainStep};
pub use target::{
    EmptyTargetSource, HotSwappableTargetSource, PooledTargetSource, PrototypeTargetSource, SingletonTargetSource,
    TargetFactory, TargetSource,
};
pub use utils::AopUtils;
