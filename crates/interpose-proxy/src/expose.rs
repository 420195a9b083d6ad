//! Exposing the current join point to code running inside a call

use interpose_advice::{Advice, Advisor, Interceptor, JoinPointStaticPart, MethodInvocation, PointcutAdvisor};
use interpose_core::{Error, ObjectRef, Result, Value};
use interpose_pointcut::TruePointcut;
use std::cell::RefCell;
use std::sync::Arc;

/// What an exposed join point looks like from outside the chain.
#[derive(Clone, Debug)]
pub struct JoinPointSnapshot {
    pub static_part: JoinPointStaticPart,
    pub args: Vec<Value>,
    pub this: ObjectRef,
}

thread_local! {
    static CURRENT_JOIN_POINT: RefCell<Option<JoinPointSnapshot>> = const { RefCell::new(None) };
}

/// The join point published by the nearest enclosing
/// [`ExposeInvocationInterceptor`] on this thread.
pub fn current_join_point() -> Result<JoinPointSnapshot> {
    CURRENT_JOIN_POINT
        .with(|slot| slot.borrow().clone())
        .ok_or_else(|| {
            Error::illegal_state("no join point in scope: add the expose-invocation advisor to the front of the chain")
        })
}

struct JoinPointScope {
    previous: Option<JoinPointSnapshot>,
}

impl JoinPointScope {
    fn enter(snapshot: JoinPointSnapshot) -> Self {
        let previous = CURRENT_JOIN_POINT.with(|slot| slot.replace(Some(snapshot)));
        Self { previous }
    }
}

impl Drop for JoinPointScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_JOIN_POINT.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Publishes the call it intercepts for everything downstream.
#[derive(Debug, Default)]
pub struct ExposeInvocationInterceptor;

impl ExposeInvocationInterceptor {
    /// An advisor ordered ahead of every other one in a registry.
    pub fn advisor() -> Advisor {
        PointcutAdvisor::new(TruePointcut::shared(), Advice::interceptor(Arc::new(Self)))
            .with_order(i32::MIN)
            .into()
    }
}

impl Interceptor for ExposeInvocationInterceptor {
    fn invoke(&self, inv: &mut dyn MethodInvocation) -> Result<Value> {
        let _scope = JoinPointScope::enter(JoinPointSnapshot {
            static_part: inv.static_part(),
            args: inv.arguments().to_vec(),
            this: inv.this().clone(),
        });
        inv.proceed()
    }

    fn describe(&self) -> String {
        "expose-invocation".to_string()
    }
}
