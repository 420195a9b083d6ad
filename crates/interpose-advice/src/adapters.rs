//! Interceptors adapting plain before/after advice to the call chain

use crate::advice::{AfterAdvice, AfterReturningAdvice, AfterThrowingAdvice, BeforeAdvice, Interceptor};
use crate::invocation::MethodInvocation;
use interpose_core::{Result, Value};
use std::sync::Arc;
use tracing::trace;

pub struct BeforeInterceptor {
    advice: Arc<dyn BeforeAdvice>,
}

impl BeforeInterceptor {
    pub fn new(advice: Arc<dyn BeforeAdvice>) -> Self {
        Self { advice }
    }
}

impl Interceptor for BeforeInterceptor {
    fn invoke(&self, inv: &mut dyn MethodInvocation) -> Result<Value> {
        self.advice.before(inv.operation(), inv.arguments(), inv.target())?;
        inv.proceed()
    }

    fn describe(&self) -> String {
        "before".to_string()
    }
}

pub struct AfterReturningInterceptor {
    advice: Arc<dyn AfterReturningAdvice>,
}

impl AfterReturningInterceptor {
    pub fn new(advice: Arc<dyn AfterReturningAdvice>) -> Self {
        Self { advice }
    }
}

impl Interceptor for AfterReturningInterceptor {
    fn invoke(&self, inv: &mut dyn MethodInvocation) -> Result<Value> {
        let ret = inv.proceed()?;
        self.advice
            .after_returning(&ret, inv.operation(), inv.arguments(), inv.target())?;
        Ok(ret)
    }

    fn describe(&self) -> String {
        "after-returning".to_string()
    }
}

/// Delivers errors to after-throwing advice, then rethrows the original.
/// An error raised by the advice itself replaces the original.
pub struct AfterThrowingInterceptor {
    advice: Arc<dyn AfterThrowingAdvice>,
}

impl AfterThrowingInterceptor {
    pub fn new(advice: Arc<dyn AfterThrowingAdvice>) -> Self {
        Self { advice }
    }
}

impl Interceptor for AfterThrowingInterceptor {
    fn invoke(&self, inv: &mut dyn MethodInvocation) -> Result<Value> {
        match inv.proceed() {
            Ok(ret) => Ok(ret),
            Err(err) => {
                let applies = match self.advice.fault_type() {
                    Some(ty) => ty.is_assignable_from(&err.fault_type()),
                    None => true,
                };
                if applies {
                    self.advice
                        .after_throwing(inv.operation(), inv.arguments(), inv.target(), &err)?;
                } else {
                    trace!(fault = %err.fault_type().name(), "After-throwing advice skipped for unrelated fault");
                }
                Err(err)
            }
        }
    }

    fn describe(&self) -> String {
        "after-throwing".to_string()
    }
}

/// Runs advice after the call on every exit path. An advice error replaces
/// the call's outcome.
pub struct AfterInterceptor {
    advice: Arc<dyn AfterAdvice>,
}

impl AfterInterceptor {
    pub fn new(advice: Arc<dyn AfterAdvice>) -> Self {
        Self { advice }
    }
}

impl Interceptor for AfterInterceptor {
    fn invoke(&self, inv: &mut dyn MethodInvocation) -> Result<Value> {
        let outcome = inv.proceed();
        self.advice.after(inv.operation(), inv.arguments(), inv.target())?;
        outcome
    }

    fn describe(&self) -> String {
        "after".to_string()
    }
}
