//! The per-call invocation: a cursor over a resolved chain
//!
//! An `Invocation` is created for one call and handed by `&mut` to each
//! interceptor in turn. `proceed` runs the step after the current one and
//! puts the cursor back when it returns, so an interceptor can proceed
//! any number of times and each time re-runs everything downstream.

use crate::resolver::ChainStep;
use interpose_advice::MethodInvocation;
use interpose_core::{Error, ObjectRef, Operation, Result, TypeRef, Value};
use interpose_pointcut::{Bindings, Pointcut};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    NotStarted,
    /// Running the chain step at this index.
    Proceeding(usize),
    TargetInvoked,
    Completed,
    Faulted,
}

pub struct Invocation {
    proxy: ObjectRef,
    target: Option<ObjectRef>,
    operation: Arc<Operation>,
    args: Vec<Value>,
    target_type: TypeRef,
    chain: Arc<[ChainStep]>,
    cursor: isize,
    state: InvocationState,
    bindings: HashMap<String, Bindings>,
}

impl Invocation {
    pub fn new(
        proxy: ObjectRef,
        target: Option<ObjectRef>,
        operation: Arc<Operation>,
        args: Vec<Value>,
        target_type: TypeRef,
        chain: Arc<[ChainStep]>,
    ) -> Self {
        Self {
            proxy,
            target,
            operation,
            args,
            target_type,
            chain,
            cursor: -1,
            state: InvocationState::NotStarted,
            bindings: HashMap::new(),
        }
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Run the whole chain and the target.
    pub fn run(&mut self) -> Result<Value> {
        let result = self.proceed();
        self.state = if result.is_ok() {
            InvocationState::Completed
        } else {
            InvocationState::Faulted
        };
        result
    }

    fn advance(&mut self) -> Result<Value> {
        self.cursor += 1;
        let index = self.cursor as usize;
        let Some(step) = self.chain.get(index).cloned() else {
            self.state = InvocationState::TargetInvoked;
            return self.invoke_target();
        };
        self.state = InvocationState::Proceeding(index);
        match step {
            ChainStep::Static { interceptor, binder } => {
                if let Some(binder) = binder {
                    self.record_bindings(binder.as_ref());
                }
                interceptor.invoke(self)
            }
            ChainStep::Dynamic { interceptor, pointcut } => {
                let accepted = pointcut
                    .operation_matcher()
                    .matches_runtime(&self.operation, &self.target_type, &self.args)?;
                if accepted {
                    self.record_bindings(pointcut.as_ref());
                    interceptor.invoke(self)
                } else {
                    trace!(step = index, expression = %pointcut.expression(), "Runtime match failed, skipping");
                    self.advance()
                }
            }
        }
    }

    fn record_bindings(&mut self, pointcut: &dyn Pointcut) {
        let bound = pointcut.bind(&self.operation, &self.target_type, &self.args);
        self.bindings.insert(pointcut.expression(), bound);
    }

    fn invoke_target(&self) -> Result<Value> {
        match &self.target {
            Some(target) => target.clone().invoke(&self.operation, self.args.clone()),
            None => Err(Error::illegal_state(format!(
                "no target for {} and no interceptor answered it",
                self.operation.qualified_name()
            ))),
        }
    }
}

impl MethodInvocation for Invocation {
    fn operation(&self) -> &Arc<Operation> {
        &self.operation
    }

    fn arguments(&self) -> &[Value] {
        &self.args
    }

    fn arguments_mut(&mut self) -> &mut Vec<Value> {
        &mut self.args
    }

    fn this(&self) -> &ObjectRef {
        &self.proxy
    }

    fn target(&self) -> Option<&ObjectRef> {
        self.target.as_ref()
    }

    fn target_type(&self) -> &TypeRef {
        &self.target_type
    }

    fn proceed(&mut self) -> Result<Value> {
        let cursor = self.cursor;
        let result = self.advance();
        self.cursor = cursor;
        result
    }

    fn bindings(&self, expression: &str) -> Option<&Bindings> {
        self.bindings.get(expression)
    }
}
