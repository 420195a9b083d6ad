//! Declared advice: a method reference with a parameter list
//!
//! The parameter list says what the method wants from the call. Slots are
//! filled from the join point, from values the pointcut captured, and from
//! the return value or raised fault. See [`crate::binding`].

use crate::advice::{AdviceKind, Interceptor};
use crate::binding::{self, ArgumentBindings, BindingRequest, DeclaredNames, ParameterNameResolver};
use crate::invocation::{JoinPointStaticPart, MethodInvocation};
use interpose_core::{builtin, Error, ObjectRef, Operation, Result, TypeRef, Value};
use interpose_pointcut::Pointcut;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// What a parameter slot receives.
#[derive(Clone, Debug)]
pub enum ParamKind {
    JoinPoint,
    /// Only valid for around advice.
    ProceedingJoinPoint,
    StaticPart,
    Value(TypeRef),
}

#[derive(Clone, Debug)]
pub struct AdviceParam {
    pub name: Option<String>,
    pub kind: ParamKind,
}

impl AdviceParam {
    pub fn join_point() -> Self {
        Self { name: None, kind: ParamKind::JoinPoint }
    }

    pub fn proceeding_join_point() -> Self {
        Self { name: None, kind: ParamKind::ProceedingJoinPoint }
    }

    pub fn static_part() -> Self {
        Self { name: None, kind: ParamKind::StaticPart }
    }

    pub fn value(name: impl Into<String>, ty: &TypeRef) -> Self {
        Self {
            name: Some(name.into()),
            kind: ParamKind::Value(ty.clone()),
        }
    }

    /// A value parameter whose name must be supplied or discovered.
    pub fn unnamed(ty: &TypeRef) -> Self {
        Self {
            name: None,
            kind: ParamKind::Value(ty.clone()),
        }
    }
}

/// Failure of an advice method body.
#[derive(Debug)]
pub enum AdviceMethodError {
    /// The body, or something it called, raised this error. It is passed on
    /// unchanged.
    Raised(Error),
    /// The body could not use the arguments it was given.
    Mismatch(String),
}

impl From<Error> for AdviceMethodError {
    fn from(err: Error) -> Self {
        Self::Raised(err)
    }
}

impl fmt::Display for AdviceMethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raised(e) => write!(f, "{}", e),
            Self::Mismatch(m) => write!(f, "argument mismatch: {}", m),
        }
    }
}

/// An argument handed to an advice method.
pub enum AdviceArg<'a> {
    JoinPoint(JoinPoint<'a>),
    Proceeding(ProceedingJoinPoint<'a>),
    StaticPart(JoinPointStaticPart),
    Value(Value),
}

impl<'a> AdviceArg<'a> {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_join_point(&self) -> Option<&JoinPoint<'a>> {
        match self {
            Self::JoinPoint(jp) => Some(jp),
            _ => None,
        }
    }

    pub fn into_proceeding(self) -> Option<ProceedingJoinPoint<'a>> {
        match self {
            Self::Proceeding(pjp) => Some(pjp),
            _ => None,
        }
    }

    pub fn as_static_part(&self) -> Option<&JoinPointStaticPart> {
        match self {
            Self::StaticPart(sp) => Some(sp),
            _ => None,
        }
    }
}

/// Read-only view of the current call.
pub struct JoinPoint<'a> {
    inv: &'a dyn MethodInvocation,
}

impl<'a> JoinPoint<'a> {
    pub fn operation(&self) -> &Operation {
        self.inv.operation()
    }

    pub fn args(&self) -> &[Value] {
        self.inv.arguments()
    }

    pub fn this(&self) -> &ObjectRef {
        self.inv.this()
    }

    pub fn target(&self) -> Option<&ObjectRef> {
        self.inv.target()
    }

    pub fn static_part(&self) -> JoinPointStaticPart {
        self.inv.static_part()
    }
}

impl fmt::Display for JoinPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.static_part())
    }
}

/// View of the current call that can run the rest of the chain.
pub struct ProceedingJoinPoint<'a> {
    inv: &'a mut dyn MethodInvocation,
}

impl<'a> ProceedingJoinPoint<'a> {
    pub fn operation(&self) -> &Operation {
        self.inv.operation()
    }

    pub fn args(&self) -> &[Value] {
        self.inv.arguments()
    }

    pub fn this(&self) -> &ObjectRef {
        self.inv.this()
    }

    pub fn target(&self) -> Option<&ObjectRef> {
        self.inv.target()
    }

    pub fn static_part(&self) -> JoinPointStaticPart {
        self.inv.static_part()
    }

    pub fn proceed(&mut self) -> Result<Value> {
        self.inv.proceed()
    }

    /// Proceed with replacement arguments. The count must match the
    /// operation's parameters.
    pub fn proceed_with(&mut self, args: Vec<Value>) -> Result<Value> {
        let expected = self.inv.operation().params().len();
        if args.len() != expected {
            return Err(Error::illegal_state(format!(
                "expecting {} arguments to proceed, but was passed {}",
                expected,
                args.len()
            )));
        }
        *self.inv.arguments_mut() = args;
        self.inv.proceed()
    }
}

type AdviceFn = dyn for<'a> Fn(Vec<AdviceArg<'a>>) -> std::result::Result<Value, AdviceMethodError> + Send + Sync;

/// The method an advice declaration refers to.
#[derive(Clone)]
pub struct AdviceMethod {
    name: String,
    params: Vec<AdviceParam>,
    body: Arc<AdviceFn>,
}

impl AdviceMethod {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: for<'a> Fn(Vec<AdviceArg<'a>>) -> std::result::Result<Value, AdviceMethodError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            body: Arc::new(body),
        }
    }

    pub fn param(mut self, param: AdviceParam) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_params(mut self, params: Vec<AdviceParam>) -> Self {
        self.params = params;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[AdviceParam] {
        &self.params
    }
}

impl fmt::Debug for AdviceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdviceMethod")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// An advice method together with its pointcut and binding metadata.
pub struct DeclaredAdvice {
    kind: AdviceKind,
    method: AdviceMethod,
    pointcut: Arc<dyn Pointcut>,
    expression: String,
    arg_names: Option<Vec<String>>,
    returning: Option<String>,
    throwing: Option<String>,
    resolver: Arc<dyn ParameterNameResolver>,
    bindings: OnceLock<ArgumentBindings>,
    compute_lock: Mutex<()>,
}

impl DeclaredAdvice {
    pub fn builder(kind: AdviceKind, method: AdviceMethod, pointcut: Arc<dyn Pointcut>) -> DeclaredAdviceBuilder {
        DeclaredAdviceBuilder {
            kind,
            method,
            pointcut,
            arg_names: None,
            returning: None,
            throwing: None,
            resolver: Arc::new(DeclaredNames),
        }
    }

    pub fn kind(&self) -> AdviceKind {
        self.kind
    }

    /// Advice identity used in diagnostics.
    pub fn name(&self) -> &str {
        self.method.name()
    }

    pub fn method(&self) -> &AdviceMethod {
        &self.method
    }

    pub fn pointcut(&self) -> &Arc<dyn Pointcut> {
        &self.pointcut
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The slot layout, computed on first use and cached. Concurrent first
    /// calls compute it once.
    pub fn argument_bindings(&self) -> Result<&ArgumentBindings> {
        if let Some(bindings) = self.bindings.get() {
            return Ok(bindings);
        }
        let _guard = self.compute_lock.lock();
        if let Some(bindings) = self.bindings.get() {
            return Ok(bindings);
        }
        let pointcut_names = self.pointcut.binding_names();
        let computed = binding::calculate(&BindingRequest {
            method: &self.method,
            kind: self.kind,
            arg_names: self.arg_names.as_deref(),
            returning: self.returning.as_deref(),
            throwing: self.throwing.as_deref(),
            pointcut_names: &pointcut_names,
            resolver: self.resolver.as_ref(),
        })?;
        debug!(
            advice = %self.method.name(),
            kind = %self.kind,
            pointcut = %self.expression,
            parameters = ?computed.parameter_names(),
            "Computed argument bindings"
        );
        Ok(self.bindings.get_or_init(|| computed))
    }

    /// True if after-returning advice wants this return value.
    pub fn accepts_return(&self, ret: &Value) -> Result<bool> {
        Ok(match self.argument_bindings()?.returning() {
            Some((_, ty)) => ty.name() == builtin::ANY || ty.accepts(ret),
            None => true,
        })
    }

    /// True if after-throwing advice wants this error.
    pub fn accepts_error(&self, err: &Error) -> Result<bool> {
        Ok(match self.argument_bindings()?.throwing() {
            Some((_, ty)) => ty.is_assignable_from(&err.fault_type()),
            None => true,
        })
    }

    /// Bind the method's parameters for this call and run it.
    pub fn invoke_with(
        &self,
        inv: &mut dyn MethodInvocation,
        ret: Option<&Value>,
        error: Option<&Error>,
    ) -> Result<Value> {
        let bindings = self.argument_bindings()?;
        let params = self.method.params();
        let mut slots: Vec<Option<AdviceArg<'_>>> = params.iter().map(|_| None).collect();
        let mut bound = 0usize;

        if !bindings.pointcut_bound().is_empty() {
            let captured = inv.bindings(&self.expression);
            for (name, index) in bindings.pointcut_bound() {
                if let Some(value) = captured.and_then(|b| b.get(name)) {
                    self.check_type(*index, name, value)?;
                    slots[*index] = Some(AdviceArg::Value(value.clone()));
                    bound += 1;
                }
            }
        }
        if let (Some((index, _)), Some(ret)) = (bindings.returning(), ret) {
            slots[*index] = Some(AdviceArg::Value(ret.clone()));
            bound += 1;
        }
        if let (Some((index, _)), Some(error)) = (bindings.throwing(), error) {
            slots[*index] = Some(AdviceArg::Value(Value::from(error.to_fault())));
            bound += 1;
        }
        if let Some(index) = bindings.join_point_static_part_arg_index() {
            slots[index] = Some(AdviceArg::StaticPart(inv.static_part()));
            bound += 1;
        }
        let join_point_index = bindings.join_point_arg_index();
        if join_point_index.is_some() {
            bound += 1;
        }

        if bound != params.len() {
            return Err(Error::ArgumentMismatch {
                advice: self.name().to_string(),
                expression: self.expression.clone(),
                expected: params.len(),
                bound,
            });
        }

        if let Some(index) = join_point_index {
            slots[index] = Some(match self.kind {
                AdviceKind::Around => AdviceArg::Proceeding(ProceedingJoinPoint { inv }),
                _ => AdviceArg::JoinPoint(JoinPoint { inv }),
            });
        }

        let args: Vec<AdviceArg<'_>> = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::illegal_state(format!("unfilled argument slot in advice '{}'", self.name())))?;

        trace!(advice = %self.name(), args = args.len(), "Invoking advice method");
        (self.method.body)(args).map_err(|e| match e {
            AdviceMethodError::Raised(err) => err,
            AdviceMethodError::Mismatch(message) => Error::InvocationMismatch {
                advice: self.name().to_string(),
                expression: self.expression.clone(),
                message,
            },
        })
    }

    fn check_type(&self, index: usize, name: &str, value: &Value) -> Result<()> {
        if let ParamKind::Value(ty) = &self.method.params()[index].kind {
            if !ty.accepts(value) {
                return Err(Error::InvocationMismatch {
                    advice: self.name().to_string(),
                    expression: self.expression.clone(),
                    message: format!(
                        "argument '{}' of type {} cannot be passed as {}",
                        name,
                        value.type_name(),
                        ty.name()
                    ),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for DeclaredAdvice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredAdvice")
            .field("kind", &self.kind)
            .field("method", &self.method.name())
            .field("pointcut", &self.expression)
            .finish()
    }
}

pub struct DeclaredAdviceBuilder {
    kind: AdviceKind,
    method: AdviceMethod,
    pointcut: Arc<dyn Pointcut>,
    arg_names: Option<Vec<String>>,
    returning: Option<String>,
    throwing: Option<String>,
    resolver: Arc<dyn ParameterNameResolver>,
}

impl DeclaredAdviceBuilder {
    /// Explicit parameter names, in order. The join point slot may be left out.
    pub fn arg_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arg_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn returning(mut self, name: impl Into<String>) -> Self {
        self.returning = Some(name.into());
        self
    }

    pub fn throwing(mut self, name: impl Into<String>) -> Self {
        self.throwing = Some(name.into());
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn ParameterNameResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Bindings are not computed here; see [`DeclaredAdvice::argument_bindings`].
    pub fn build(self) -> DeclaredAdvice {
        let expression = self.pointcut.expression();
        DeclaredAdvice {
            kind: self.kind,
            method: self.method,
            pointcut: self.pointcut,
            expression,
            arg_names: self.arg_names,
            returning: self.returning,
            throwing: self.throwing,
            resolver: self.resolver,
            bindings: OnceLock::new(),
            compute_lock: Mutex::new(()),
        }
    }
}

/// Runs declared advice at its position in the chain.
pub struct DeclaredAdviceInterceptor {
    advice: Arc<DeclaredAdvice>,
}

impl DeclaredAdviceInterceptor {
    pub fn new(advice: Arc<DeclaredAdvice>) -> Self {
        Self { advice }
    }
}

impl Interceptor for DeclaredAdviceInterceptor {
    fn invoke(&self, inv: &mut dyn MethodInvocation) -> Result<Value> {
        let advice = &self.advice;
        match advice.kind() {
            AdviceKind::Before => {
                advice.invoke_with(inv, None, None)?;
                inv.proceed()
            }
            AdviceKind::AfterReturning => {
                let ret = inv.proceed()?;
                if advice.accepts_return(&ret)? {
                    advice.invoke_with(inv, Some(&ret), None)?;
                } else {
                    trace!(advice = %advice.name(), returned = %ret.type_name(), "Return value does not match, advice skipped");
                }
                Ok(ret)
            }
            AdviceKind::AfterThrowing => match inv.proceed() {
                Ok(ret) => Ok(ret),
                Err(err) => {
                    if advice.accepts_error(&err)? {
                        advice.invoke_with(inv, None, Some(&err))?;
                    } else {
                        trace!(advice = %advice.name(), fault = %err.fault_type().name(), "Fault does not match, advice skipped");
                    }
                    Err(err)
                }
            },
            AdviceKind::After => {
                let outcome = inv.proceed();
                advice.invoke_with(inv, None, None)?;
                outcome
            }
            AdviceKind::Around => advice.invoke_with(inv, None, None),
        }
    }

    fn describe(&self) -> String {
        format!("{} {} ({})", self.advice.kind(), self.advice.name(), self.advice.expression())
    }
}
