//! Error types for Interpose
//!
//! Three families share one enum: configuration errors raised while a
//! proxy or an advice binding is being built, dispatch faults raised by
//! the engine during a call, and `Raised` faults coming out of a target
//! or an advice body. Raised faults are carried through untouched.

use crate::builtin;
use crate::types::TypeRef;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("config error: configuration is frozen and cannot be changed")]
    Frozen,

    #[error("config error: cannot proxy {proxy} by subclass substitution: target type is not determinable")]
    MissingTargetClass { proxy: String },

    #[error("config error: cannot subclass final type {type_name}")]
    FinalClass { type_name: String },

    #[error("config error: no advisors and no target source specified")]
    NoTargetOrAdvisors,

    #[error("binding error in advice '{advice}': {message}")]
    Binding { advice: String, message: String },

    #[error("config error: pointcut '{expression}' is dynamic and cannot be decided statically")]
    DynamicMatcher { expression: String },

    #[error("config error: matcher '{matcher}' is static and has no runtime check for {operation}")]
    StaticMatcher { matcher: String, operation: String },

    #[error("argument mismatch in advice '{advice}' ({expression}): required to bind {expected} arguments but bound {bound}")]
    ArgumentMismatch {
        advice: String,
        expression: String,
        expected: usize,
        bound: usize,
    },

    #[error("invocation mismatch in advice '{advice}' ({expression}): {message}")]
    InvocationMismatch {
        advice: String,
        expression: String,
        message: String,
    },

    #[error("null return value from operation '{operation}' that does not allow it")]
    NullReturn { operation: String },

    #[error("no such operation: {target}.{operation}")]
    NoSuchOperation { operation: String, target: String },

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("{0}")]
    Raised(Fault),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn binding(advice: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Binding {
            advice: advice.into(),
            message: message.into(),
        }
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    pub fn no_such_operation(operation: impl Into<String>, target: impl Into<String>) -> Self {
        Self::NoSuchOperation {
            operation: operation.into(),
            target: target.into(),
        }
    }

    /// Raise a fault of the given type.
    pub fn raised(fault_type: &TypeRef, message: impl Into<String>) -> Self {
        Self::Raised(Fault::new(fault_type, message))
    }

    /// True for errors detected while building a proxy or binding advice.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Frozen
                | Self::MissingTargetClass { .. }
                | Self::FinalClass { .. }
                | Self::NoTargetOrAdvisors
                | Self::Binding { .. }
                | Self::DynamicMatcher { .. }
                | Self::StaticMatcher { .. }
        )
    }

    /// The raised fault, if this error came out of a target or advice body.
    pub fn as_fault(&self) -> Option<&Fault> {
        match self {
            Self::Raised(fault) => Some(fault),
            _ => None,
        }
    }

    /// Type used when matching this error against after-throwing filters.
    /// Engine errors report the root fault type.
    pub fn fault_type(&self) -> TypeRef {
        match self {
            Self::Raised(fault) => fault.fault_type().clone(),
            _ => builtin::fault(),
        }
    }

    /// Convert into a fault value suitable for binding to an advice parameter.
    pub fn to_fault(&self) -> Fault {
        match self {
            Self::Raised(fault) => fault.clone(),
            other => Fault::new(&builtin::fault(), other.to_string()),
        }
    }
}

/// A fault raised by a target operation or an advice body.
#[derive(Debug, Clone)]
pub struct Fault {
    fault_type: TypeRef,
    message: String,
    cause: Option<Box<Fault>>,
}

impl Fault {
    pub fn new(fault_type: &TypeRef, message: impl Into<String>) -> Self {
        Self {
            fault_type: fault_type.clone(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: Fault) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn fault_type(&self) -> &TypeRef {
        &self.fault_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&Fault> {
        self.cause.as_deref()
    }

    /// True if this fault's type is `ty` or a subtype of it.
    pub fn is_a(&self, ty: &TypeRef) -> bool {
        ty.is_assignable_from(&self.fault_type)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.fault_type.name(), self.message)
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        Self::Raised(fault)
    }
}
