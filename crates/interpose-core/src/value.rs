//! Dynamic values passed as arguments and results through dispatch objects

use crate::builtin;
use crate::error::Fault;
use crate::object::{same_object, ObjectRef};
use crate::types::TypeRef;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub enum Value {
    /// Result of an operation with no declared return type.
    Unit,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Vec<Value>),
    Fault(Box<Fault>),
    Object(ObjectRef),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Self::Str(Arc::from(s.as_ref()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Null or unit: no usable value.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Null | Self::Unit)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_fault(&self) -> Option<&Fault> {
        match self {
            Self::Fault(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Runtime type of the value. Unit and null have none.
    pub fn runtime_type(&self) -> Option<TypeRef> {
        match self {
            Self::Unit | Self::Null => None,
            Self::Bool(_) => Some(builtin::bool_type()),
            Self::Int(_) => Some(builtin::int()),
            Self::Float(_) => Some(builtin::float()),
            Self::Str(_) => Some(builtin::string()),
            Self::List(_) => Some(builtin::list()),
            Self::Fault(f) => Some(f.fault_type().clone()),
            Self::Object(o) => Some(o.type_ref()),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Self::Unit => "unit".to_string(),
            Self::Null => "null".to_string(),
            other => other
                .runtime_type()
                .map(|t| t.name().to_string())
                .unwrap_or_default(),
        }
    }

    /// JSON rendering used for logging. Objects render as their type name.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Unit | Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(i) => Json::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::Str(s) => Json::String(s.to_string()),
            Self::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Self::Fault(f) => Json::String(f.to_string()),
            Self::Object(o) => Json::String(format!("<{}>", o.type_ref().name())),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Fault(a), Self::Fault(b)) => {
                a.fault_type().name() == b.fault_type().name() && a.message() == b.message()
            }
            (Self::Object(a), Self::Object(b)) => same_object(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Self::Object(o)
    }
}

impl From<Fault> for Value {
    fn from(f: Fault) -> Self {
        Self::Fault(Box::new(f))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            Json::String(s) => Self::from(s),
            Json::Array(items) => Self::List(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Self::str(Json::Object(map).to_string()),
        }
    }
}
