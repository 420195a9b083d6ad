//! Interpose Core - runtime type model, values, objects and error handling

pub mod builtin;
pub mod error;
pub mod object;
pub mod types;
pub mod value;

pub use error::{Error, Fault, Result};
pub use object::{same_object, ClosureObject, ClosureObjectBuilder, Object, ObjectRef};
pub use types::{Operation, TypeBuilder, TypeDescriptor, TypeKind, TypeRef};
pub use value::Value;
