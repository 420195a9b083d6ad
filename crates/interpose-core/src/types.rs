//! Runtime type model
//!
//! Types are immutable once built and shared as `TypeRef`. Identity is by
//! name: a model is expected to use each name once.

use crate::builtin;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

pub type TypeRef = Arc<TypeDescriptor>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Interface,
    Primitive,
}

/// An operation signature as declared on a type.
#[derive(Clone, Debug)]
pub struct Operation {
    name: String,
    declaring_type: String,
    params: Vec<TypeRef>,
    returns: Option<TypeRef>,
    is_final: bool,
    tags: Vec<String>,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_type: String::new(),
            params: Vec::new(),
            returns: None,
            is_final: false,
            tags: Vec::new(),
        }
    }

    pub fn param(mut self, ty: &TypeRef) -> Self {
        self.params.push(ty.clone());
        self
    }

    pub fn returns(mut self, ty: &TypeRef) -> Self {
        self.returns = Some(ty.clone());
        self
    }

    pub fn final_op(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub(crate) fn declared_on(mut self, type_name: &str) -> Self {
        self.declaring_type = type_name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn params(&self) -> &[TypeRef] {
        &self.params
    }

    pub fn return_type(&self) -> Option<&TypeRef> {
        self.returns.as_ref()
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// `name(p1,p2)`, independent of the declaring type.
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.name()).collect();
        format!("{}({})", self.name, params.join(","))
    }

    /// `Decl.name(p1,p2)`, the stable cache key for this operation.
    pub fn key(&self) -> String {
        format!("{}.{}", self.declaring_type, self.signature())
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.name)
    }

    pub fn same_signature(&self, other: &Operation) -> bool {
        self.name == other.name
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.name() == b.name())
    }

    /// True when the declared result must never be null.
    pub fn returns_primitive(&self) -> bool {
        self.returns.as_ref().is_some_and(|r| r.is_primitive())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())?;
        if let Some(ret) = &self.returns {
            write!(f, " -> {}", ret.name())?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
    super_type: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    operations: Vec<Arc<Operation>>,
    is_final: bool,
    generated: bool,
    substituted_from: Option<TypeRef>,
    tags: Vec<String>,
}

impl TypeDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_primitive(&self) -> bool {
        self.kind == TypeKind::Primitive
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Interface with no operations of its own or inherited.
    pub fn is_marker(&self) -> bool {
        self.is_interface() && self.all_operations().is_empty()
    }

    /// True for types produced by proxy construction.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// The type a generated type stands in for.
    pub fn substituted_from(&self) -> Option<&TypeRef> {
        self.substituted_from.as_ref()
    }

    pub fn super_type(&self) -> Option<&TypeRef> {
        self.super_type.as_ref()
    }

    pub fn interfaces(&self) -> &[TypeRef] {
        &self.interfaces
    }

    /// Operations declared directly on this type.
    pub fn operations(&self) -> &[Arc<Operation>] {
        &self.operations
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// True if a value of type `other` can be used where `self` is expected.
    pub fn is_assignable_from(&self, other: &TypeDescriptor) -> bool {
        if self.name == builtin::ANY || self.name == other.name {
            return true;
        }
        if let Some(parent) = &other.super_type {
            if self.is_assignable_from(parent) {
                return true;
            }
        }
        other.interfaces.iter().any(|i| self.is_assignable_from(i))
    }

    /// True if `value` may be stored in a slot of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        if self.name == builtin::ANY {
            return !matches!(value, Value::Unit);
        }
        match value {
            Value::Unit => false,
            Value::Null => !self.is_primitive(),
            Value::Bool(_) => self.name == builtin::BOOL,
            Value::Int(_) => self.name == builtin::INT,
            Value::Float(_) => self.name == builtin::FLOAT,
            Value::Str(_) => self.name == builtin::STRING,
            Value::List(_) => self.name == builtin::LIST,
            Value::Fault(fault) => self.is_assignable_from(fault.fault_type()),
            Value::Object(obj) => self.is_assignable_from(&obj.type_ref()),
        }
    }

    /// All interfaces this type implements, transitively, without itself.
    pub fn all_interfaces(&self) -> Vec<TypeRef> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_interfaces(&mut seen, &mut out);
        out
    }

    fn collect_interfaces(&self, seen: &mut HashSet<String>, out: &mut Vec<TypeRef>) {
        for iface in &self.interfaces {
            if seen.insert(iface.name.clone()) {
                out.push(iface.clone());
            }
            iface.collect_interfaces(seen, out);
        }
        if let Some(parent) = &self.super_type {
            parent.collect_interfaces(seen, out);
        }
    }

    /// Declared and inherited operations. A declaration closer to this type
    /// hides an inherited one with the same signature.
    pub fn all_operations(&self) -> Vec<Arc<Operation>> {
        let mut out: Vec<Arc<Operation>> = Vec::new();
        self.collect_operations(&mut out);
        out
    }

    fn collect_operations(&self, out: &mut Vec<Arc<Operation>>) {
        for op in &self.operations {
            if !out.iter().any(|o| o.same_signature(op)) {
                out.push(op.clone());
            }
        }
        if let Some(parent) = &self.super_type {
            parent.collect_operations(out);
        }
        for iface in &self.interfaces {
            iface.collect_operations(out);
        }
    }

    pub fn find_operation(&self, name: &str) -> Option<Arc<Operation>> {
        self.all_operations().into_iter().find(|op| op.name() == name)
    }

    /// Look up an operation by name and parameter types.
    pub fn find_signature(&self, op: &Operation) -> Option<Arc<Operation>> {
        self.all_operations()
            .into_iter()
            .find(|candidate| candidate.same_signature(op))
    }

    /// True if this type or one of its supertypes declares `name`.
    pub fn defines_operation(&self, name: &str) -> bool {
        self.all_operations().iter().any(|op| op.name() == name)
    }

    /// Find this type or one of its supertypes by name.
    pub fn find_supertype(self: &Arc<Self>, name: &str) -> Option<TypeRef> {
        if self.name == name {
            return Some(self.clone());
        }
        if let Some(found) = self.super_type.as_ref().and_then(|p| p.find_supertype(name)) {
            return Some(found);
        }
        self.interfaces.iter().find_map(|i| i.find_supertype(name))
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Builder for [`TypeDescriptor`].
pub struct TypeBuilder {
    name: String,
    kind: TypeKind,
    super_type: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    operations: Vec<Operation>,
    is_final: bool,
    generated: bool,
    substituted_from: Option<TypeRef>,
    tags: Vec<String>,
}

impl TypeBuilder {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            super_type: None,
            interfaces: Vec::new(),
            operations: Vec::new(),
            is_final: false,
            generated: false,
            substituted_from: None,
            tags: Vec::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Primitive).final_type()
    }

    /// A fault type, rooted at the builtin `Fault` class.
    pub fn fault(name: impl Into<String>) -> Self {
        Self::class(name).extends(&builtin::fault())
    }

    pub fn extends(mut self, parent: &TypeRef) -> Self {
        self.super_type = Some(parent.clone());
        self
    }

    pub fn implements(mut self, iface: &TypeRef) -> Self {
        self.interfaces.push(iface.clone());
        self
    }

    pub fn operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    pub fn final_type(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Mark the type as produced by proxy construction on behalf of `original`.
    pub fn generated(mut self, original: Option<&TypeRef>) -> Self {
        self.generated = true;
        self.substituted_from = original.cloned();
        self
    }

    pub fn build(self) -> TypeRef {
        let name = self.name;
        let operations = self
            .operations
            .into_iter()
            .map(|op| Arc::new(op.declared_on(&name)))
            .collect();
        Arc::new(TypeDescriptor {
            name,
            kind: self.kind,
            super_type: self.super_type,
            interfaces: self.interfaces,
            operations,
            is_final: self.is_final,
            generated: self.generated,
            substituted_from: self.substituted_from,
            tags: self.tags,
        })
    }
}
