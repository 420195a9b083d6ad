//! Tests for interpose-core: type model, values, objects, errors

use interpose_core::*;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

fn counter_type() -> TypeRef {
    TypeBuilder::class("Counter")
        .operation(Operation::new("increment").param(&builtin::int()).returns(&builtin::int()))
        .operation(Operation::new("myself").returns(&builtin::any()))
        .build()
}

fn counter() -> ObjectRef {
    let total = Arc::new(AtomicI64::new(0));
    ClosureObject::builder(&counter_type())
        .on("increment", move |_, args| {
            let by = args.first().and_then(Value::as_int).unwrap_or(1);
            Ok(Value::Int(total.fetch_add(by, Ordering::SeqCst) + by))
        })
        .on("myself", |this, _| Ok(Value::Object(this.clone())))
        .build()
}

// ===========================================================================
// ClosureObject
// ===========================================================================

#[test]
fn closure_object_dispatches_by_operation_name() {
    let obj = counter();
    let op = obj.type_ref().find_operation("increment").unwrap();
    assert_eq!(obj.clone().invoke(&op, vec![Value::Int(2)]).unwrap(), Value::Int(2));
    assert_eq!(obj.clone().invoke(&op, vec![Value::Int(3)]).unwrap(), Value::Int(5));
}

#[test]
fn closure_object_can_return_itself() {
    let obj = counter();
    let op = obj.type_ref().find_operation("myself").unwrap();
    let result = obj.clone().invoke(&op, vec![]).unwrap();
    assert!(same_object(result.as_object().unwrap(), &obj));
}

#[test]
fn closure_object_unknown_operation_is_an_error() {
    let obj = counter();
    let err = obj.invoke(&Operation::new("missing"), vec![]).unwrap_err();
    assert!(matches!(err, Error::NoSuchOperation { .. }));
    assert!(err.to_string().contains("Counter.missing"));
}

// ===========================================================================
// Value
// ===========================================================================

#[test]
fn value_equality_uses_object_identity() {
    let a = counter();
    let b = counter();
    assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
    assert_ne!(Value::Object(a), Value::Object(b));
}

#[test]
fn value_from_json() {
    let v = Value::from(serde_json::json!([1, "two", true, null]));
    assert_eq!(
        v,
        Value::List(vec![Value::Int(1), Value::str("two"), Value::Bool(true), Value::Null])
    );
}

#[test]
fn value_runtime_type_names() {
    assert_eq!(Value::Int(1).type_name(), "int");
    assert_eq!(Value::Null.type_name(), "null");
    assert_eq!(Value::Object(counter()).type_name(), "Counter");
}

// ===========================================================================
// Faults and errors
// ===========================================================================

#[test]
fn fault_subtypes_are_assignable() {
    let io = TypeBuilder::fault("IOFailure").build();
    let disk = TypeBuilder::fault("DiskFailure").extends(&io).build();
    let net = TypeBuilder::fault("NetworkFailure").build();

    let fault = Fault::new(&disk, "disk full");
    assert!(fault.is_a(&io));
    assert!(fault.is_a(&builtin::fault()));
    assert!(!Fault::new(&net, "down").is_a(&io));
}

#[test]
fn raised_error_keeps_fault_identity() {
    let net = TypeBuilder::fault("NetworkFailure").build();
    let err = Error::raised(&net, "connection reset");
    assert_eq!(err.fault_type().name(), "NetworkFailure");
    assert_eq!(err.to_string(), "NetworkFailure: connection reset");
    assert!(!err.is_configuration());
}

#[test]
fn engine_errors_report_root_fault_type() {
    let err = Error::NullReturn { operation: "Counter.increment".into() };
    assert_eq!(err.fault_type().name(), builtin::FAULT);
    assert!(Error::Frozen.is_configuration());
}

#[test]
fn fault_cause_chain_is_preserved() {
    let io = TypeBuilder::fault("IOFailure").build();
    let root = Fault::new(&io, "socket closed");
    let outer = Fault::new(&builtin::fault(), "request failed").with_cause(root);
    assert_eq!(outer.cause().unwrap().message(), "socket closed");
    assert!(std::error::Error::source(&outer).is_some());
}
