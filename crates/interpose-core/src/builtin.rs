//! Builtin types: primitives, the fault root, and the marker capabilities
//! every dispatch object carries.

use crate::types::{Operation, TypeBuilder, TypeRef};
use std::sync::{Arc, OnceLock};

pub const ANY: &str = "any";
pub const BOOL: &str = "bool";
pub const INT: &str = "int";
pub const FLOAT: &str = "float";
pub const STRING: &str = "string";
pub const LIST: &str = "list";
pub const FAULT: &str = "Fault";
pub const AOP_PROXY: &str = "AopProxy";
pub const ADVISED: &str = "Advised";
pub const DECORATING_PROXY: &str = "DecoratingProxy";
pub const RAW_TARGET_ACCESS: &str = "RawTargetAccess";

pub const EQUALS: &str = "equals";
pub const HASH_CODE: &str = "hash_code";
pub const DECORATED_TYPE: &str = "decorated_type";

macro_rules! builtin_type {
    ($fn_name:ident, $init:expr) => {
        pub fn $fn_name() -> TypeRef {
            static TYPE: OnceLock<TypeRef> = OnceLock::new();
            TYPE.get_or_init(|| $init).clone()
        }
    };
}

builtin_type!(any, TypeBuilder::class(ANY).build());
builtin_type!(bool_type, TypeBuilder::primitive(BOOL).build());
builtin_type!(int, TypeBuilder::primitive(INT).build());
builtin_type!(float, TypeBuilder::primitive(FLOAT).build());
builtin_type!(string, TypeBuilder::class(STRING).final_type().build());
builtin_type!(list, TypeBuilder::class(LIST).final_type().build());
builtin_type!(fault, TypeBuilder::class(FAULT).build());

builtin_type!(aop_proxy, TypeBuilder::interface(AOP_PROXY).build());
builtin_type!(raw_target_access, TypeBuilder::interface(RAW_TARGET_ACCESS).build());

builtin_type!(
    decorating_proxy,
    TypeBuilder::interface(DECORATING_PROXY)
        .operation(Operation::new(DECORATED_TYPE).returns(&string()))
        .build()
);

builtin_type!(
    advised,
    TypeBuilder::interface(ADVISED)
        .operation(Operation::new("is_frozen").returns(&bool_type()))
        .operation(Operation::new("is_proxy_target_class").returns(&bool_type()))
        .operation(Operation::new("is_expose_proxy").returns(&bool_type()))
        .operation(Operation::new("advisor_count").returns(&int()))
        .operation(Operation::new("proxied_interfaces").returns(&list()))
        .operation(Operation::new("target_type_name").returns(&string()))
        .operation(Operation::new("describe").returns(&string()))
        .build()
);

fn object_protocol() -> TypeRef {
    static TYPE: OnceLock<TypeRef> = OnceLock::new();
    TYPE.get_or_init(|| {
        TypeBuilder::interface(ANY)
            .operation(Operation::new(EQUALS).param(&any()).returns(&bool_type()))
            .operation(Operation::new(HASH_CODE).returns(&int()))
            .build()
    })
    .clone()
}

/// `equals(any) -> bool`, answered by dispatch objects whose target does not define it.
pub fn equals_op() -> Arc<Operation> {
    object_protocol().operations()[0].clone()
}

/// `hash_code() -> int`, answered by dispatch objects whose target does not define it.
pub fn hash_code_op() -> Arc<Operation> {
    object_protocol().operations()[1].clone()
}

/// Names of the capabilities added to every dispatch object.
pub fn is_proxy_marker(name: &str) -> bool {
    matches!(name, AOP_PROXY | ADVISED | DECORATING_PROXY)
}
