//! # Type registry
//!
//! Built-in type objects and their operator tables, kept as plain data so
//! that type checking reduces to two lookups and an equality test (see the
//! language spec's design notes on operator tables as data).

use std::collections::HashMap;
use std::fmt::Display;

use once_cell::sync::Lazy;

/// A compile-time literal value, used both as a type's default value and
/// as the payload of a `Literal` expression.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

/// Operators recognized by the type algebra; shared between binary,
/// relational/logical and unary positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Not,
    Pos,
    Neg,
}

/// A built-in Gone type: a name, a default value and the operators it
/// supports, each mapped to the name of the type its application produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeObject {
    pub name: &'static str,
    pub binary_ops: &'static [(Op, &'static str)],
    pub unary_ops: &'static [(Op, &'static str)],
}

impl TypeObject {
    pub fn binary_result(&self, op: Op) -> Option<&'static str> {
        self.binary_ops
            .iter()
            .find(|(candidate, _)| *candidate == op)
            .map(|(_, result)| *result)
    }

    pub fn unary_result(&self, op: Op) -> Option<&'static str> {
        self.unary_ops
            .iter()
            .find(|(candidate, _)| *candidate == op)
            .map(|(_, result)| *result)
    }
}

/// Sentinel type name used once checking has already reported an error for
/// an expression, so later rules don't cascade unrelated diagnostics.
pub const ERROR_TYPE: &str = "error";

const INT_BINARY: &[(Op, &str)] = &[
    (Op::Add, "int"),
    (Op::Sub, "int"),
    (Op::Mul, "int"),
    (Op::Div, "int"),
    (Op::Lt, "bool"),
    (Op::Le, "bool"),
    (Op::Gt, "bool"),
    (Op::Ge, "bool"),
    (Op::Eq, "bool"),
    (Op::Ne, "bool"),
];
const INT_UNARY: &[(Op, &str)] = &[(Op::Pos, "int"), (Op::Neg, "int")];

const FLOAT_BINARY: &[(Op, &str)] = &[
    (Op::Add, "float"),
    (Op::Sub, "float"),
    (Op::Mul, "float"),
    (Op::Div, "float"),
    (Op::Lt, "bool"),
    (Op::Le, "bool"),
    (Op::Gt, "bool"),
    (Op::Ge, "bool"),
    (Op::Eq, "bool"),
    (Op::Ne, "bool"),
];
const FLOAT_UNARY: &[(Op, &str)] = &[(Op::Pos, "float"), (Op::Neg, "float")];

const BOOL_BINARY: &[(Op, &str)] = &[
    (Op::Eq, "bool"),
    (Op::Ne, "bool"),
    (Op::And, "bool"),
    (Op::Or, "bool"),
];
const BOOL_UNARY: &[(Op, &str)] = &[(Op::Not, "bool")];

const STRING_BINARY: &[(Op, &str)] = &[(Op::Add, "string")];
const STRING_UNARY: &[(Op, &str)] = &[];

/// The four built-in types, keyed by name. Populated once and shared for
/// the lifetime of the process; a single compilation never mutates it.
pub static TYPES: Lazy<HashMap<&'static str, TypeObject>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(
        "int",
        TypeObject {
            name: "int",
            binary_ops: INT_BINARY,
            unary_ops: INT_UNARY,
        },
    );
    map.insert(
        "float",
        TypeObject {
            name: "float",
            binary_ops: FLOAT_BINARY,
            unary_ops: FLOAT_UNARY,
        },
    );
    map.insert(
        "bool",
        TypeObject {
            name: "bool",
            binary_ops: BOOL_BINARY,
            unary_ops: BOOL_UNARY,
        },
    );
    map.insert(
        "string",
        TypeObject {
            name: "string",
            binary_ops: STRING_BINARY,
            unary_ops: STRING_UNARY,
        },
    );
    map
});

pub fn lookup(name: &str) -> Option<&'static TypeObject> {
    TYPES.get(name)
}

pub fn is_builtin(name: &str) -> bool {
    TYPES.contains_key(name)
}

pub fn default_value(name: &str) -> Option<Value> {
    match name {
        "int" => Some(Value::Integer(0)),
        "float" => Some(Value::Float(0.0)),
        "bool" => Some(Value::Boolean(false)),
        "string" => Some(Value::String(String::new())),
        _ => None,
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_arithmetic_and_comparison() {
        let int = lookup("int").unwrap();
        assert_eq!(int.binary_result(Op::Add), Some("int"));
        assert_eq!(int.binary_result(Op::Lt), Some("bool"));
        assert_eq!(int.unary_result(Op::Neg), Some("int"));
        assert_eq!(int.unary_result(Op::Not), None);
    }

    #[test]
    fn test_string_only_supports_concatenation() {
        let string = lookup("string").unwrap();
        assert_eq!(string.binary_result(Op::Add), Some("string"));
        assert_eq!(string.binary_result(Op::Sub), None);
        assert_eq!(string.binary_result(Op::Lt), None);
    }

    #[test]
    fn test_bool_logical_ops() {
        let b = lookup("bool").unwrap();
        assert_eq!(b.binary_result(Op::And), Some("bool"));
        assert_eq!(b.binary_result(Op::Or), Some("bool"));
        assert_eq!(b.unary_result(Op::Not), Some("bool"));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(default_value("int"), Some(Value::Integer(0)));
        assert_eq!(default_value("float"), Some(Value::Float(0.0)));
        assert_eq!(default_value("bool"), Some(Value::Boolean(false)));
        assert_eq!(default_value("string"), Some(Value::String(String::new())));
    }
}
