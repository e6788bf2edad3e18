//! Semantic error variants, each carrying only the detail its message
//! needs. Checking never constructs these to control flow — they are
//! formatted once and handed to the shared [`Reporter`](crate::diagnostics::Reporter);
//! the checker always continues after reporting one.

use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeCheckError {
    UndefinedType {
        name: String,
    },
    UndefinedIdentifier {
        name: String,
    },
    Redefinition {
        name: String,
        prior_line: usize,
    },
    AssignToConstant {
        name: String,
    },
    AssignTypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    InitializerTypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    OperatorUnsupported {
        op: String,
        ty: String,
    },
    OperandTypeMismatch {
        left: String,
        right: String,
    },
    ConditionNotBoolean {
        actual: String,
    },
    NotCallable {
        name: String,
    },
    CallArityMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    CallArgumentTypeMismatch {
        name: String,
        index: usize,
        expected: String,
        actual: String,
    },
    ReturnOutsideFunction,
    ReturnTypeMismatch {
        expected: String,
        actual: String,
    },
    NestedFunction,
    MayFallOffEnd {
        name: String,
    },
}

impl Display for TypeCheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeCheckError::UndefinedType { name } => write!(f, "Undefined type '{name}'"),
            TypeCheckError::UndefinedIdentifier { name } => {
                write!(f, "Undefined identifier '{name}'")
            }
            TypeCheckError::Redefinition { name, prior_line } => write!(
                f,
                "Redefinition of '{name}' (originally declared on line {prior_line})"
            ),
            TypeCheckError::AssignToConstant { name } => {
                write!(f, "Cannot assign to constant '{name}'")
            }
            TypeCheckError::AssignTypeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "Cannot assign value of type '{actual}' to '{name}' of type '{expected}'"
            ),
            TypeCheckError::InitializerTypeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "Cannot initialize '{name}' of type '{expected}' with value of type '{actual}'"
            ),
            TypeCheckError::OperatorUnsupported { op, ty } => {
                write!(f, "Operator '{op}' is not supported for type '{ty}'")
            }
            TypeCheckError::OperandTypeMismatch { left, right } => {
                write!(f, "Operand types do not match: '{left}' vs '{right}'")
            }
            TypeCheckError::ConditionNotBoolean { actual } => {
                write!(f, "Condition must be 'bool', got '{actual}'")
            }
            TypeCheckError::NotCallable { name } => write!(f, "'{name}' is not a function"),
            TypeCheckError::CallArityMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "'{name}' expects {expected} argument(s) but got {actual}"
            ),
            TypeCheckError::CallArgumentTypeMismatch {
                name,
                index,
                expected,
                actual,
            } => write!(
                f,
                "Argument {index} of call to '{name}' expects '{expected}' but got '{actual}'"
            ),
            TypeCheckError::ReturnOutsideFunction => {
                write!(f, "Return statement outside of a function")
            }
            TypeCheckError::ReturnTypeMismatch { expected, actual } => write!(
                f,
                "Return type mismatch: expected '{expected}' but got '{actual}'"
            ),
            TypeCheckError::NestedFunction => {
                write!(f, "Nested function declarations are not allowed")
            }
            TypeCheckError::MayFallOffEnd { name } => write!(
                f,
                "Function '{name}' may fall off its end without returning"
            ),
        }
    }
}

impl std::error::Error for TypeCheckError {}
