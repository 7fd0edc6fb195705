//! Expression Error Types

use feature_model::ValueType;
use thiserror::Error;

/// Errors while parsing or type-checking an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// Malformed expression text
    #[error("Parse error at offset {position}: {message}")]
    Parse { position: usize, message: String },

    /// Column not present in the input schema
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Function {function} expects {expected} arguments, got {actual}")]
    Arity {
        function: &'static str,
        expected: String,
        actual: usize,
    },

    /// Operand types not accepted by an operator or function
    #[error("Type error: {0}")]
    Type(String),

    #[error("Literal {literal} does not fit in {target}")]
    LiteralOutOfRange { literal: String, target: ValueType },

    #[error("Duplicate output: {0}")]
    DuplicateOutput(String),
}

impl ExprError {
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }
}

/// Errors while evaluating a compiled expression on a row
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Input column {0} missing from row")]
    MissingColumn(String),

    #[error("Input column {column} has type {actual}, compiled for {expected}")]
    ColumnType {
        column: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("Integer overflow in {0}")]
    Overflow(String),

    #[error("Integer division by zero")]
    DivisionByZero,

    #[error("Cannot convert {value} to {target}")]
    InvalidCast { value: String, target: ValueType },
}
