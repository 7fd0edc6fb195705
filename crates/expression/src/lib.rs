//! Transformation Expression Language
//!
//! A small, pure expression language used as the portable body of on-demand
//! feature transformations. Expressions are parsed once, type-checked against
//! the view's merged input schema and evaluated row by row. Evaluation has no
//! access to anything but the row it is given.

mod ast;
mod error;
mod eval;
mod lexer;
mod parser;
mod program;
mod typed;

pub use ast::{Arity, BinaryOp, Expr, Function, Literal, UnaryOp};
pub use error::{EvalError, ExprError};
pub use parser::parse;
pub use program::{Program, ProgramError, ProgramEvalError};
pub use typed::{compile, TypedExpr};
