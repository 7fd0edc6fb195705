//! Type Inference and Compilation to Typed Trees
//!
//! Every node of a [`TypedExpr`] carries its result type. Implicit numeric
//! widening is made explicit as `Cast` nodes and literal operands are folded
//! into the type of the operand they combine with, so evaluation never has to
//! decide a type at run time.

use crate::ast::{BinaryOp, Expr, Function, Literal, UnaryOp};
use crate::error::ExprError;
use crate::eval::cast_value;
use feature_model::{Value, ValueType};
use std::collections::BTreeMap;

/// Expression with resolved types, ready for evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    pub(crate) node: Node,
    pub(crate) ty: ValueType,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Literal(Value),
    Column(String),
    /// Convert the operand to the node's type
    Cast(Box<TypedExpr>),
    Unary(UnaryOp, Box<TypedExpr>),
    /// Operands share one type; for arithmetic it is also the result type
    Binary(BinaryOp, Box<TypedExpr>, Box<TypedExpr>),
    Call(Function, Vec<TypedExpr>),
}

impl TypedExpr {
    /// Result type of the expression
    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    fn new(node: Node, ty: ValueType) -> Self {
        Self { node, ty }
    }
}

/// Compiled subexpression plus whether its type is still negotiable.
///
/// Numeric literals (and `null`) are weak: combined with a typed operand they
/// take that operand's type, so `float32_col * 100` stays `float32`.
struct Typed {
    expr: TypedExpr,
    weak: bool,
}

impl Typed {
    fn strong(expr: TypedExpr) -> Self {
        Self { expr, weak: false }
    }

    fn ty(&self) -> ValueType {
        self.expr.ty
    }
}

/// Type-check `expr` against an input schema and produce a typed tree
pub fn compile(expr: &Expr, schema: &BTreeMap<String, ValueType>) -> Result<TypedExpr, ExprError> {
    Ok(Compiler { schema }.compile(expr)?.expr)
}

struct Compiler<'a> {
    schema: &'a BTreeMap<String, ValueType>,
}

impl Compiler<'_> {
    fn compile(&self, expr: &Expr) -> Result<Typed, ExprError> {
        match expr {
            Expr::Literal(literal) => Ok(compile_literal(literal)),
            Expr::Column(name) => {
                let ty = self
                    .schema
                    .get(name)
                    .copied()
                    .ok_or_else(|| ExprError::UnknownColumn(name.clone()))?;
                Ok(Typed::strong(TypedExpr::new(Node::Column(name.clone()), ty)))
            }
            Expr::Unary { op, operand } => self.compile_unary(*op, operand),
            Expr::Binary { op, left, right } => self.compile_binary(*op, left, right),
            Expr::Call { func, args } => self.compile_call(*func, args),
        }
    }

    fn compile_unary(&self, op: UnaryOp, operand: &Expr) -> Result<Typed, ExprError> {
        let operand = self.compile(operand)?;
        match op {
            UnaryOp::Neg => {
                if !operand.ty().is_numeric() && operand.ty() != ValueType::Null {
                    return Err(ExprError::type_error(format!(
                        "cannot negate {}",
                        operand.ty()
                    )));
                }
                let ty = operand.ty();
                Ok(Typed {
                    expr: TypedExpr::new(Node::Unary(op, Box::new(operand.expr)), ty),
                    weak: operand.weak,
                })
            }
            UnaryOp::Not => {
                let inner = coerce(operand, ValueType::Bool)?;
                Ok(Typed::strong(TypedExpr::new(
                    Node::Unary(op, Box::new(inner)),
                    ValueType::Bool,
                )))
            }
        }
    }

    fn compile_binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Typed, ExprError> {
        let left = self.compile(left)?;
        let right = self.compile(right)?;

        match op {
            BinaryOp::And | BinaryOp::Or => {
                let l = coerce(left, ValueType::Bool)?;
                let r = coerce(right, ValueType::Bool)?;
                Ok(Typed::strong(binary(op, l, r, ValueType::Bool)))
            }
            _ if op.is_comparison() => {
                let (ty, _) = unify(&left, &right, op.symbol())?;
                if !matches!(op, BinaryOp::Eq | BinaryOp::NotEq) && !is_ordered(ty) {
                    return Err(ExprError::type_error(format!(
                        "operator {} not defined for {}",
                        op.symbol(),
                        ty
                    )));
                }
                let l = coerce(left, ty)?;
                let r = coerce(right, ty)?;
                Ok(Typed::strong(binary(op, l, r, ValueType::Bool)))
            }
            BinaryOp::Add if is_stringish(&left) && is_stringish(&right) && has_string(&left, &right) => {
                let l = coerce(left, ValueType::String)?;
                let r = coerce(right, ValueType::String)?;
                Ok(Typed::strong(binary(op, l, r, ValueType::String)))
            }
            _ => {
                let (mut ty, weak) = numeric_unify(&left, &right, op.symbol())?;
                if op == BinaryOp::Div && ty.is_integer() {
                    ty = ValueType::Float64;
                }
                let l = coerce(left, ty)?;
                let r = coerce(right, ty)?;
                Ok(Typed {
                    expr: binary(op, l, r, ty),
                    weak,
                })
            }
        }
    }

    fn compile_call(&self, func: Function, args: &[Expr]) -> Result<Typed, ExprError> {
        let mut args = args
            .iter()
            .map(|a| self.compile(a))
            .collect::<Result<Vec<_>, _>>()?;

        match func {
            Function::Abs | Function::Floor | Function::Ceil | Function::Round => {
                let arg = args.remove(0);
                require_numeric(func, arg.ty())?;
                let ty = arg.ty();
                let weak = arg.weak;
                Ok(Typed {
                    expr: TypedExpr::new(Node::Call(func, vec![arg.expr]), ty),
                    weak,
                })
            }
            Function::Sqrt | Function::Ln | Function::Exp => {
                let arg = args.remove(0);
                require_numeric(func, arg.ty())?;
                let ty = float_of(arg.ty());
                let weak = arg.weak;
                let arg = coerce(arg, ty)?;
                Ok(Typed {
                    expr: TypedExpr::new(Node::Call(func, vec![arg]), ty),
                    weak,
                })
            }
            Function::Pow | Function::Min | Function::Max => {
                let right = args.remove(1);
                let left = args.remove(0);
                let (mut ty, weak) = numeric_unify(&left, &right, func.name())?;
                if func == Function::Pow {
                    ty = float_of(ty);
                }
                let l = coerce(left, ty)?;
                let r = coerce(right, ty)?;
                Ok(Typed {
                    expr: TypedExpr::new(Node::Call(func, vec![l, r]), ty),
                    weak,
                })
            }
            Function::Coalesce => {
                let (ty, weak) = unify_all(&args, func.name())?;
                let args = args
                    .into_iter()
                    .map(|a| coerce(a, ty))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Typed {
                    expr: TypedExpr::new(Node::Call(func, args), ty),
                    weak,
                })
            }
            Function::IsNull => {
                let arg = args.remove(0);
                Ok(Typed::strong(TypedExpr::new(
                    Node::Call(func, vec![arg.expr]),
                    ValueType::Bool,
                )))
            }
            Function::If => {
                let otherwise = args.remove(2);
                let then = args.remove(1);
                let cond = coerce(args.remove(0), ValueType::Bool)?;
                let (ty, weak) = unify(&then, &otherwise, func.name())?;
                let then = coerce(then, ty)?;
                let otherwise = coerce(otherwise, ty)?;
                Ok(Typed {
                    expr: TypedExpr::new(Node::Call(func, vec![cond, then, otherwise]), ty),
                    weak,
                })
            }
            Function::Len => {
                let arg = args.remove(0);
                let ty = arg.ty();
                if !(ty.is_list() || matches!(ty, ValueType::String | ValueType::Bytes | ValueType::Null)) {
                    return Err(ExprError::type_error(format!("len not defined for {}", ty)));
                }
                Ok(Typed::strong(TypedExpr::new(
                    Node::Call(func, vec![arg.expr]),
                    ValueType::Int64,
                )))
            }
            Function::Lower | Function::Upper => {
                let arg = coerce(args.remove(0), ValueType::String)?;
                Ok(Typed::strong(TypedExpr::new(
                    Node::Call(func, vec![arg]),
                    ValueType::String,
                )))
            }
            Function::Substr => {
                let length = coerce_integer(args.remove(2))?;
                let start = coerce_integer(args.remove(1))?;
                let text = coerce(args.remove(0), ValueType::String)?;
                Ok(Typed::strong(TypedExpr::new(
                    Node::Call(func, vec![text, start, length]),
                    ValueType::String,
                )))
            }
            Function::Concat => {
                let args = args
                    .into_iter()
                    .map(|a| coerce(a, ValueType::String))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Typed::strong(TypedExpr::new(
                    Node::Call(func, args),
                    ValueType::String,
                )))
            }
            Function::ToInt32 | Function::ToInt64 | Function::ToFloat32 | Function::ToFloat64 => {
                let target = match func {
                    Function::ToInt32 => ValueType::Int32,
                    Function::ToInt64 => ValueType::Int64,
                    Function::ToFloat32 => ValueType::Float32,
                    _ => ValueType::Float64,
                };
                let arg = args.remove(0);
                let source = arg.ty();
                if !(source.is_numeric()
                    || matches!(source, ValueType::String | ValueType::Bool | ValueType::Null))
                {
                    return Err(ExprError::type_error(format!(
                        "{} not defined for {}",
                        func.name(),
                        source
                    )));
                }
                Ok(Typed::strong(cast(arg.expr, target)?))
            }
            Function::ToString => {
                let arg = args.remove(0);
                if arg.ty().is_list() || arg.ty() == ValueType::Bytes {
                    return Err(ExprError::type_error(format!(
                        "to_string not defined for {}",
                        arg.ty()
                    )));
                }
                Ok(Typed::strong(cast(arg.expr, ValueType::String)?))
            }
        }
    }
}

fn compile_literal(literal: &Literal) -> Typed {
    let (value, weak) = match literal {
        Literal::Int(v) => (Value::Int64(*v), true),
        Literal::Float(v) => (Value::Float64(*v), true),
        Literal::Str(s) => (Value::String(s.clone()), false),
        Literal::Bool(b) => (Value::Bool(*b), false),
        Literal::Null => (Value::Null, true),
    };
    let ty = value.value_type();
    Typed {
        expr: TypedExpr::new(Node::Literal(value), ty),
        weak,
    }
}

fn binary(op: BinaryOp, left: TypedExpr, right: TypedExpr, ty: ValueType) -> TypedExpr {
    TypedExpr::new(Node::Binary(op, Box::new(left), Box::new(right)), ty)
}

/// Convert a compiled operand to `target`, folding literals in place
fn coerce(operand: Typed, target: ValueType) -> Result<TypedExpr, ExprError> {
    let source = operand.ty();
    if source == target {
        return Ok(operand.expr);
    }
    if source == ValueType::Null {
        return Ok(TypedExpr::new(operand.expr.node, target));
    }
    let implicit =
        source.is_numeric() && target.is_numeric() && (operand.weak || widens(source, target));
    if !implicit {
        return Err(ExprError::type_error(format!(
            "expected {}, found {}",
            target, source
        )));
    }
    cast(operand.expr, target)
}

fn coerce_integer(operand: Typed) -> Result<TypedExpr, ExprError> {
    if !(operand.ty().is_integer() || operand.ty() == ValueType::Null) {
        return Err(ExprError::type_error(format!(
            "expected an integer, found {}",
            operand.ty()
        )));
    }
    coerce(operand, ValueType::Int64)
}

/// Explicit conversion; constant literals are converted at compile time
fn cast(expr: TypedExpr, target: ValueType) -> Result<TypedExpr, ExprError> {
    if expr.ty == target {
        return Ok(expr);
    }
    match expr.node {
        Node::Literal(value) => {
            let literal = value.to_string();
            let folded = cast_value(value, target)
                .map_err(|_| ExprError::LiteralOutOfRange { literal, target })?;
            Ok(TypedExpr::new(Node::Literal(folded), target))
        }
        node => Ok(TypedExpr::new(Node::Cast(Box::new(TypedExpr::new(node, expr.ty))), target)),
    }
}

fn rank(ty: ValueType) -> u8 {
    match ty {
        ValueType::Int32 => 0,
        ValueType::Int64 => 1,
        ValueType::Float32 => 2,
        _ => 3,
    }
}

/// Common type of two strongly typed numerics
fn promote(a: ValueType, b: ValueType) -> ValueType {
    if a == b {
        return a;
    }
    match (a, b) {
        (ValueType::Int64, ValueType::Float32) | (ValueType::Float32, ValueType::Int64) => {
            ValueType::Float64
        }
        _ if rank(a) >= rank(b) => a,
        _ => b,
    }
}

fn widens(source: ValueType, target: ValueType) -> bool {
    promote(source, target) == target
}

/// Type a weak literal takes when combined with a strong operand
fn adopt(literal: ValueType, other: ValueType) -> ValueType {
    if literal.is_integer() || matches!(other, ValueType::Float32 | ValueType::Float64) {
        other
    } else {
        ValueType::Float64
    }
}

fn float_of(ty: ValueType) -> ValueType {
    if ty == ValueType::Float32 {
        ValueType::Float32
    } else {
        ValueType::Float64
    }
}

fn numeric_unify(a: &Typed, b: &Typed, context: &str) -> Result<(ValueType, bool), ExprError> {
    if a.ty() == ValueType::Null && b.ty() == ValueType::Null {
        return Ok((ValueType::Float64, true));
    }
    if a.ty() == ValueType::Null {
        return numeric_unify(b, b, context);
    }
    if b.ty() == ValueType::Null {
        return numeric_unify(a, a, context);
    }
    if !a.ty().is_numeric() || !b.ty().is_numeric() {
        return Err(ExprError::type_error(format!(
            "{} not defined for {} and {}",
            context,
            a.ty(),
            b.ty()
        )));
    }
    let unified = match (a.weak, b.weak) {
        (true, false) => (adopt(a.ty(), b.ty()), false),
        (false, true) => (adopt(b.ty(), a.ty()), false),
        (true, true) => (promote(a.ty(), b.ty()), true),
        (false, false) => (promote(a.ty(), b.ty()), false),
    };
    Ok(unified)
}

/// Common type of two operands of any kind
fn unify(a: &Typed, b: &Typed, context: &str) -> Result<(ValueType, bool), ExprError> {
    let numeric_or_null = |t: &Typed| t.ty().is_numeric() || t.ty() == ValueType::Null;
    if numeric_or_null(a) && numeric_or_null(b) {
        return numeric_unify(a, b, context);
    }
    if a.ty() == b.ty() {
        return Ok((a.ty(), a.weak && b.weak));
    }
    if a.ty() == ValueType::Null {
        return Ok((b.ty(), b.weak));
    }
    if b.ty() == ValueType::Null {
        return Ok((a.ty(), a.weak));
    }
    Err(ExprError::type_error(format!(
        "{} mixes {} and {}",
        context,
        a.ty(),
        b.ty()
    )))
}

fn unify_all(args: &[Typed], context: &str) -> Result<(ValueType, bool), ExprError> {
    let mut acc = Typed {
        expr: TypedExpr::new(Node::Literal(Value::Null), args[0].ty()),
        weak: args[0].weak,
    };
    for arg in &args[1..] {
        let (ty, weak) = unify(&acc, arg, context)?;
        acc = Typed {
            expr: TypedExpr::new(Node::Literal(Value::Null), ty),
            weak,
        };
    }
    Ok((acc.ty(), acc.weak))
}

fn require_numeric(func: Function, ty: ValueType) -> Result<(), ExprError> {
    if ty.is_numeric() || ty == ValueType::Null {
        Ok(())
    } else {
        Err(ExprError::type_error(format!(
            "{} not defined for {}",
            func.name(),
            ty
        )))
    }
}

fn is_ordered(ty: ValueType) -> bool {
    ty.is_numeric()
        || matches!(
            ty,
            ValueType::String | ValueType::Bool | ValueType::UnixTimestamp | ValueType::Null
        )
}

fn is_stringish(t: &Typed) -> bool {
    matches!(t.ty(), ValueType::String | ValueType::Null)
}

fn has_string(a: &Typed, b: &Typed) -> bool {
    a.ty() == ValueType::String || b.ty() == ValueType::String
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn schema() -> BTreeMap<String, ValueType> {
        BTreeMap::from([
            ("conv_rate".to_string(), ValueType::Float32),
            ("acc_rate".to_string(), ValueType::Float64),
            ("trips".to_string(), ValueType::Int32),
            ("val_to_add".to_string(), ValueType::Int64),
            ("city".to_string(), ValueType::String),
            ("active".to_string(), ValueType::Bool),
        ])
    }

    fn type_of(source: &str) -> Result<ValueType, ExprError> {
        compile(&parse(source)?, &schema()).map(|t| t.value_type())
    }

    #[test]
    fn test_literal_adopts_operand_type() {
        assert_eq!(type_of("conv_rate * 100").unwrap(), ValueType::Float32);
        assert_eq!(type_of("conv_rate * 0.5").unwrap(), ValueType::Float32);
        assert_eq!(type_of("trips + 1").unwrap(), ValueType::Int32);
        assert_eq!(type_of("trips * 0.5").unwrap(), ValueType::Float64);
    }

    #[test]
    fn test_numeric_promotion() {
        assert_eq!(type_of("trips + val_to_add").unwrap(), ValueType::Int64);
        assert_eq!(type_of("conv_rate + acc_rate").unwrap(), ValueType::Float64);
        assert_eq!(type_of("conv_rate + val_to_add").unwrap(), ValueType::Float64);
        assert_eq!(type_of("conv_rate + trips").unwrap(), ValueType::Float32);
    }

    #[test]
    fn test_integer_division_is_float64() {
        assert_eq!(type_of("trips / 2").unwrap(), ValueType::Float64);
        assert_eq!(type_of("trips % 2").unwrap(), ValueType::Int32);
    }

    #[test]
    fn test_bare_literals() {
        assert_eq!(type_of("1").unwrap(), ValueType::Int64);
        assert_eq!(type_of("1.5").unwrap(), ValueType::Float64);
        assert_eq!(type_of("'x'").unwrap(), ValueType::String);
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(type_of("conv_rate > 0.5 && active").unwrap(), ValueType::Bool);
        assert_eq!(type_of("city == 'Paris'").unwrap(), ValueType::Bool);
    }

    #[test]
    fn test_functions() {
        assert_eq!(type_of("sqrt(trips)").unwrap(), ValueType::Float64);
        assert_eq!(type_of("sqrt(conv_rate)").unwrap(), ValueType::Float32);
        assert_eq!(type_of("coalesce(conv_rate, 0)").unwrap(), ValueType::Float32);
        assert_eq!(type_of("if(active, trips, 0)").unwrap(), ValueType::Int32);
        assert_eq!(type_of("len(city)").unwrap(), ValueType::Int64);
        assert_eq!(type_of("to_float64(conv_rate * 100)").unwrap(), ValueType::Float64);
        assert_eq!(type_of("concat(city, '-', to_string(trips))").unwrap(), ValueType::String);
        assert_eq!(type_of("city + '!'").unwrap(), ValueType::String);
    }

    #[test]
    fn test_type_errors() {
        assert!(matches!(type_of("city * 2"), Err(ExprError::Type(_))));
        assert!(matches!(type_of("!trips"), Err(ExprError::Type(_))));
        assert!(matches!(type_of("if(trips, 1, 2)"), Err(ExprError::Type(_))));
        assert!(matches!(type_of("if(active, city, 2)"), Err(ExprError::Type(_))));
    }

    #[test]
    fn test_unknown_column() {
        assert_eq!(
            type_of("missing + 1").unwrap_err(),
            ExprError::UnknownColumn("missing".to_string())
        );
    }

    #[test]
    fn test_literal_out_of_range_for_int32() {
        assert!(matches!(
            type_of("trips + 3000000000"),
            Err(ExprError::LiteralOutOfRange { target: ValueType::Int32, .. })
        ));
    }
}
