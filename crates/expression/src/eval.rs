//! Row Evaluation of Typed Expressions

use crate::ast::{BinaryOp, Function, UnaryOp};
use crate::error::EvalError;
use crate::typed::{Node, TypedExpr};
use feature_model::{Row, Value, ValueType};
use std::cmp::Ordering;

impl TypedExpr {
    /// Evaluate against one input row.
    ///
    /// The result depends only on `row`; batch and online derivation share
    /// this path.
    pub fn evaluate(&self, row: &Row) -> Result<Value, EvalError> {
        match &self.node {
            Node::Literal(value) => Ok(value.clone()),
            Node::Column(name) => {
                let value = row
                    .get(name)
                    .ok_or_else(|| EvalError::MissingColumn(name.clone()))?;
                if !value.conforms_to(self.ty) {
                    return Err(EvalError::ColumnType {
                        column: name.clone(),
                        expected: self.ty,
                        actual: value.value_type(),
                    });
                }
                Ok(value.clone())
            }
            Node::Cast(inner) => cast_value(inner.evaluate(row)?, self.ty),
            Node::Unary(op, operand) => unary(*op, operand.evaluate(row)?),
            Node::Binary(BinaryOp::And, left, right) => {
                let l = left.evaluate(row)?;
                if l == Value::Bool(false) {
                    return Ok(l);
                }
                let r = right.evaluate(row)?;
                Ok(match (l, r) {
                    (_, Value::Bool(false)) => Value::Bool(false),
                    (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
                    _ => Value::Null,
                })
            }
            Node::Binary(BinaryOp::Or, left, right) => {
                let l = left.evaluate(row)?;
                if l == Value::Bool(true) {
                    return Ok(l);
                }
                let r = right.evaluate(row)?;
                Ok(match (l, r) {
                    (_, Value::Bool(true)) => Value::Bool(true),
                    (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
                    _ => Value::Null,
                })
            }
            Node::Binary(op, left, right) => {
                let l = left.evaluate(row)?;
                let r = right.evaluate(row)?;
                if op.is_comparison() {
                    Ok(compare(*op, &l, &r))
                } else {
                    arithmetic(*op, l, r)
                }
            }
            Node::Call(func, args) => self.call(*func, args, row),
        }
    }

    fn call(&self, func: Function, args: &[TypedExpr], row: &Row) -> Result<Value, EvalError> {
        match func {
            Function::Coalesce => {
                for arg in args {
                    let value = arg.evaluate(row)?;
                    if !value.is_null() {
                        return Ok(value);
                    }
                }
                Ok(Value::Null)
            }
            Function::IsNull => Ok(Value::Bool(args[0].evaluate(row)?.is_null())),
            Function::If => match args[0].evaluate(row)? {
                Value::Bool(true) => args[1].evaluate(row),
                Value::Bool(false) => args[2].evaluate(row),
                _ => Ok(Value::Null),
            },
            _ => {
                let values = args
                    .iter()
                    .map(|a| a.evaluate(row))
                    .collect::<Result<Vec<_>, _>>()?;
                if values.iter().any(Value::is_null) {
                    return Ok(Value::Null);
                }
                scalar_call(func, values)
            }
        }
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    let result = match (op, value) {
        (_, Value::Null) => Value::Null,
        (UnaryOp::Neg, Value::Int32(v)) => Value::Int32(
            v.checked_neg()
                .ok_or_else(|| EvalError::Overflow("-".to_string()))?,
        ),
        (UnaryOp::Neg, Value::Int64(v)) => Value::Int64(
            v.checked_neg()
                .ok_or_else(|| EvalError::Overflow("-".to_string()))?,
        ),
        (UnaryOp::Neg, Value::Float32(v)) => Value::Float32(-v),
        (UnaryOp::Neg, Value::Float64(v)) => Value::Float64(-v),
        (UnaryOp::Not, Value::Bool(b)) => Value::Bool(!b),
        (_, other) => {
            return Err(EvalError::InvalidCast {
                value: other.to_string(),
                target: other.value_type(),
            })
        }
    };
    Ok(result)
}

macro_rules! checked_int {
    ($variant:ident, $op:expr, $a:expr, $b:expr) => {{
        let overflow = || EvalError::Overflow($op.symbol().to_string());
        let v = match $op {
            BinaryOp::Add => $a.checked_add($b).ok_or_else(overflow)?,
            BinaryOp::Sub => $a.checked_sub($b).ok_or_else(overflow)?,
            BinaryOp::Mul => $a.checked_mul($b).ok_or_else(overflow)?,
            BinaryOp::Rem => {
                if $b == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                $a.checked_rem($b).ok_or_else(overflow)?
            }
            _ => return Err(overflow()),
        };
        Value::$variant(v)
    }};
}

macro_rules! float_op {
    ($variant:ident, $op:expr, $a:expr, $b:expr) => {
        Value::$variant(match $op {
            BinaryOp::Add => $a + $b,
            BinaryOp::Sub => $a - $b,
            BinaryOp::Mul => $a * $b,
            BinaryOp::Div => $a / $b,
            _ => $a % $b,
        })
    };
}

fn arithmetic(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    let result = match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        (Value::Int32(a), Value::Int32(b)) => checked_int!(Int32, op, a, b),
        (Value::Int64(a), Value::Int64(b)) => checked_int!(Int64, op, a, b),
        (Value::Float32(a), Value::Float32(b)) => float_op!(Float32, op, a, b),
        (Value::Float64(a), Value::Float64(b)) => float_op!(Float64, op, a, b),
        (Value::String(a), Value::String(b)) => Value::String(a + &b),
        (l, r) => {
            return Err(EvalError::InvalidCast {
                value: format!("{} {} {}", l, op.symbol(), r),
                target: l.value_type(),
            })
        }
    };
    Ok(result)
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => a.partial_cmp(b),
        (Value::Int64(a), Value::Int64(b)) => a.partial_cmp(b),
        (Value::Float32(a), Value::Float32(b)) => a.partial_cmp(b),
        (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => a.partial_cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
        (Value::UnixTimestamp(a), Value::UnixTimestamp(b)) => a.partial_cmp(b),
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Value {
    if left.is_null() || right.is_null() {
        return Value::Null;
    }
    let ord = ordering(left, right);
    let result = match op {
        BinaryOp::Eq => ord == Some(Ordering::Equal),
        BinaryOp::NotEq => ord != Some(Ordering::Equal),
        BinaryOp::Lt => ord == Some(Ordering::Less),
        BinaryOp::LtEq => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        BinaryOp::Gt => ord == Some(Ordering::Greater),
        _ => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
    };
    Value::Bool(result)
}

fn scalar_call(func: Function, mut values: Vec<Value>) -> Result<Value, EvalError> {
    let overflow = || EvalError::Overflow(func.name().to_string());
    let result = match (func, values.as_slice()) {
        (Function::Abs, [Value::Int32(v)]) => Value::Int32(v.checked_abs().ok_or_else(overflow)?),
        (Function::Abs, [Value::Int64(v)]) => Value::Int64(v.checked_abs().ok_or_else(overflow)?),
        (Function::Abs, [Value::Float32(v)]) => Value::Float32(v.abs()),
        (Function::Abs, [Value::Float64(v)]) => Value::Float64(v.abs()),

        (Function::Sqrt, [Value::Float32(v)]) => Value::Float32(v.sqrt()),
        (Function::Sqrt, [Value::Float64(v)]) => Value::Float64(v.sqrt()),
        (Function::Ln, [Value::Float32(v)]) => Value::Float32(v.ln()),
        (Function::Ln, [Value::Float64(v)]) => Value::Float64(v.ln()),
        (Function::Exp, [Value::Float32(v)]) => Value::Float32(v.exp()),
        (Function::Exp, [Value::Float64(v)]) => Value::Float64(v.exp()),

        (Function::Floor, [Value::Float32(v)]) => Value::Float32(v.floor()),
        (Function::Floor, [Value::Float64(v)]) => Value::Float64(v.floor()),
        (Function::Ceil, [Value::Float32(v)]) => Value::Float32(v.ceil()),
        (Function::Ceil, [Value::Float64(v)]) => Value::Float64(v.ceil()),
        (Function::Round, [Value::Float32(v)]) => Value::Float32(v.round()),
        (Function::Round, [Value::Float64(v)]) => Value::Float64(v.round()),
        (Function::Floor | Function::Ceil | Function::Round, [Value::Int32(_) | Value::Int64(_)]) => {
            values.remove(0)
        }

        (Function::Pow, [Value::Float32(a), Value::Float32(b)]) => Value::Float32(a.powf(*b)),
        (Function::Pow, [Value::Float64(a), Value::Float64(b)]) => Value::Float64(a.powf(*b)),

        (Function::Min | Function::Max, [a, b]) => {
            let pick_left = match ordering(a, b) {
                Some(Ordering::Less) => func == Function::Min,
                Some(Ordering::Greater) => func == Function::Max,
                // Equal keeps the left operand; NaN propagates from the left
                _ => true,
            };
            values.swap_remove(if pick_left { 0 } else { 1 })
        }

        (Function::Len, [Value::String(s)]) => Value::Int64(s.chars().count() as i64),
        (Function::Len, [Value::Bytes(b)]) => Value::Int64(b.len() as i64),
        (Function::Len, [list]) => Value::Int64(list_len(list).ok_or_else(|| invalid(list, ValueType::Int64))? as i64),

        (Function::Lower, [Value::String(s)]) => Value::String(s.to_lowercase()),
        (Function::Upper, [Value::String(s)]) => Value::String(s.to_uppercase()),

        (Function::Substr, [Value::String(s), Value::Int64(start), Value::Int64(length)]) => {
            let start = (*start).max(0) as usize;
            let length = (*length).max(0) as usize;
            Value::String(s.chars().skip(start).take(length).collect())
        }

        (Function::Concat, parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    Value::String(s) => out.push_str(s),
                    other => return Err(invalid(other, ValueType::String)),
                }
            }
            Value::String(out)
        }

        (_, [first, ..]) => return Err(invalid(first, ValueType::Unknown)),
        (_, []) => return Err(EvalError::Overflow(func.name().to_string())),
    };
    Ok(result)
}

fn list_len(value: &Value) -> Option<usize> {
    match value {
        Value::BytesList(v) => Some(v.len()),
        Value::StringList(v) => Some(v.len()),
        Value::Int32List(v) => Some(v.len()),
        Value::Int64List(v) => Some(v.len()),
        Value::Float32List(v) => Some(v.len()),
        Value::Float64List(v) => Some(v.len()),
        Value::BoolList(v) => Some(v.len()),
        Value::UnixTimestampList(v) => Some(v.len()),
        _ => None,
    }
}

fn invalid(value: &Value, target: ValueType) -> EvalError {
    EvalError::InvalidCast {
        value: value.to_string(),
        target,
    }
}

/// 2^31 and 2^63: the first floats past `i32::MAX` and `i64::MAX`
const I32_END: f64 = 2_147_483_648.0;
const I64_END: f64 = 9.223372036854775808e18;

/// Truncate toward zero, requiring the result to lie in `[min, end)`
fn float_to_int(v: f64, min: f64, end: f64, target: ValueType) -> Result<f64, EvalError> {
    if !v.is_finite() {
        return Err(invalid(&Value::Float64(v), target));
    }
    let t = v.trunc();
    if t >= min && t < end {
        Ok(t)
    } else {
        Err(EvalError::Overflow(format!("conversion to {}", target)))
    }
}

/// Convert a value to `target`, failing on lossy integer conversions
pub(crate) fn cast_value(value: Value, target: ValueType) -> Result<Value, EvalError> {
    if value.is_null() || value.value_type() == target {
        return Ok(value);
    }
    let fail = |v: &Value| invalid(v, target);

    let converted = match (&value, target) {
        (_, ValueType::String) => match &value {
            Value::String(s) => Value::String(s.clone()),
            Value::Bytes(_) => return Err(fail(&value)),
            other if other.value_type().is_list() => return Err(fail(&value)),
            other => Value::String(other.to_string()),
        },

        (Value::Int32(v), ValueType::Int64) => Value::Int64(*v as i64),
        (Value::Int32(v), ValueType::Float32) => Value::Float32(*v as f32),
        (Value::Int32(v), ValueType::Float64) => Value::Float64(*v as f64),

        (Value::Int64(v), ValueType::Int32) => {
            Value::Int32(i32::try_from(*v).map_err(|_| fail(&value))?)
        }
        (Value::Int64(v), ValueType::Float32) => Value::Float32(*v as f32),
        (Value::Int64(v), ValueType::Float64) => Value::Float64(*v as f64),
        (Value::Int64(v), ValueType::UnixTimestamp) => Value::UnixTimestamp(*v),

        (Value::Float32(v), ValueType::Float64) => Value::Float64(*v as f64),
        (Value::Float32(v), ValueType::Int32) => {
            Value::Int32(float_to_int(*v as f64, i32::MIN as f64, I32_END, target)? as i32)
        }
        (Value::Float32(v), ValueType::Int64) => {
            Value::Int64(float_to_int(*v as f64, i64::MIN as f64, I64_END, target)? as i64)
        }

        (Value::Float64(v), ValueType::Float32) => Value::Float32(*v as f32),
        (Value::Float64(v), ValueType::Int32) => {
            Value::Int32(float_to_int(*v, i32::MIN as f64, I32_END, target)? as i32)
        }
        (Value::Float64(v), ValueType::Int64) => {
            Value::Int64(float_to_int(*v, i64::MIN as f64, I64_END, target)? as i64)
        }

        (Value::Bool(b), ValueType::Int32) => Value::Int32(*b as i32),
        (Value::Bool(b), ValueType::Int64) => Value::Int64(*b as i64),
        (Value::Bool(b), ValueType::Float32) => Value::Float32(*b as u8 as f32),
        (Value::Bool(b), ValueType::Float64) => Value::Float64(*b as u8 as f64),

        (Value::UnixTimestamp(v), ValueType::Int64) => Value::Int64(*v),

        (Value::String(s), ValueType::Int32) => {
            Value::Int32(s.trim().parse().map_err(|_| fail(&value))?)
        }
        (Value::String(s), ValueType::Int64) => {
            Value::Int64(s.trim().parse().map_err(|_| fail(&value))?)
        }
        (Value::String(s), ValueType::Float32) => {
            Value::Float32(s.trim().parse().map_err(|_| fail(&value))?)
        }
        (Value::String(s), ValueType::Float64) => {
            Value::Float64(s.trim().parse().map_err(|_| fail(&value))?)
        }
        (Value::String(s), ValueType::Bool) => match s.trim() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(fail(&value)),
        },

        _ => return Err(fail(&value)),
    };
    Ok(converted)
}
