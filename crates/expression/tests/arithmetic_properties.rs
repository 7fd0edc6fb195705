//! Property tests for expression arithmetic

use expression::{compile, parse};
use feature_model::{Row, Value, ValueType};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn schema() -> BTreeMap<String, ValueType> {
    BTreeMap::from([
        ("a".to_string(), ValueType::Int64),
        ("b".to_string(), ValueType::Int64),
        ("x".to_string(), ValueType::Float32),
    ])
}

proptest! {
    #[test]
    fn int64_addition_matches_native(a in -1_000_000_000i64..1_000_000_000, b in -1_000_000_000i64..1_000_000_000) {
        let expr = compile(&parse("a + b").unwrap(), &schema()).unwrap();
        let row = Row::from_iter([("a", Value::Int64(a)), ("b", Value::Int64(b))]);
        prop_assert_eq!(expr.evaluate(&row).unwrap(), Value::Int64(a + b));
    }

    #[test]
    fn float32_scaling_matches_native(x in -1.0e6f32..1.0e6) {
        let expr = compile(&parse("x * 100").unwrap(), &schema()).unwrap();
        let row = Row::from_iter([("x", Value::Float32(x))]);
        prop_assert_eq!(expr.evaluate(&row).unwrap(), Value::Float32(x * 100.0));
    }

    #[test]
    fn evaluation_is_deterministic(a in any::<i32>(), x in any::<f32>()) {
        let expr = compile(&parse("if(x > 0, to_float64(a) * 2, to_float64(x))").unwrap(), &schema()).unwrap();
        let row = Row::from_iter([("a", Value::Int64(a as i64)), ("x", Value::Float32(x))]);
        let first = expr.evaluate(&row).unwrap();
        let second = expr.evaluate(&row).unwrap();
        match (first, second) {
            (Value::Float64(l), Value::Float64(r)) => prop_assert_eq!(l.to_bits(), r.to_bits()),
            (l, r) => prop_assert_eq!(l, r),
        }
    }
}
