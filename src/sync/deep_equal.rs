//! Structural equality over JSON values, used by the no-op write guard.
//!
//! `serde_json::Value`'s derived `PartialEq` distinguishes `1` from `1.0`,
//! but a value that has round-tripped through a rendered link can come back
//! with a different number spelling. This comparison normalizes numerics so
//! a re-parsed value still counts as unchanged.

use serde_json::Value;

/// Deep structural equality with numeric normalization.
///
/// Two values sharing the same allocation compare equal without descending;
/// that keeps repeated checks against a cached value cheap.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }

    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => {
            // Compare actual numeric values, not representations
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return a == b;
            }
            if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
                return a == b;
            }
            match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| deep_equal(value, other)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert!(deep_equal(&json!(null), &json!(null)));
        assert!(deep_equal(&json!(true), &json!(true)));
        assert!(deep_equal(&json!("abc"), &json!("abc")));
        assert!(!deep_equal(&json!("abc"), &json!("abd")));
        assert!(!deep_equal(&json!(null), &json!(false)));
    }

    #[test]
    fn test_numeric_spelling_is_normalized() {
        let int = json!(1);
        let float = serde_json::from_str::<Value>("1.0").unwrap();
        assert!(deep_equal(&int, &float));
        assert!(!deep_equal(&json!(1), &json!(2)));
        // Large u64 values must not be squashed through f64
        assert!(deep_equal(&json!(u64::MAX), &json!(u64::MAX)));
        assert!(!deep_equal(&json!(u64::MAX), &json!(u64::MAX - 1)));
    }

    #[test]
    fn test_nested_structures() {
        let a = json!({"filters": [{"id": "status", "value": "active"}], "page": 1});
        let b = json!({"page": 1.0, "filters": [{"id": "status", "value": "active"}]});
        assert!(deep_equal(&a, &b));

        let c = json!({"filters": [{"id": "status", "value": "archived"}], "page": 1});
        assert!(!deep_equal(&a, &c));
    }

    #[test]
    fn test_shape_mismatches() {
        assert!(!deep_equal(&json!([1, 2]), &json!([1, 2, 3])));
        assert!(!deep_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!deep_equal(&json!({"a": 1}), &json!(["a", 1])));
    }

    #[test]
    fn test_identity_fast_path() {
        let value = json!({"big": [1, 2, 3]});
        assert!(deep_equal(&value, &value));
    }
}
