//! Lenient numeric coercion. Anything that is not a clean finite number is
//! missing (`None`), never zero and never an error.

use serde_json::Value;

/// Parse a text cell. Surrounding whitespace is ignored; `inf`/`NaN` are missing.
pub fn coerce_str(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Coerce a JSON value. Arrays, objects, booleans and null are missing.
pub fn coerce_json(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => coerce_str(s),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_numbers() {
        assert_eq!(coerce_json(&json!(12.5)), Some(12.5));
        assert_eq!(coerce_json(&json!(-3)), Some(-3.0));
        assert_eq!(coerce_json(&json!(" 1e3 ")), Some(1000.0));
        assert_eq!(coerce_str("0"), Some(0.0));
    }

    #[test]
    fn test_shapes_that_are_missing() {
        assert_eq!(coerce_json(&json!(null)), None);
        assert_eq!(coerce_json(&json!(true)), None);
        assert_eq!(coerce_json(&json!([1, 2])), None);
        assert_eq!(coerce_json(&json!({"amount": 1})), None);
        assert_eq!(coerce_json(&json!("12 USDC")), None);
        assert_eq!(coerce_json(&json!("")), None);
        assert_eq!(coerce_str("NaN"), None);
        assert_eq!(coerce_str("inf"), None);
    }
}
