//! Tolerant numeric coercions for router-supplied channel values
//!
//! Firmware versions disagree on whether numbers arrive as JSON numbers or
//! strings, and some locales use a comma as decimal separator. Both helpers
//! return `None` for anything they cannot read, never a default value, so a
//! measured zero stays distinguishable from a missing reading.

use serde_json::Value;

/// Read a float, accepting `"5,4"` as well as `"5.4"` and `5.4`.
pub fn numeric_with_locale(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Read an integer by parsing a float first and truncating toward zero.
///
/// Accepts `"128.0"` and `128.7` (both give 128). Commas are not
/// reinterpreted here.
pub fn integer_via_float(value: &Value) -> Option<i64> {
    let parsed = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            n.as_f64()
        }
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    let truncated = parsed.trunc();
    if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
        Some(truncated as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_with_locale() {
        assert_eq!(numeric_with_locale(&json!("5,4")), Some(5.4));
        assert_eq!(numeric_with_locale(&json!("-3.25")), Some(-3.25));
        assert_eq!(numeric_with_locale(&json!(41)), Some(41.0));
        assert_eq!(numeric_with_locale(&json!(0.5)), Some(0.5));
        assert_eq!(numeric_with_locale(&json!("0")), Some(0.0));
    }

    #[test]
    fn test_numeric_with_locale_absent() {
        assert_eq!(numeric_with_locale(&Value::Null), None);
        assert_eq!(numeric_with_locale(&json!("")), None);
        assert_eq!(numeric_with_locale(&json!("n/a")), None);
        assert_eq!(numeric_with_locale(&json!(true)), None);
        assert_eq!(numeric_with_locale(&json!([1.0])), None);
        assert_eq!(numeric_with_locale(&json!("NaN")), None);
    }

    #[test]
    fn test_integer_via_float() {
        assert_eq!(integer_via_float(&json!("128.0")), Some(128));
        assert_eq!(integer_via_float(&json!("12")), Some(12));
        assert_eq!(integer_via_float(&json!(7.9)), Some(7));
        assert_eq!(integer_via_float(&json!(-7.9)), Some(-7));
        assert_eq!(integer_via_float(&json!(0)), Some(0));
    }

    #[test]
    fn test_integer_via_float_absent() {
        assert_eq!(integer_via_float(&Value::Null), None);
        assert_eq!(integer_via_float(&json!("5,0")), None);
        assert_eq!(integer_via_float(&json!("abc")), None);
        assert_eq!(integer_via_float(&json!("1e300")), None);
        assert_eq!(integer_via_float(&json!({"v": 1})), None);
    }
}
