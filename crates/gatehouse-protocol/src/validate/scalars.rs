//! Rules for numeric, boolean, text and collection types.

use serde_json::Value;

use super::{Rejection, scalar_text};
use crate::value::TypedValue;

// 2^63 as f64; integral floats in [-2^63, 2^63) fit in an i64.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

pub(super) fn int(value: &Value) -> Result<TypedValue, Rejection> {
    const EXPECTED: &str = "an integer";
    match value {
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                return Ok(TypedValue::Int(integer));
            }
            match number.as_f64() {
                Some(float) if float.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&float) => {
                    Ok(TypedValue::Int(float as i64))
                }
                _ => Err(Rejection::invalid(EXPECTED)),
            }
        }
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map(TypedValue::Int)
            .map_err(|_| Rejection::invalid(EXPECTED)),
        _ => Err(Rejection::invalid(EXPECTED)),
    }
}

pub(super) fn float(value: &Value) -> Result<TypedValue, Rejection> {
    const EXPECTED: &str = "a number";
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(float) if float.is_finite() => Ok(TypedValue::Float(float)),
        _ => Err(Rejection::invalid(EXPECTED)),
    }
}

pub(super) fn bool(value: &Value) -> Result<TypedValue, Rejection> {
    const EXPECTED: &str = "a boolean";
    let parsed = match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed
        .map(TypedValue::Bool)
        .ok_or(Rejection::invalid(EXPECTED))
}

pub(super) fn text(value: &Value) -> Result<TypedValue, Rejection> {
    scalar_text(value)
        .map(TypedValue::Text)
        .ok_or(Rejection::invalid("a scalar value"))
}

pub(super) fn collection(value: &Value) -> Result<TypedValue, Rejection> {
    match value {
        Value::Array(items) => Ok(TypedValue::List(items.clone())),
        Value::Object(map) => Ok(TypedValue::Map(map.clone())),
        _ => Err(Rejection::invalid("an array or object")),
    }
}

pub(super) fn object(value: &Value) -> Result<TypedValue, Rejection> {
    match value {
        Value::Object(map) => Ok(TypedValue::Map(map.clone())),
        _ => Err(Rejection::invalid("an object")),
    }
}

pub(super) fn one_of(value: &Value, allowed: &[String]) -> Result<TypedValue, Rejection> {
    let not_in_set = || Rejection::NotInSet {
        allowed: allowed.join(", "),
    };
    let candidate = scalar_text(value).ok_or_else(not_in_set)?;
    allowed
        .iter()
        .find(|declared| **declared == candidate)
        .map(|declared| TypedValue::Text(declared.clone()))
        .ok_or_else(not_in_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(42), 42)]
    #[case(json!(-7), -7)]
    #[case(json!(3.0), 3)]
    #[case(json!(" 12 "), 12)]
    fn int_accepts_integral_forms(#[case] raw: Value, #[case] expected: i64) {
        assert_eq!(int(&raw), Ok(TypedValue::Int(expected)));
    }

    #[rstest]
    #[case(json!(4.5))]
    #[case(json!("4.5"))]
    #[case(json!("abc"))]
    #[case(json!(true))]
    #[case(json!([1]))]
    fn int_rejects_fractional_and_non_numeric(#[case] raw: Value) {
        assert!(int(&raw).is_err());
    }

    #[rstest]
    #[case(json!(1.25), 1.25)]
    #[case(json!("2.5"), 2.5)]
    #[case(json!(3), 3.0)]
    fn float_accepts_numeric_literals(#[case] raw: Value, #[case] expected: f64) {
        assert_eq!(float(&raw), Ok(TypedValue::Float(expected)));
    }

    #[rstest]
    #[case(json!("NaN"))]
    #[case(json!("inf"))]
    #[case(json!("1,5"))]
    fn float_rejects_non_finite_or_malformed(#[case] raw: Value) {
        assert!(float(&raw).is_err());
    }

    #[rstest]
    #[case(json!(true), true)]
    #[case(json!("Yes"), true)]
    #[case(json!("off"), false)]
    #[case(json!(0), false)]
    fn bool_accepts_tokens(#[case] raw: Value, #[case] expected: bool) {
        assert_eq!(bool(&raw), Ok(TypedValue::Bool(expected)));
    }

    #[rstest]
    #[case(json!("maybe"))]
    #[case(json!(2))]
    #[case(json!(""))]
    fn bool_rejects_ambiguous_tokens(#[case] raw: Value) {
        assert!(bool(&raw).is_err());
    }

    #[test]
    fn text_stringifies_scalars_only() {
        assert_eq!(text(&json!(12)), Ok(TypedValue::Text("12".to_owned())));
        assert!(text(&json!({ "a": 1 })).is_err());
    }

    #[test]
    fn collections_and_objects() {
        assert!(matches!(collection(&json!([1, 2])), Ok(TypedValue::List(_))));
        assert!(matches!(collection(&json!({ "k": 1 })), Ok(TypedValue::Map(_))));
        assert!(collection(&json!("x")).is_err());
        assert!(object(&json!([1])).is_err());
    }

    #[test]
    fn enum_matches_declared_values() {
        let allowed = vec!["low".to_owned(), "high".to_owned()];
        assert_eq!(
            one_of(&json!("high"), &allowed),
            Ok(TypedValue::Text("high".to_owned()))
        );
        assert_eq!(
            one_of(&json!("medium"), &allowed),
            Err(Rejection::NotInSet {
                allowed: "low, high".to_owned()
            })
        );
    }
}
