//! Server-authoritative parameter validation.
//!
//! [`validate`] maps one declared parameter and its raw JSON value to a
//! [`Coerced`] value or a [`Rejection`]. The order is fixed: absence is checked
//! first (accepted only for optional parameters), then explicit null (accepted
//! only for nullable parameters), then the type rule. [`validate_all`] runs the
//! whole declaration and reports every failing field at once.

mod patterns;
mod scalars;
mod temporal;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::declaration::{CommandDef, ParameterDef};
use crate::response::FieldError;
use crate::types::ParamType;
use crate::value::{Arguments, Coerced, FileHandle, TypedValue};

/// Why a raw value was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// A mandatory parameter was left out.
    #[error("required parameter is missing")]
    Missing,
    /// A non-nullable parameter was sent as null.
    #[error("parameter must not be null")]
    NullNotAllowed,
    /// The value does not satisfy the type rule.
    #[error("expected {expected}")]
    Invalid {
        /// Human-readable description of the accepted form.
        expected: &'static str,
    },
    /// The value is not one of the declared enum values.
    #[error("value must be one of: {allowed}")]
    NotInSet {
        /// Comma-separated list of accepted values.
        allowed: String,
    },
    /// A `file` parameter was declared but the request carried no payload.
    #[error("binary payload is missing")]
    MissingPayload,
}

impl Rejection {
    pub(crate) const fn invalid(expected: &'static str) -> Self {
        Self::Invalid { expected }
    }
}

/// Length of the binary payload attached to a request, if any.
pub type PayloadLength = Option<u64>;

/// Validates one parameter against its raw value.
///
/// `raw` is `None` when the request omitted the field. `payload` describes
/// the request's binary body and is only consulted for `file` parameters.
///
/// # Errors
///
/// Returns the [`Rejection`] describing the first rule the value breaks.
pub fn validate(
    parameter: &ParameterDef,
    raw: Option<&Value>,
    payload: PayloadLength,
) -> Result<Coerced, Rejection> {
    if parameter.param_type == ParamType::File {
        return validate_file(parameter, raw, payload);
    }

    match raw {
        None if parameter.optional => Ok(Coerced::Absent),
        None => Err(Rejection::Missing),
        Some(Value::Null) if parameter.nullable => Ok(Coerced::Null),
        Some(Value::Null) => Err(Rejection::NullNotAllowed),
        Some(value) => coerce(&parameter.param_type, value).map(Coerced::Value),
    }
}

/// Validates every declared parameter of `command`.
///
/// Undeclared fields in `raw` are ignored.
///
/// # Errors
///
/// Returns one [`FieldError`] per failing parameter, in declaration order.
pub fn validate_all(
    command: &CommandDef,
    raw: &Map<String, Value>,
    payload: PayloadLength,
) -> Result<Arguments, Vec<FieldError>> {
    let mut arguments = Arguments::new();
    let mut failures = Vec::new();

    for parameter in &command.parameters {
        match validate(parameter, raw.get(&parameter.name), payload) {
            Ok(value) => arguments.insert(parameter.name.clone(), value),
            Err(rejection) => failures.push(FieldError::new(&parameter.name, &rejection)),
        }
    }

    if failures.is_empty() {
        Ok(arguments)
    } else {
        Err(failures)
    }
}

fn validate_file(
    parameter: &ParameterDef,
    raw: Option<&Value>,
    payload: PayloadLength,
) -> Result<Coerced, Rejection> {
    let Some(len) = payload else {
        return match raw {
            Some(Value::Null) if parameter.nullable => Ok(Coerced::Null),
            _ if parameter.optional => Ok(Coerced::Absent),
            _ => Err(Rejection::MissingPayload),
        };
    };

    let name = match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name.clone()),
        Some(_) => return Err(Rejection::invalid("a file name")),
    };
    Ok(Coerced::Value(TypedValue::File(FileHandle { name, len })))
}

fn coerce(param_type: &ParamType, value: &Value) -> Result<TypedValue, Rejection> {
    match param_type {
        ParamType::Int => scalars::int(value),
        ParamType::Float => scalars::float(value),
        ParamType::Bool => scalars::bool(value),
        ParamType::String => scalars::text(value),
        ParamType::Array | ParamType::Iterable => scalars::collection(value),
        ParamType::Object => scalars::object(value),
        ParamType::Enum(allowed) => scalars::one_of(value, allowed),
        ParamType::Color => patterns::color(value),
        ParamType::Url => patterns::url(value),
        ParamType::Email => patterns::email(value),
        ParamType::Money => patterns::money(value),
        ParamType::Timespan => patterns::timespan(value),
        ParamType::Date => temporal::date(value),
        ParamType::Time => temporal::time(value),
        ParamType::DateTime => temporal::datetime(value),
        ParamType::File => Err(Rejection::MissingPayload),
    }
}

/// Text form of a scalar, used by the pattern-based rules.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
