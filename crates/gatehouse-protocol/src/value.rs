//! Coerced parameter values handed to command handlers.

use std::fmt;
use std::time::Duration;

use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime, Time};

/// Amount of money with two decimal places, held in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Money {
    minor_units: i64,
}

impl Money {
    /// Builds an amount from minor units (cents).
    #[must_use]
    pub const fn from_minor_units(minor_units: i64) -> Self {
        Self { minor_units }
    }

    /// Amount in minor units.
    #[must_use]
    pub const fn minor_units(self) -> i64 {
        self.minor_units
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minor_units < 0 { "-" } else { "" };
        let magnitude = self.minor_units.unsigned_abs();
        write!(f, "{sign}{}.{:02}", magnitude / 100, magnitude % 100)
    }
}

/// Opaque reference to the request's binary payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    /// Client-supplied file name, if any.
    pub name: Option<String>,
    /// Payload length in bytes.
    pub len: u64,
}

/// A value that passed its parameter's type rule.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// `int`.
    Int(i64),
    /// `float`.
    Float(f64),
    /// `bool`.
    Bool(bool),
    /// `string`, `url`, `email` and matched `enum` values.
    Text(String),
    /// Normalised `color`.
    Color(String),
    /// `array` and `iterable` arrays.
    List(Vec<Value>),
    /// `object`, and keyed `array`/`iterable` collections.
    Map(Map<String, Value>),
    /// `money`.
    Money(Money),
    /// `date`.
    Date(Date),
    /// `time`.
    Time(Time),
    /// `datetime`, always UTC.
    DateTime(OffsetDateTime),
    /// `timespan`.
    Timespan(Duration),
    /// `file`.
    File(FileHandle),
}

impl TypedValue {
    /// Renders the value back into JSON, e.g. for event payloads.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Int(value) => Value::from(*value),
            Self::Float(value) => Value::from(*value),
            Self::Bool(value) => Value::Bool(*value),
            Self::Text(value) | Self::Color(value) => Value::String(value.clone()),
            Self::List(values) => Value::Array(values.clone()),
            Self::Map(map) => Value::Object(map.clone()),
            Self::Money(money) => Value::String(money.to_string()),
            Self::Date(date) => Value::String(date.to_string()),
            Self::Time(time) => Value::String(time.to_string()),
            Self::DateTime(instant) => instant
                .format(&Rfc3339)
                .map_or(Value::Null, Value::String),
            Self::Timespan(span) => Value::from(span.as_secs()),
            Self::File(handle) => serde_json::json!({ "name": handle.name, "len": handle.len }),
        }
    }
}

/// Outcome of validating one parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// Optional parameter left out of the request.
    Absent,
    /// Nullable parameter sent as an explicit null.
    Null,
    /// Parameter present and coerced.
    Value(TypedValue),
}

/// Validated arguments for one invocation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    entries: Vec<(String, Coerced)>,
}

impl Arguments {
    /// Creates an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the coerced value of a parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: Coerced) {
        self.entries.push((name.into(), value));
    }

    /// Returns the raw coercion outcome.
    #[must_use]
    pub fn coerced(&self, name: &str) -> Option<&Coerced> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Returns the value unless the parameter was absent or null.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        match self.coerced(name) {
            Some(Coerced::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Whether the parameter was sent as an explicit null.
    #[must_use]
    pub fn is_null(&self, name: &str) -> bool {
        matches!(self.coerced(name), Some(Coerced::Null))
    }

    /// Text-like value (`string`, `url`, `email`, `enum`, `color`).
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            TypedValue::Text(value) | TypedValue::Color(value) => Some(value),
            _ => None,
        }
    }

    /// Integer value.
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            TypedValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Floating-point value.
    #[must_use]
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            TypedValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Boolean value.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            TypedValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Date-time value.
    #[must_use]
    pub fn datetime(&self, name: &str) -> Option<OffsetDateTime> {
        match self.get(name)? {
            TypedValue::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    /// Money value.
    #[must_use]
    pub fn money(&self, name: &str) -> Option<Money> {
        match self.get(name)? {
            TypedValue::Money(value) => Some(*value),
            _ => None,
        }
    }

    /// File handle.
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&FileHandle> {
        match self.get(name)? {
            TypedValue::File(handle) => Some(handle),
            _ => None,
        }
    }

    /// Renders present and null arguments as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let map = self
            .entries
            .iter()
            .filter_map(|(name, value)| match value {
                Coerced::Absent => None,
                Coerced::Null => Some((name.clone(), Value::Null)),
                Coerced::Value(value) => Some((name.clone(), value.to_json())),
            })
            .collect();
        Value::Object(map)
    }
}
