//! Parameter type tags.
//!
//! Every declared parameter carries exactly one [`ParamType`]. The set is
//! closed: a tag that does not parse is a configuration error raised when the
//! declaration is built or loaded, never a per-request failure.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Declared type of a command parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// Signed integer.
    Int,
    /// IEEE-754 double.
    Float,
    /// Boolean literal or truthy/falsy token.
    Bool,
    /// Any scalar rendered as text.
    String,
    /// Ordered or keyed collection.
    Array,
    /// Structured map.
    Object,
    /// Array or object.
    Iterable,
    /// One of a declared set of values.
    Enum(Vec<String>),
    /// CSS-style colour.
    Color,
    /// Absolute URL.
    Url,
    /// Email address.
    Email,
    /// Currency amount with two decimal places.
    Money,
    /// Calendar date.
    Date,
    /// Wall-clock time.
    Time,
    /// Date and time, normalised to UTC.
    DateTime,
    /// `HH:MM:SS` duration.
    Timespan,
    /// Binary payload reference; only valid on binary commands.
    File,
}

/// Raised when a type tag is not one of the recognised tags.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported parameter type '{tag}'")]
pub struct UnsupportedType {
    /// The offending tag.
    pub tag: String,
}

impl ParamType {
    /// Builds an enum type from its allowed values.
    #[must_use]
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum(values.into_iter().map(Into::into).collect())
    }

    /// Returns the bare tag without enum values.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
            Self::Iterable => "iterable",
            Self::Enum(_) => "enum",
            Self::Color => "color",
            Self::Url => "url",
            Self::Email => "email",
            Self::Money => "money",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::Timespan => "timespan",
            Self::File => "file",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enum(values) => write!(f, "enum({})", values.join(",")),
            other => f.write_str(other.tag()),
        }
    }
}

impl FromStr for ParamType {
    type Err = UnsupportedType;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let tag = input.trim();
        let unsupported = || UnsupportedType {
            tag: tag.to_owned(),
        };

        if let Some(body) = tag
            .strip_prefix("enum(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let values: Vec<String> = body
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
                .collect();
            if values.is_empty() {
                return Err(unsupported());
            }
            return Ok(Self::Enum(values));
        }

        Ok(match tag.to_ascii_lowercase().as_str() {
            "int" | "integer" => Self::Int,
            "float" | "double" => Self::Float,
            "bool" | "boolean" => Self::Bool,
            "string" => Self::String,
            "array" => Self::Array,
            "object" => Self::Object,
            "iterable" => Self::Iterable,
            "color" | "colour" => Self::Color,
            "url" => Self::Url,
            "email" => Self::Email,
            "money" => Self::Money,
            "date" => Self::Date,
            "time" => Self::Time,
            "datetime" => Self::DateTime,
            "timespan" => Self::Timespan,
            "file" => Self::File,
            _ => return Err(unsupported()),
        })
    }
}

impl Serialize for ParamType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ParamType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(serde::de::Error::custom)
    }
}
