//! Calendar rules. Every instant is normalised to UTC.

use serde_json::Value;
use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use super::Rejection;
use crate::value::TypedValue;

const DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_SECONDS: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
const TIME_MINUTES: &[FormatItem<'static>] = format_description!("[hour]:[minute]");
const LOCAL_FORMATS: [&[FormatItem<'static>]; 4] = [
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
];

fn text(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim)
}

pub(super) fn date(value: &Value) -> Result<TypedValue, Rejection> {
    const EXPECTED: &str = "a date formatted as YYYY-MM-DD";
    text(value)
        .and_then(|raw| Date::parse(raw, DATE).ok())
        .map(TypedValue::Date)
        .ok_or(Rejection::invalid(EXPECTED))
}

pub(super) fn time(value: &Value) -> Result<TypedValue, Rejection> {
    const EXPECTED: &str = "a time formatted as HH:MM or HH:MM:SS";
    text(value)
        .and_then(|raw| {
            Time::parse(raw, TIME_SECONDS)
                .or_else(|_| Time::parse(raw, TIME_MINUTES))
                .ok()
        })
        .map(TypedValue::Time)
        .ok_or(Rejection::invalid(EXPECTED))
}

pub(super) fn datetime(value: &Value) -> Result<TypedValue, Rejection> {
    const EXPECTED: &str = "an RFC 3339 date-time or a unix timestamp";
    let instant = match value {
        Value::Number(number) => number
            .as_i64()
            .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok()),
        Value::String(raw) => parse_instant(raw.trim()),
        _ => None,
    };
    instant
        .map(|instant| TypedValue::DateTime(instant.to_offset(UtcOffset::UTC)))
        .ok_or(Rejection::invalid(EXPECTED))
}

fn parse_instant(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(instant) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(instant);
    }
    if let Ok(seconds) = raw.parse::<i64>() {
        return OffsetDateTime::from_unix_timestamp(seconds).ok();
    }
    LOCAL_FORMATS
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(raw, format).ok())
        .map(PrimitiveDateTime::assume_utc)
}
