//! Pattern-based rules: colour, URL, email, money and timespan.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use url::Url;

use super::{Rejection, scalar_text};
use crate::value::{Money, TypedValue};

const BYTE: &str = r"(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)";
const PERCENT: &str = r"(?:100|[1-9]?\d)%";
const HUE: &str = r"(?:360|3[0-5]\d|[12]?\d?\d)";
const ALPHA: &str = r"(?:0|1|0?\.\d+|1\.0+|(?:100|[1-9]?\d)%)";

static HEX_COLOR: Lazy<Option<Regex>> =
    Lazy::new(|| compile(r"^#(?:[0-9a-f]{3,4}|[0-9a-f]{6}|[0-9a-f]{8})$"));
// Each channel is a byte or a percentage.
static RGB_COLOR: Lazy<Option<Regex>> = Lazy::new(|| {
    let channel = format!("(?:{PERCENT}|{BYTE})");
    compile(&format!(
        r"^rgba?\({channel},{channel},{channel}(?:,{ALPHA})?\)$"
    ))
});
static HSL_COLOR: Lazy<Option<Regex>> = Lazy::new(|| {
    compile(&format!(
        r"^hsla?\({HUE}(?:deg)?,{PERCENT},{PERCENT}(?:,{ALPHA})?\)$"
    ))
});
static EMAIL: Lazy<Option<Regex>> = Lazy::new(|| {
    compile(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
});
static MONEY: Lazy<Option<Regex>> = Lazy::new(|| compile(r"^([+-])?(\d{1,15})(?:[.,](\d{1,2}))?$"));
static TIMESPAN: Lazy<Option<Regex>> = Lazy::new(|| compile(r"^(\d{1,6}):([0-5]\d):([0-5]\d)$"));

// Patterns are literals exercised by the tests below; a pattern that fails to
// compile matches nothing.
fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

fn is_match(pattern: &Lazy<Option<Regex>>, text: &str) -> bool {
    Lazy::force(pattern).as_ref().is_some_and(|regex| regex.is_match(text))
}

fn captures<'t>(pattern: &Lazy<Option<Regex>>, text: &'t str) -> Option<Captures<'t>> {
    Lazy::force(pattern).as_ref().and_then(|regex| regex.captures(text))
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_owned()),
        _ => None,
    }
}

pub(super) fn color(value: &Value) -> Result<TypedValue, Rejection> {
    let normalised: String = text(value)
        .ok_or(Rejection::invalid("a colour"))?
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    if is_match(&HEX_COLOR, &normalised)
        || is_match(&RGB_COLOR, &normalised)
        || is_match(&HSL_COLOR, &normalised)
    {
        Ok(TypedValue::Color(normalised))
    } else {
        Err(Rejection::invalid("a colour such as #a1b2c3 or rgb(0, 0, 0)"))
    }
}

pub(super) fn url(value: &Value) -> Result<TypedValue, Rejection> {
    const EXPECTED: &str = "an absolute URL";
    let candidate = text(value).ok_or(Rejection::invalid(EXPECTED))?;
    match Url::parse(&candidate) {
        Ok(parsed) if parsed.has_host() => Ok(TypedValue::Text(candidate)),
        _ => Err(Rejection::invalid(EXPECTED)),
    }
}

pub(super) fn email(value: &Value) -> Result<TypedValue, Rejection> {
    const EXPECTED: &str = "an email address";
    let candidate = text(value).ok_or(Rejection::invalid(EXPECTED))?;
    if candidate.len() <= 254 && is_match(&EMAIL, &candidate) {
        Ok(TypedValue::Text(candidate))
    } else {
        Err(Rejection::invalid(EXPECTED))
    }
}

pub(super) fn money(value: &Value) -> Result<TypedValue, Rejection> {
    const EXPECTED: &str = "an amount with at most two decimals";
    let candidate = scalar_text(value)
        .filter(|_| !value.is_boolean())
        .ok_or(Rejection::invalid(EXPECTED))?;
    let parts = captures(&MONEY, candidate.trim()).ok_or(Rejection::invalid(EXPECTED))?;

    let whole: i64 = parts
        .get(2)
        .and_then(|digits| digits.as_str().parse().ok())
        .ok_or(Rejection::invalid(EXPECTED))?;
    let cents: i64 = match parts.get(3).map(|digits| digits.as_str()) {
        None => 0,
        Some(digits) if digits.len() == 1 => digits.parse::<i64>().unwrap_or(0) * 10,
        Some(digits) => digits.parse().unwrap_or(0),
    };
    let magnitude = whole * 100 + cents;
    let minor_units = match parts.get(1).map(|sign| sign.as_str()) {
        Some("-") => -magnitude,
        _ => magnitude,
    };
    Ok(TypedValue::Money(Money::from_minor_units(minor_units)))
}

pub(super) fn timespan(value: &Value) -> Result<TypedValue, Rejection> {
    const EXPECTED: &str = "a duration formatted as HH:MM:SS";
    let candidate = text(value).ok_or(Rejection::invalid(EXPECTED))?;
    let parts = captures(&TIMESPAN, &candidate).ok_or(Rejection::invalid(EXPECTED))?;
    let field = |index: usize| -> u64 {
        parts
            .get(index)
            .and_then(|digits| digits.as_str().parse().ok())
            .unwrap_or(0)
    };
    Ok(TypedValue::Timespan(Duration::from_secs(
        field(1) * 3600 + field(2) * 60 + field(3),
    )))
}
