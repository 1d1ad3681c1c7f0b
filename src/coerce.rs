//! Type-coercibility predicates.
//!
//! [`StandardCoercer`] looks up the [`CoercionClass`] of a declared
//! [`LogicalType`] and applies that class's predicate. Values are only
//! checked here, never converted.
//!
//! | class     | accepts |
//! |-----------|---------|
//! | textual   | any value |
//! | integer   | base-10 integer text, integers, booleans, integral floats |
//! | decimal   | floating-point text, integers, floats, booleans |
//! | boolean   | text form (lower-cased) of `true`, `false`, `1`, `0` |
//! | date      | `YYYY-MM-DD` |
//! | datetime  | `YYYY-MM-DD HH:MM:SS` |
//! | time      | `HH:MM:SS` |
//! | timestamp | see [`TimestampDialect`] |
//!
//! Unrecognized type tags accept nothing.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::{
    data::Value,
    literal::strip_separators,
    schema::{CoercionClass, LogicalType},
};

pub const DEFAULT_TIMESTAMP_ZONES: &[&str] = &["UTC", "GMT"];

/// Decides whether a non-null value fits a declared type.
pub trait TypeCoercer {
    fn coerce(&self, value: &Value, ty: &LogicalType) -> bool;
}

impl<T: TypeCoercer + ?Sized> TypeCoercer for &T {
    fn coerce(&self, value: &Value, ty: &LogicalType) -> bool {
        (**self).coerce(value, ty)
    }
}

/// Timestamp encodings accepted for `TIMESTAMP` columns, in the order they
/// are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampDialect {
    /// `2023-07-01T08:15:30Z`, `2023-07-02T10:20:45.5+02:00`, `2023-07-02T10:20:45`
    Iso8601,
    /// `2023-07-10 02:15:25.123456 UTC`
    FractionalWithZone,
    /// `2023-07-10 02:15:25 UTC`
    WithZone,
    /// `2023-07-10 02:15:25.123456`
    Fractional,
    /// `2023-07-10 02:15:25`
    Plain,
}

const SPACED_DIALECTS: [(TimestampDialect, bool, bool); 4] = [
    (TimestampDialect::FractionalWithZone, true, true),
    (TimestampDialect::WithZone, false, true),
    (TimestampDialect::Fractional, true, false),
    (TimestampDialect::Plain, false, false),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardCoercer {
    timestamp_zones: Vec<String>,
}

impl Default for StandardCoercer {
    fn default() -> Self {
        Self::with_timestamp_zones(DEFAULT_TIMESTAMP_ZONES)
    }
}

impl StandardCoercer {
    /// Zone names accepted by the named-zone timestamp dialects, compared
    /// case-insensitively.
    pub fn with_timestamp_zones<I, S>(zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let timestamp_zones = zones
            .into_iter()
            .map(|zone| zone.as_ref().trim().to_ascii_uppercase())
            .filter(|zone| !zone.is_empty())
            .collect();
        Self { timestamp_zones }
    }

    pub fn timestamp_zones(&self) -> &[String] {
        &self.timestamp_zones
    }

    pub fn timestamp_dialect(&self, value: &Value) -> Option<TimestampDialect> {
        let text = value.as_str()?;
        if iso_timestamp_pattern().is_match(text) && parses_as_iso8601(text) {
            return Some(TimestampDialect::Iso8601);
        }
        SPACED_DIALECTS
            .iter()
            .find(|(_, fraction, zone)| self.matches_spaced(text, *fraction, *zone))
            .map(|(dialect, _, _)| *dialect)
    }

    fn matches_spaced(&self, text: &str, fraction: bool, zone: bool) -> bool {
        let body = if zone {
            match text.rsplit_once(' ') {
                Some((body, name)) if self.accepts_zone(name) => body,
                _ => return false,
            }
        } else {
            text
        };
        let Some(captures) = spaced_timestamp_pattern().captures(body) else {
            return false;
        };
        if captures.get(1).is_some() != fraction {
            return false;
        }
        let format = if fraction {
            "%Y-%m-%d %H:%M:%S%.f"
        } else {
            "%Y-%m-%d %H:%M:%S"
        };
        NaiveDateTime::parse_from_str(body, format).is_ok()
    }

    fn accepts_zone(&self, name: &str) -> bool {
        self.timestamp_zones
            .iter()
            .any(|zone| zone.eq_ignore_ascii_case(name))
    }
}

impl TypeCoercer for StandardCoercer {
    fn coerce(&self, value: &Value, ty: &LogicalType) -> bool {
        let Some(class) = ty.coercion_class() else {
            return false;
        };
        match class {
            CoercionClass::Textual => true,
            CoercionClass::Integer => is_integer(value),
            CoercionClass::Decimal => is_decimal(value),
            CoercionClass::Boolean => is_boolean(value),
            CoercionClass::Date => is_date(value),
            CoercionClass::DateTime => is_datetime(value),
            CoercionClass::Time => is_time(value),
            CoercionClass::Timestamp => self.timestamp_dialect(value).is_some(),
        }
    }
}

/// Checks `value` against `ty` using the default zone list.
pub fn coerce(value: &Value, ty: &LogicalType) -> bool {
    static DEFAULT: OnceLock<StandardCoercer> = OnceLock::new();
    DEFAULT
        .get_or_init(StandardCoercer::default)
        .coerce(value, ty)
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Integer(_) | Value::Boolean(_) => true,
        // `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
        Value::Float(f) => f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f),
        Value::String(text) => parse_integer_text(text).is_some(),
        _ => false,
    }
}

fn is_decimal(value: &Value) -> bool {
    match value {
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) => true,
        Value::String(text) => parse_float_text(text).is_some(),
        _ => false,
    }
}

fn is_boolean(value: &Value) -> bool {
    if value.is_null() {
        return false;
    }
    matches!(
        value.textual_form().to_lowercase().as_str(),
        "true" | "false" | "1" | "0"
    )
}

fn is_date(value: &Value) -> bool {
    value.as_str().is_some_and(|text| {
        date_pattern().is_match(text) && NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
    })
}

fn is_datetime(value: &Value) -> bool {
    value.as_str().is_some_and(|text| {
        datetime_pattern().is_match(text)
            && NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").is_ok()
    })
}

fn is_time(value: &Value) -> bool {
    value.as_str().is_some_and(|text| {
        time_pattern().is_match(text) && NaiveTime::parse_from_str(text, "%H:%M:%S").is_ok()
    })
}

/// Base-10 integer text: surrounding whitespace, one optional sign, and `_`
/// separators between digits are allowed. Values must fit in 64 bits.
pub fn parse_integer_text(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(body) => (true, body),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits = strip_separators(body, false, |c| c.is_ascii_digit())?;
    let magnitude: i128 = digits.parse().ok()?;
    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}

/// Floating-point text, including `inf`/`infinity`/`nan` spellings and `_`
/// separators between digits.
pub fn parse_float_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if !trimmed.contains('_') {
        return trimmed.parse().ok();
    }
    let bytes = trimmed.as_bytes();
    let separators_ok = bytes.iter().enumerate().all(|(idx, byte)| {
        *byte != b'_'
            || (idx > 0
                && idx + 1 < bytes.len()
                && bytes[idx - 1].is_ascii_digit()
                && bytes[idx + 1].is_ascii_digit())
    });
    if !separators_ok {
        return None;
    }
    trimmed.replace('_', "").parse().ok()
}

fn parses_as_iso8601(text: &str) -> bool {
    let normalized = text.replace('Z', "+00:00");
    let has_offset = normalized.len() > 19 && normalized[19..].contains(['+', '-']);
    if has_offset {
        DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f%:z").is_ok()
    } else {
        NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
    }
}

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern compiles"))
}

fn iso_timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    compiled(
        &PATTERN,
        r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(?:\.[0-9]+)?(?:Z|[+-][0-9]{2}:[0-9]{2})?$",
    )
}

fn spaced_timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    compiled(
        &PATTERN,
        r"^[0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]{1,6})?$",
    )
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    compiled(&PATTERN, r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$")
}

fn datetime_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    compiled(
        &PATTERN,
        r"^[0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}$",
    )
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    compiled(&PATTERN, r"^[0-9]{2}:[0-9]{2}:[0-9]{2}$")
}
