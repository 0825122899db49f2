//! Raw string coercion
//!
//! Raw column strings are parsed once into a [`FieldValue`] by the field's
//! [`FieldKind`], then narrowed into the concrete field type through
//! [`FromFieldValue`]. Every narrowing is checked; overflow is an error, never
//! truncation.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::num::IntErrorKind;

use crate::error::BindError;
use crate::types::{Column, ColumnType, Value};

use super::schema::{FieldKind, FieldSpec};

/// A coerced value on its way into a structure field
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum FieldValue {
    /// Empty value for an optional field
    Null,
    Str(String),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
}

impl FieldValue {
    fn describe(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Str(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::UInt(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::DateTime(d) => d.to_string(),
            Self::DateTimeUtc(d) => d.to_rfc3339(),
        }
    }

    fn mismatch(self, target: &str, expected: &'static str) -> BindError {
        BindError::Parse {
            target: target.to_string(),
            value: self.describe(),
            expected,
        }
    }
}

/// Conversion from a coerced value into a concrete field type
pub trait FromFieldValue: Sized {
    /// Convert, naming `target` in any error
    fn from_field_value(value: FieldValue, target: &str) -> Result<Self, BindError>;
}

impl FromFieldValue for String {
    fn from_field_value(value: FieldValue, target: &str) -> Result<Self, BindError> {
        match value {
            FieldValue::Str(s) => Ok(s),
            other => Err(other.mismatch(target, "string")),
        }
    }
}

impl FromFieldValue for bool {
    fn from_field_value(value: FieldValue, target: &str) -> Result<Self, BindError> {
        match value {
            FieldValue::Bool(b) => Ok(b),
            other => Err(other.mismatch(target, "bool")),
        }
    }
}

macro_rules! impl_from_field_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromFieldValue for $ty {
                fn from_field_value(value: FieldValue, target: &str) -> Result<Self, BindError> {
                    let converted = match &value {
                        FieldValue::Int(n) => <$ty>::try_from(*n).ok(),
                        FieldValue::UInt(n) => <$ty>::try_from(*n).ok(),
                        _ => return Err(value.mismatch(target, stringify!($ty))),
                    };
                    converted.ok_or_else(|| BindError::Overflow {
                        target: target.to_string(),
                        value: value.describe(),
                        kind: stringify!($ty),
                    })
                }
            }
        )*
    };
}

impl_from_field_value_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromFieldValue for f64 {
    fn from_field_value(value: FieldValue, target: &str) -> Result<Self, BindError> {
        match value {
            FieldValue::Float(n) => Ok(n),
            other => Err(other.mismatch(target, "f64")),
        }
    }
}

impl FromFieldValue for f32 {
    fn from_field_value(value: FieldValue, target: &str) -> Result<Self, BindError> {
        match value {
            FieldValue::Float(n) if !n.is_finite() || n.abs() <= f64::from(f32::MAX) => {
                Ok(n as f32)
            }
            FieldValue::Float(n) => Err(BindError::Overflow {
                target: target.to_string(),
                value: n.to_string(),
                kind: "f32",
            }),
            other => Err(other.mismatch(target, "f32")),
        }
    }
}

impl FromFieldValue for NaiveDateTime {
    fn from_field_value(value: FieldValue, target: &str) -> Result<Self, BindError> {
        match value {
            FieldValue::DateTime(d) => Ok(d),
            FieldValue::DateTimeUtc(d) => Ok(d.naive_utc()),
            other => Err(other.mismatch(target, "datetime")),
        }
    }
}

impl FromFieldValue for DateTime<Utc> {
    fn from_field_value(value: FieldValue, target: &str) -> Result<Self, BindError> {
        match value {
            FieldValue::DateTimeUtc(d) => Ok(d),
            FieldValue::DateTime(d) => Ok(d.and_utc()),
            other => Err(other.mismatch(target, "datetime")),
        }
    }
}

impl<T: FromFieldValue> FromFieldValue for Option<T> {
    fn from_field_value(value: FieldValue, target: &str) -> Result<Self, BindError> {
        match value {
            FieldValue::Null => Ok(None),
            other => T::from_field_value(other, target).map(Some),
        }
    }
}

/// Parse a non-empty raw value by the field's kind
pub(crate) fn coerce(
    field: &FieldSpec,
    raw: &str,
    datetime_format: &str,
) -> Result<FieldValue, BindError> {
    let target = field.name.as_str();
    match &field.kind {
        FieldKind::Str => Ok(FieldValue::Str(raw.to_string())),
        FieldKind::Bool => Ok(FieldValue::Bool(raw == "1" || raw == "true")),
        FieldKind::I8 => signed(target, raw, i8::MIN.into(), i8::MAX.into(), "i8"),
        FieldKind::I16 => signed(target, raw, i16::MIN.into(), i16::MAX.into(), "i16"),
        FieldKind::I32 => signed(target, raw, i32::MIN.into(), i32::MAX.into(), "i32"),
        FieldKind::I64 => signed(target, raw, i64::MIN, i64::MAX, "i64"),
        FieldKind::Isize => signed(target, raw, isize::MIN as i64, isize::MAX as i64, "isize"),
        FieldKind::U8 => unsigned(target, raw, u8::MAX.into(), "u8"),
        FieldKind::U16 => unsigned(target, raw, u16::MAX.into(), "u16"),
        FieldKind::U32 => unsigned(target, raw, u32::MAX.into(), "u32"),
        FieldKind::U64 => unsigned(target, raw, u64::MAX, "u64"),
        FieldKind::Usize => unsigned(target, raw, usize::MAX as u64, "usize"),
        FieldKind::F32 => float(target, raw, Some(f64::from(f32::MAX)), "f32"),
        FieldKind::F64 => float(target, raw, None, "f64"),
        FieldKind::NaiveDateTime => parse_timestamp(raw, datetime_format)
            .map(|d| FieldValue::DateTime(d.naive_utc()))
            .ok_or_else(|| parse_error(target, raw, "datetime")),
        FieldKind::DateTimeUtc => parse_timestamp(raw, datetime_format)
            .map(FieldValue::DateTimeUtc)
            .ok_or_else(|| parse_error(target, raw, "datetime")),
        FieldKind::Unsupported(kind) => Err(BindError::Unsupported {
            field: target.to_string(),
            kind: kind.clone(),
        }),
    }
}

/// Decode one column for a map target
pub(crate) fn decode_column(
    column: &Column,
    raw: Option<&str>,
    datetime_format: &str,
) -> Result<Value, BindError> {
    let Some(raw) = raw else {
        return Ok(Value::Null);
    };
    let target = column.name.as_str();

    match column.column_type() {
        ColumnType::Integer if raw.is_empty() => Ok(Value::Null),
        ColumnType::Integer => match signed(target, raw, i64::MIN, i64::MAX, "i64")? {
            FieldValue::Int(n) => Ok(Value::Int(n)),
            _ => Err(parse_error(target, raw, "integer")),
        },
        ColumnType::Float if raw.is_empty() => Ok(Value::Null),
        ColumnType::Float => match float(target, raw, None, "f64")? {
            FieldValue::Float(n) => Ok(Value::Float(n)),
            _ => Err(parse_error(target, raw, "float")),
        },
        ColumnType::DateTime => Ok(Value::Text(normalize_datetime(raw, datetime_format))),
        ColumnType::Boolean | ColumnType::Text => Ok(Value::Text(raw.to_string())),
    }
}

/// Re-format an RFC 3339 timestamp; anything else is kept verbatim
pub(crate) fn normalize_datetime(raw: &str, datetime_format: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.format(datetime_format).to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn parse_timestamp(raw: &str, datetime_format: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, datetime_format).map(|d| d.and_utc()))
        .ok()
}

fn signed(target: &str, raw: &str, min: i64, max: i64, kind: &'static str) -> Result<FieldValue, BindError> {
    match raw.parse::<i64>() {
        Ok(n) if n >= min && n <= max => Ok(FieldValue::Int(n)),
        Ok(_) => Err(overflow(target, raw, kind)),
        Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
            Err(overflow(target, raw, kind))
        }
        Err(_) => Err(parse_error(target, raw, kind)),
    }
}

fn unsigned(target: &str, raw: &str, max: u64, kind: &'static str) -> Result<FieldValue, BindError> {
    match raw.parse::<u64>() {
        Ok(n) if n <= max => Ok(FieldValue::UInt(n)),
        Ok(_) => Err(overflow(target, raw, kind)),
        Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow) => Err(overflow(target, raw, kind)),
        Err(_) => Err(parse_error(target, raw, kind)),
    }
}

fn float(target: &str, raw: &str, max: Option<f64>, kind: &'static str) -> Result<FieldValue, BindError> {
    let n: f64 = raw.parse().map_err(|_| parse_error(target, raw, kind))?;
    // A finite literal that parses to infinity is out of range.
    let spelled_infinite = raw.to_ascii_lowercase().contains("inf");
    if n.is_infinite() && !spelled_infinite {
        return Err(overflow(target, raw, kind));
    }
    if let Some(max) = max {
        if n.is_finite() && n.abs() > max {
            return Err(overflow(target, raw, kind));
        }
    }
    Ok(FieldValue::Float(n))
}

fn parse_error(target: &str, raw: &str, expected: &'static str) -> BindError {
    BindError::Parse {
        target: target.to_string(),
        value: raw.to_string(),
        expected,
    }
}

fn overflow(target: &str, raw: &str, kind: &'static str) -> BindError {
    BindError::Overflow {
        target: target.to_string(),
        value: raw.to_string(),
        kind,
    }
}
