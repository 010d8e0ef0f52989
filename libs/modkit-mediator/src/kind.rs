//! Logical field kinds and wire-value coercion.
//!
//! Every column of a registered entity is classified into a [`FieldKind`].
//! The kind drives two conversions:
//! - wire scalar (`serde_json::Value`) to data-access value (`sea_orm::Value`),
//!   used for filter operands and primary-key lookups;
//! - timestamp string to Unix-epoch seconds and back, used when flattening
//!   and assigning attributes.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::ColumnType;
use serde_json::Value as JsonValue;

use crate::error::{MediatorError, Result};

/// Logical field types of entity columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Character and text columns.
    Text,
    /// Signed and unsigned integers of any width.
    Integer,
    Float,
    Boolean,
    Uuid,
    /// Date-time without offset (`DateTime` / `Timestamp` columns).
    Timestamp,
    /// Date-time with offset (`TimestampWithTimeZone` columns).
    TimestampTz,
    Date,
    Time,
    Decimal,
    /// Anything else (JSON, binary, enums, custom types); passed through as-is.
    Opaque,
}

impl FieldKind {
    /// Lower-case name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::Uuid => "uuid",
            FieldKind::Timestamp => "timestamp",
            FieldKind::TimestampTz => "timestamp with time zone",
            FieldKind::Date => "date",
            FieldKind::Time => "time",
            FieldKind::Decimal => "decimal",
            FieldKind::Opaque => "opaque",
        }
    }

    /// Whether values of this kind are exposed as Unix-epoch seconds.
    #[must_use]
    pub fn is_timestamp(self) -> bool {
        matches!(self, FieldKind::Timestamp | FieldKind::TimestampTz)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&ColumnType> for FieldKind {
    fn from(ty: &ColumnType) -> Self {
        match ty {
            ColumnType::Char(_) | ColumnType::String(_) | ColumnType::Text => FieldKind::Text,
            ColumnType::TinyInteger
            | ColumnType::SmallInteger
            | ColumnType::Integer
            | ColumnType::BigInteger
            | ColumnType::TinyUnsigned
            | ColumnType::SmallUnsigned
            | ColumnType::Unsigned
            | ColumnType::BigUnsigned => FieldKind::Integer,
            ColumnType::Float | ColumnType::Double => FieldKind::Float,
            ColumnType::Decimal(_) | ColumnType::Money(_) => FieldKind::Decimal,
            ColumnType::Boolean => FieldKind::Boolean,
            ColumnType::Uuid => FieldKind::Uuid,
            ColumnType::DateTime | ColumnType::Timestamp => FieldKind::Timestamp,
            ColumnType::TimestampWithTimeZone => FieldKind::TimestampTz,
            ColumnType::Date => FieldKind::Date,
            ColumnType::Time => FieldKind::Time,
            _ => FieldKind::Opaque,
        }
    }
}

/* ---------- timestamp helpers ---------- */

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Converts a serialized timestamp into Unix-epoch seconds.
///
/// `null` stays `null`; numbers are assumed to already be epoch seconds.
/// Strings that do not parse as a timestamp become `null`.
#[must_use]
pub fn timestamp_to_epoch(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::String(s) => {
            parse_timestamp(s).map_or(JsonValue::Null, |dt| JsonValue::from(dt.timestamp()))
        }
        JsonValue::Number(_) => value.clone(),
        _ => JsonValue::Null,
    }
}

/// Converts an epoch-seconds number into the string form the model's serde
/// representation expects for `kind`. Other values are returned unchanged.
#[must_use]
pub fn epoch_to_timestamp(kind: FieldKind, value: &JsonValue) -> JsonValue {
    let Some(secs) = value.as_i64() else {
        return value.clone();
    };
    let Some(dt) = DateTime::<Utc>::from_timestamp(secs, 0) else {
        return value.clone();
    };
    match kind {
        FieldKind::Timestamp => {
            JsonValue::String(dt.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string())
        }
        FieldKind::TimestampTz => JsonValue::String(dt.to_rfc3339()),
        _ => value.clone(),
    }
}

/* ---------- coercion ---------- */

fn as_text(v: &JsonValue) -> Option<String> {
    match v {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerces a wire scalar into a data-access value for a column of `kind`.
///
/// # Errors
/// Returns [`MediatorError::InvalidValue`] when `value` cannot represent `kind`.
pub fn coerce(attribute: &str, kind: FieldKind, value: &JsonValue) -> Result<sea_orm::Value> {
    let invalid = || MediatorError::invalid_value(attribute, kind, value);

    let coerced = match kind {
        FieldKind::Text | FieldKind::Opaque => {
            sea_orm::Value::from(as_text(value).ok_or_else(invalid)?)
        }
        FieldKind::Integer => {
            let i = match value {
                JsonValue::Number(n) => n.as_i64(),
                JsonValue::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            }
            .ok_or_else(invalid)?;
            sea_orm::Value::from(i)
        }
        FieldKind::Float => {
            let f = match value {
                JsonValue::Number(n) => n.as_f64(),
                JsonValue::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .ok_or_else(invalid)?;
            sea_orm::Value::from(f)
        }
        FieldKind::Boolean => {
            let b = match value {
                JsonValue::Bool(b) => Some(*b),
                JsonValue::Number(n) => n.as_i64().map(|i| i != 0),
                JsonValue::String(s) => s.parse::<bool>().ok(),
                _ => None,
            }
            .ok_or_else(invalid)?;
            sea_orm::Value::from(b)
        }
        FieldKind::Uuid => {
            let u = value
                .as_str()
                .and_then(|s| s.parse::<uuid::Uuid>().ok())
                .ok_or_else(invalid)?;
            sea_orm::Value::from(u)
        }
        FieldKind::Timestamp => {
            let dt = match value {
                JsonValue::Number(n) => n
                    .as_i64()
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
                JsonValue::String(s) => parse_timestamp(s),
                _ => None,
            }
            .ok_or_else(invalid)?;
            sea_orm::Value::from(dt.naive_utc())
        }
        FieldKind::TimestampTz => {
            let dt = match value {
                JsonValue::Number(n) => n
                    .as_i64()
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
                JsonValue::String(s) => parse_timestamp(s),
                _ => None,
            }
            .ok_or_else(invalid)?;
            sea_orm::Value::from(dt)
        }
        FieldKind::Date => {
            let d = value
                .as_str()
                .and_then(|s| s.parse::<NaiveDate>().ok())
                .ok_or_else(invalid)?;
            sea_orm::Value::from(d)
        }
        FieldKind::Time => {
            let t = value
                .as_str()
                .and_then(|s| s.parse::<NaiveTime>().ok())
                .ok_or_else(invalid)?;
            sea_orm::Value::from(t)
        }
        FieldKind::Decimal => {
            let d = as_text(value)
                .and_then(|s| {
                    Decimal::from_str_exact(&s)
                        .ok()
                        .or_else(|| s.parse::<Decimal>().ok())
                })
                .ok_or_else(invalid)?;
            sea_orm::Value::from(d)
        }
    };

    Ok(coerced)
}
