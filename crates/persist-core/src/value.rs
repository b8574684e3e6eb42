// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Engine-neutral value representation and key encoding.
//!
//! [`Value`] is the bridge type between Rust field values and SQLite's
//! four storage classes. The derive macro emits conversions into and out
//! of this type so that DDL synthesis, predicate translation and the
//! persistence provider never need to know the concrete Rust type of a
//! column.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A single bound or fetched column value.
///
/// Mirrors SQLite's storage classes plus `Null`. Temporal values are
/// carried as [`Value::Text`] using ISO-8601 with millisecond precision
/// and an explicit offset (component E, "Key Codec").
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `NULL`.
    Null,
    /// `INTEGER` — covers all integer widths, booleans (`0`/`1`) and enum
    /// discriminants.
    Integer(i64),
    /// `REAL` — floating point and decimal/money columns.
    Real(f64),
    /// `TEXT` — fixed/variable text, temporal, UUID and enum-as-string
    /// columns.
    Text(String),
    /// `BLOB` — binary payloads (serialized cache entries, etc.).
    Blob(Vec<u8>)
}

impl Value {
    /// SQLite storage class name, as used in `CREATE TABLE` column
    /// definitions.
    #[must_use]
    pub const fn storage_class(&self) -> &'static str {
        match self {
            Self::Null => "TEXT",
            Self::Integer(_) => "INTEGER",
            Self::Real(_) => "REAL",
            Self::Text(_) => "TEXT",
            Self::Blob(_) => "BLOB"
        }
    }

    /// Returns the integer value, if this is [`Value::Integer`].
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None
        }
    }

    /// Returns the text value, if this is [`Value::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v.as_str()),
            _ => None
        }
    }

    /// Returns true if this is [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Blob(v) => write!(f, "<{} bytes>", v.len())
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Integer(i64::from(v))
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),+) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self::Integer(v as i64)
                }
            }
        )+
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Real(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Text(encode_uuid(&v))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Text(encode_timestamp(&v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Self::Null
        }
    }
}

/// Canonical ISO-8601 encoding with millisecond precision and an
/// explicit `Z` offset (component E, "Key Codec" temporal rule).
#[must_use]
pub fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Parses a timestamp previously produced by [`encode_timestamp`].
///
/// # Errors
///
/// Returns an error if `raw` is not a valid RFC 3339 timestamp.
pub fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

/// Canonical hyphenated lowercase hex encoding for UUID keys.
#[must_use]
pub fn encode_uuid(id: &Uuid) -> String {
    id.hyphenated().to_string()
}

/// Converts a fetched [`Value`] back into a concrete Rust field type.
///
/// The inverse of the `From<T> for Value` impls above; implemented by
/// the derive macro's generated `from_values` body for every mapped
/// field type.
pub trait FromValue: Sized {
    /// Attempts the conversion.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PersistError::Serialization`] if `value`
    /// carries the wrong storage class for `Self`.
    fn from_value(value: Value) -> Result<Self, crate::error::PersistError>;
}

fn mismatch(expected: &str, value: &Value) -> crate::error::PersistError {
    crate::error::PersistError::Serialization(format!(
        "expected {expected}, found {value:?}"
    ))
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, crate::error::PersistError> {
        match value {
            Value::Integer(v) => Ok(v != 0),
            other => Err(mismatch("INTEGER (bool)", &other))
        }
    }
}

macro_rules! impl_from_value_integer {
    ($($t:ty),+) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self, crate::error::PersistError> {
                    match value {
                        Value::Integer(v) => <$t>::try_from(v).map_err(|_| mismatch(stringify!($t), &Value::Integer(v))),
                        other => Err(mismatch(stringify!($t), &other))
                    }
                }
            }
        )+
    };
}

impl_from_value_integer!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, crate::error::PersistError> {
        match value {
            Value::Real(v) => Ok(v as f32),
            other => Err(mismatch("REAL (f32)", &other))
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, crate::error::PersistError> {
        match value {
            Value::Real(v) => Ok(v),
            other => Err(mismatch("REAL (f64)", &other))
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, crate::error::PersistError> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(mismatch("TEXT (String)", &other))
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, crate::error::PersistError> {
        match value {
            Value::Blob(v) => Ok(v),
            other => Err(mismatch("BLOB (Vec<u8>)", &other))
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> Result<Self, crate::error::PersistError> {
        match value {
            Value::Text(v) => Uuid::parse_str(&v).map_err(|e| {
                crate::error::PersistError::Serialization(format!("invalid uuid '{v}': {e}"))
            }),
            other => Err(mismatch("TEXT (Uuid)", &other))
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, crate::error::PersistError> {
        match value {
            Value::Text(v) => decode_timestamp(&v).map_err(|e| {
                crate::error::PersistError::Serialization(format!("invalid timestamp '{v}': {e}"))
            }),
            other => Err(mismatch("TEXT (DateTime<Utc>)", &other))
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, crate::error::PersistError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// Canonical string form of a key for any supported primitive type.
///
/// Used when a caller needs a stable string representation of a key for
/// logging or for composite-key concatenation; internal binding always
/// goes through [`Value`] directly.
pub trait KeyEncode {
    /// Encode this key as its canonical string form.
    fn encode_key(&self) -> String;
}

impl KeyEncode for String {
    fn encode_key(&self) -> String {
        self.clone()
    }
}

impl KeyEncode for &str {
    fn encode_key(&self) -> String {
        (*self).to_string()
    }
}

impl KeyEncode for i64 {
    fn encode_key(&self) -> String {
        self.to_string()
    }
}

impl KeyEncode for i32 {
    fn encode_key(&self) -> String {
        self.to_string()
    }
}

impl KeyEncode for u64 {
    fn encode_key(&self) -> String {
        self.to_string()
    }
}

impl KeyEncode for bool {
    fn encode_key(&self) -> String {
        i64::from(*self).to_string()
    }
}

impl KeyEncode for Uuid {
    fn encode_key(&self) -> String {
        encode_uuid(self)
    }
}

impl KeyEncode for DateTime<Utc> {
    fn encode_key(&self) -> String {
        encode_timestamp(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_encodes_as_digit() {
        assert_eq!(Value::from(true), Value::Integer(1));
        assert_eq!(Value::from(false), Value::Integer(0));
        assert_eq!(true.encode_key(), "1");
    }

    #[test]
    fn option_none_is_null() {
        let v: Value = Option::<i32>::None.into();
        assert_eq!(v, Value::Null);
        assert!(v.is_null());
    }

    #[test]
    fn option_some_unwraps() {
        let v: Value = Some(5i32).into();
        assert_eq!(v, Value::Integer(5));
    }

    #[test]
    fn timestamp_round_trips() {
        let now = Utc::now();
        let encoded = encode_timestamp(&now);
        let decoded = decode_timestamp(&encoded).unwrap();
        assert_eq!(now.timestamp_millis(), decoded.timestamp_millis());
    }

    #[test]
    fn uuid_encodes_lowercase_hyphenated() {
        let id = Uuid::nil();
        assert_eq!(encode_uuid(&id), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn storage_classes() {
        assert_eq!(Value::Integer(1).storage_class(), "INTEGER");
        assert_eq!(Value::Real(1.0).storage_class(), "REAL");
        assert_eq!(Value::Text("x".into()).storage_class(), "TEXT");
        assert_eq!(Value::Blob(vec![]).storage_class(), "BLOB");
    }

    #[test]
    fn from_value_round_trips_primitives() {
        assert_eq!(i64::from_value(Value::Integer(7)).unwrap(), 7);
        assert!(bool::from_value(Value::Integer(1)).unwrap());
        assert_eq!(String::from_value(Value::Text("hi".into())).unwrap(), "hi");
        assert_eq!(f64::from_value(Value::Real(1.5)).unwrap(), 1.5);
        assert_eq!(Vec::<u8>::from_value(Value::Blob(vec![1, 2])).unwrap(), vec![1, 2]);
    }

    #[test]
    fn from_value_option_null_is_none() {
        assert_eq!(Option::<i64>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i64>::from_value(Value::Integer(3)).unwrap(), Some(3));
    }

    #[test]
    fn from_value_rejects_wrong_storage_class() {
        assert!(i64::from_value(Value::Text("x".into())).is_err());
        assert!(String::from_value(Value::Integer(1)).is_err());
    }

    #[test]
    fn from_value_uuid_and_timestamp_round_trip() {
        let id = Uuid::nil();
        let encoded = Value::from(id);
        assert_eq!(Uuid::from_value(encoded).unwrap(), id);

        let now = Utc::now();
        let encoded = Value::from(now);
        let decoded = DateTime::<Utc>::from_value(encoded).unwrap();
        assert_eq!(decoded.timestamp_millis(), now.timestamp_millis());
    }
}
