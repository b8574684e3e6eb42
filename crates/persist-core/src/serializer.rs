// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Pluggable payload codec (component B, "Serializer Registry").
//!
//! The cache facade (component H) stores arbitrary `V: Serialize +
//! DeserializeOwned` values as bytes plus a type tag. Which codec wrote
//! those bytes is recorded on the `CacheEntity` companion row
//! (`SerializationType`) so a read can pick the matching decoder.

use serde::{Serialize, de::DeserializeOwned};

use crate::error::PersistError;

/// A byte-level codec for cache payloads.
pub trait Serializer: Send + Sync + 'static {
    /// Name recorded in the `CacheEntity.SerializationType` column.
    fn type_name(&self) -> &'static str;

    /// Encode a value to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Serialization`] on codec failure.
    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, PersistError>;

    /// Decode bytes back into a value.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Serialization`] on codec failure.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, PersistError>;
}

/// Default structured-text codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn type_name(&self) -> &'static str {
        "JSON"
    }

    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, PersistError> {
        serde_json::to_vec(value).map_err(PersistError::from)
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, PersistError> {
        serde_json::from_slice(bytes).map_err(PersistError::from)
    }
}

/// Compact binary codec backed by `bincode`, enabled via the `binary`
/// feature for payload-size-sensitive caches.
#[cfg(feature = "binary")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeSerializer;

#[cfg(feature = "binary")]
impl Serializer for BincodeSerializer {
    fn type_name(&self) -> &'static str {
        "BINARY"
    }

    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, PersistError> {
        bincode::serialize(value).map_err(|e| PersistError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, PersistError> {
        bincode::deserialize(bytes).map_err(|e| PersistError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        n: i32,
        s: String
    }

    #[test]
    fn json_round_trip() {
        let codec = JsonSerializer;
        let value = Payload {
            n: 7,
            s: "seven".into()
        };
        let bytes = codec.serialize(&value).unwrap();
        let restored: Payload = codec.deserialize(&bytes).unwrap();
        assert_eq!(value, restored);
        assert_eq!(codec.type_name(), "JSON");
    }

    #[test]
    fn json_deserialize_error_is_serialization() {
        let codec = JsonSerializer;
        let err = codec.deserialize::<Payload>(b"not json").unwrap_err();
        assert!(matches!(err, PersistError::Serialization(_)));
    }
}
