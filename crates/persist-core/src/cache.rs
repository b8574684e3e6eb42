// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Typed cache facade (component H).
//!
//! `CacheFacade` wraps the literal `CacheEntity`/`CacheEntry` table pair
//! rather than routing through the generic CAS-based
//! [`crate::provider::SqliteProvider`]: the cache row's primary key is
//! `(CacheKey, Version)`, an append-only shape (each write inserts a new
//! version; reads take the latest), which conflicts with the generic
//! pipeline's fixed-key compare-and-swap assumption. So this module
//! speaks SQL directly against that fixed schema.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;

use crate::{
    cancel,
    error::{PersistError, PersistResult},
    serializer::{JsonSerializer, Serializer},
    value::{decode_timestamp, encode_timestamp}
};

/// DDL for the `CacheEntity` companion table (records one row per
/// distinct `(TypeName, AssemblyVersion)` ever written).
pub const CREATE_CACHE_ENTITY_SQL: &str = "CREATE TABLE IF NOT EXISTS CacheEntity (\n    \
     TypeName TEXT NOT NULL,\n    \
     AssemblyVersion TEXT NOT NULL,\n    \
     SerializationType TEXT NOT NULL DEFAULT 'JSON',\n    \
     Description TEXT,\n    \
     CreatedTime TEXT NOT NULL DEFAULT (datetime('now')),\n    \
     PRIMARY KEY (TypeName, AssemblyVersion)\n)";

/// DDL for the `CacheEntry` table.
pub const CREATE_CACHE_ENTRY_SQL: &str = "CREATE TABLE IF NOT EXISTS CacheEntry (\n    \
     CacheKey TEXT NOT NULL,\n    \
     Version INTEGER NOT NULL,\n    \
     Data BLOB NOT NULL,\n    \
     TypeName TEXT NOT NULL,\n    \
     AssemblyVersion TEXT NOT NULL,\n    \
     Size INTEGER NOT NULL,\n    \
     AbsoluteExpiration TEXT,\n    \
     SlidingExpirationSeconds INTEGER,\n    \
     Tags TEXT,\n    \
     CreatedTime TEXT,\n    \
     LastWriteTime TEXT,\n    \
     IsDeleted INTEGER NOT NULL DEFAULT 0,\n    \
     PRIMARY KEY (CacheKey, Version),\n    \
     FOREIGN KEY (TypeName, AssemblyVersion) REFERENCES CacheEntity (TypeName, AssemblyVersion)\n)";

/// One materialized cache row, independent of the payload's Rust type.
#[derive(Debug, Clone)]
struct CacheRow {
    cache_key: String,
    version: i64,
    data: Vec<u8>,
    type_name: String,
    assembly_version: String,
    size: i64,
    absolute_expiration: Option<DateTime<Utc>>,
    sliding_expiration_seconds: Option<i64>,
    tags: Vec<String>,
    created_time: Option<DateTime<Utc>>,
    last_write_time: Option<DateTime<Utc>>,
    is_deleted: bool
}

impl CacheRow {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.absolute_expiration.is_some_and(|exp| exp <= now)
    }
}

fn encode_tags(tags: &[String]) -> Option<String> {
    if tags.is_empty() {
        None
    } else {
        serde_json::to_string(tags).ok()
    }
}

fn decode_tags(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(s).ok()).unwrap_or_default()
}

#[cfg(feature = "sqlite")]
mod sqlite_impl {
    use sqlx::{Row, sqlite::SqlitePool};

    use super::*;

    /// Typed get/set/sliding-expiration facade over a shared SQLite
    /// `CacheEntry` table, with payloads encoded via `S`.
    pub struct CacheFacade<S: Serializer = JsonSerializer> {
        pool: SqlitePool,
        serializer: S,
        assembly_version: &'static str
    }

    impl CacheFacade<JsonSerializer> {
        /// Builds a facade using the default JSON codec and this crate's
        /// own version as the assembly token.
        #[must_use]
        pub const fn new(pool: SqlitePool) -> Self {
            Self {
                pool,
                serializer: JsonSerializer,
                assembly_version: env!("CARGO_PKG_VERSION")
            }
        }
    }

    impl<S: Serializer> CacheFacade<S> {
        /// Builds a facade with an explicit codec.
        #[must_use]
        pub const fn with_serializer(pool: SqlitePool, serializer: S) -> Self {
            Self {
                pool,
                serializer,
                assembly_version: env!("CARGO_PKG_VERSION")
            }
        }

        /// Creates the `CacheEntity`/`CacheEntry` infrastructure tables
        /// if they do not already exist.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] on engine failure, or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        pub async fn ensure_schema(&self, cancel: Option<&CancellationToken>) -> PersistResult<()> {
            cancel::race(cancel, async {
                sqlx::query(CREATE_CACHE_ENTITY_SQL).execute(&self.pool).await?;
                sqlx::query(CREATE_CACHE_ENTRY_SQL).execute(&self.pool).await?;
                Ok(())
            })
            .await
        }

        async fn register_type(&self, type_name: &str) -> PersistResult<()> {
            sqlx::query(
                "INSERT OR IGNORE INTO CacheEntity (TypeName, AssemblyVersion, SerializationType) VALUES (?, ?, ?)"
            )
            .bind(type_name)
            .bind(self.assembly_version)
            .bind(self.serializer.type_name())
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn latest_row(&self, key: &str) -> PersistResult<Option<CacheRow>> {
            let row = sqlx::query(
                "SELECT CacheKey, Version, Data, TypeName, AssemblyVersion, Size, AbsoluteExpiration, \
                 SlidingExpirationSeconds, Tags, CreatedTime, LastWriteTime, IsDeleted \
                 FROM CacheEntry WHERE CacheKey = ? ORDER BY Version DESC LIMIT 1"
            )
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

            let Some(row) = row else {
                return Ok(None);
            };

            Ok(Some(CacheRow {
                cache_key: row.try_get("CacheKey")?,
                version: row.try_get("Version")?,
                data: row.try_get("Data")?,
                type_name: row.try_get("TypeName")?,
                assembly_version: row.try_get("AssemblyVersion")?,
                size: row.try_get("Size")?,
                absolute_expiration: row
                    .try_get::<Option<String>, _>("AbsoluteExpiration")?
                    .and_then(|s| decode_timestamp(&s).ok()),
                sliding_expiration_seconds: row.try_get("SlidingExpirationSeconds")?,
                tags: decode_tags(row.try_get::<Option<String>, _>("Tags")?.as_deref()),
                created_time: row
                    .try_get::<Option<String>, _>("CreatedTime")?
                    .and_then(|s| decode_timestamp(&s).ok()),
                last_write_time: row
                    .try_get::<Option<String>, _>("LastWriteTime")?
                    .and_then(|s| decode_timestamp(&s).ok()),
                is_deleted: row.try_get::<i64, _>("IsDeleted")? != 0
            }))
        }

        async fn insert_version(&self, row: &CacheRow) -> PersistResult<()> {
            sqlx::query(
                "INSERT INTO CacheEntry (CacheKey, Version, Data, TypeName, AssemblyVersion, Size, \
                 AbsoluteExpiration, SlidingExpirationSeconds, Tags, CreatedTime, LastWriteTime, IsDeleted) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            )
            .bind(&row.cache_key)
            .bind(row.version)
            .bind(&row.data)
            .bind(&row.type_name)
            .bind(&row.assembly_version)
            .bind(row.size)
            .bind(row.absolute_expiration.map(|t| encode_timestamp(&t)))
            .bind(row.sliding_expiration_seconds)
            .bind(encode_tags(&row.tags))
            .bind(row.created_time.map(|t| encode_timestamp(&t)))
            .bind(row.last_write_time.map(|t| encode_timestamp(&t)))
            .bind(i64::from(row.is_deleted))
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        /// Loads the value stored under `key`, if present and
        /// unexpired. Under sliding expiration the entry's expiration is
        /// refreshed as a side effect.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::Serialization`] if the stored bytes
        /// do not decode as `V`, or [`PersistError::Canceled`] if
        /// `cancel` fires first.
        pub async fn get<V: DeserializeOwned>(
            &self,
            key: &str,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<Option<V>> {
            cancel::race(cancel, async {
                let Some(row) = self.latest_row(key).await? else {
                    return Ok(None);
                };
                if row.is_deleted {
                    return Ok(None);
                }

                let now = Utc::now();
                if row.is_expired(now) {
                    let mut tombstone = row;
                    tombstone.version += 1;
                    tombstone.is_deleted = true;
                    tombstone.last_write_time = Some(now);
                    self.insert_version(&tombstone).await?;
                    return Ok(None);
                }

                if let Some(sliding_secs) = row.sliding_expiration_seconds {
                    let mut refreshed = row.clone();
                    refreshed.version += 1;
                    refreshed.last_write_time = Some(now);
                    refreshed.absolute_expiration = Some(now + chrono::Duration::seconds(sliding_secs));
                    self.insert_version(&refreshed).await?;
                }

                self.serializer.deserialize(&row.data)
            })
            .await
        }

        /// Overwrites (or creates) the entry at `key` with `value`,
        /// expiring absolutely after `ttl` if given.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::Serialization`] if `value` cannot be
        /// encoded, or [`PersistError::Canceled`] if `cancel` fires
        /// first.
        pub async fn set<V: Serialize>(
            &self,
            key: &str,
            value: &V,
            ttl: Option<Duration>,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<()> {
            cancel::race(
                cancel,
                self.write_entry(key, value, None, ttl.map(|d| Utc::now() + to_chrono(d)), Vec::new())
            )
            .await
        }

        /// Overwrites (or creates) the entry at `key`, recording a
        /// sliding window (refreshed on every [`Self::get`]) and an
        /// optional independent absolute ceiling.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::Serialization`] if `value` cannot be
        /// encoded, or [`PersistError::Canceled`] if `cancel` fires
        /// first.
        pub async fn set_with_sliding<V: Serialize>(
            &self,
            key: &str,
            value: &V,
            sliding: Duration,
            absolute: Option<Duration>,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<()> {
            let now = Utc::now();
            let absolute_expiration = absolute.map(|d| now + to_chrono(d)).or_else(|| Some(now + to_chrono(sliding)));
            cancel::race(
                cancel,
                self.write_entry(key, value, Some(sliding.as_secs() as i64), absolute_expiration, Vec::new())
            )
            .await
        }

        /// Same as [`Self::set`] but attaches a tag set retrievable via
        /// [`Self::by_tag`].
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::Serialization`] if `value` cannot be
        /// encoded, or [`PersistError::Canceled`] if `cancel` fires
        /// first.
        pub async fn set_tagged<V: Serialize>(
            &self,
            key: &str,
            value: &V,
            ttl: Option<Duration>,
            tags: Vec<String>,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<()> {
            cancel::race(
                cancel,
                self.write_entry(key, value, None, ttl.map(|d| Utc::now() + to_chrono(d)), tags)
            )
            .await
        }

        async fn write_entry<V: Serialize>(
            &self,
            key: &str,
            value: &V,
            sliding_expiration_seconds: Option<i64>,
            absolute_expiration: Option<DateTime<Utc>>,
            tags: Vec<String>
        ) -> PersistResult<()> {
            let type_name = std::any::type_name::<V>();
            self.register_type(type_name).await?;

            let data = self.serializer.serialize(value)?;
            let now = Utc::now();
            let previous = self.latest_row(key).await?;
            let (version, created_time, existing_tags) = match &previous {
                Some(row) if !row.is_deleted => (row.version + 1, row.created_time, row.tags.clone()),
                _ => (1, Some(now), Vec::new())
            };

            let row = CacheRow {
                cache_key: key.to_string(),
                version,
                size: data.len() as i64,
                data,
                type_name: type_name.to_string(),
                assembly_version: self.assembly_version.to_string(),
                absolute_expiration,
                sliding_expiration_seconds,
                tags: if tags.is_empty() { existing_tags } else { tags },
                created_time,
                last_write_time: Some(now),
                is_deleted: false
            };
            self.insert_version(&row).await
        }

        /// Soft-deletes the entry at `key`. Returns `false` if absent or
        /// already deleted.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] on engine failure, or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        pub async fn remove(&self, key: &str, cancel: Option<&CancellationToken>) -> PersistResult<bool> {
            cancel::race(cancel, async {
                let Some(row) = self.latest_row(key).await? else {
                    return Ok(false);
                };
                if row.is_deleted {
                    return Ok(false);
                }
                let mut tombstone = row;
                tombstone.version += 1;
                tombstone.is_deleted = true;
                tombstone.last_write_time = Some(Utc::now());
                self.insert_version(&tombstone).await?;
                Ok(true)
            })
            .await
        }

        /// True if `key` names a present, non-deleted, non-expired
        /// entry.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] on engine failure, or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        pub async fn exists(&self, key: &str, cancel: Option<&CancellationToken>) -> PersistResult<bool> {
            cancel::race(cancel, async {
                let Some(row) = self.latest_row(key).await? else {
                    return Ok(false);
                };
                Ok(!row.is_deleted && !row.is_expired(Utc::now()))
            })
            .await
        }

        /// Returns every non-deleted, non-expired entry carrying `tag`,
        /// ordered by last-write-time descending (ties broken by key
        /// ascending).
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::Serialization`] if a matching payload
        /// does not decode as `V`, or [`PersistError::Canceled`] if
        /// `cancel` fires first.
        pub async fn by_tag<V: DeserializeOwned>(
            &self,
            tag: &str,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<Vec<(String, V)>> {
            cancel::race(cancel, async {
                let pattern = format!("%\"{tag}\"%");
                let rows = sqlx::query(
                    "SELECT e.CacheKey, e.Version, e.Data, e.TypeName, e.AssemblyVersion, e.Size, \
                     e.AbsoluteExpiration, e.SlidingExpirationSeconds, e.Tags, e.CreatedTime, e.LastWriteTime, \
                     e.IsDeleted \
                     FROM CacheEntry e \
                     INNER JOIN (SELECT CacheKey, MAX(Version) AS Version FROM CacheEntry GROUP BY CacheKey) latest \
                     ON e.CacheKey = latest.CacheKey AND e.Version = latest.Version \
                     WHERE e.IsDeleted = 0 AND e.Tags LIKE ? \
                     ORDER BY e.LastWriteTime DESC, e.CacheKey ASC"
                )
                .bind(&pattern)
                .fetch_all(&self.pool)
                .await?;

                let now = Utc::now();
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    let absolute_expiration = row
                        .try_get::<Option<String>, _>("AbsoluteExpiration")?
                        .and_then(|s| decode_timestamp(&s).ok());
                    if absolute_expiration.is_some_and(|exp| exp <= now) {
                        continue;
                    }
                    let key: String = row.try_get("CacheKey")?;
                    let data: Vec<u8> = row.try_get("Data")?;
                    let value = self.serializer.deserialize(&data)?;
                    out.push((key, value));
                }
                Ok(out)
            })
            .await
        }

        /// Soft-deletes every entry whose absolute expiration has
        /// passed. Idempotent: a second call with no new expirations
        /// returns 0.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] on engine failure, or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        pub async fn clear_expired(&self, cancel: Option<&CancellationToken>) -> PersistResult<u64> {
            cancel::race(cancel, async {
                let now = encode_timestamp(&Utc::now());
                let keys: Vec<String> = sqlx::query(
                    "SELECT e.CacheKey FROM CacheEntry e \
                     INNER JOIN (SELECT CacheKey, MAX(Version) AS Version FROM CacheEntry GROUP BY CacheKey) latest \
                     ON e.CacheKey = latest.CacheKey AND e.Version = latest.Version \
                     WHERE e.IsDeleted = 0 AND e.AbsoluteExpiration IS NOT NULL AND e.AbsoluteExpiration < ?"
                )
                .bind(&now)
                .fetch_all(&self.pool)
                .await?
                .iter()
                .map(|r| r.try_get::<String, _>("CacheKey"))
                .collect::<Result<_, _>>()?;

                let mut count = 0;
                for key in keys {
                    if self.remove(&key, cancel).await? {
                        count += 1;
                    }
                }
                Ok(count)
            })
            .await
        }
    }

    fn to_chrono(duration: Duration) -> chrono::Duration {
        chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::seconds(0))
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite_impl::CacheFacade;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_tags_round_trip() {
        let tags = vec!["a".to_string(), "b".to_string()];
        let encoded = encode_tags(&tags).unwrap();
        assert_eq!(decode_tags(Some(&encoded)), tags);
    }

    #[test]
    fn empty_tags_encode_to_none() {
        assert_eq!(encode_tags(&[]), None);
        assert_eq!(decode_tags(None), Vec::<String>::new());
    }

    #[test]
    fn cache_row_expiry() {
        let now = Utc::now();
        let row = CacheRow {
            cache_key: "k".into(),
            version: 1,
            data: vec![],
            type_name: "t".into(),
            assembly_version: "1".into(),
            size: 0,
            absolute_expiration: Some(now - chrono::Duration::seconds(1)),
            sliding_expiration_seconds: None,
            tags: vec![],
            created_time: Some(now),
            last_write_time: Some(now),
            is_deleted: false
        };
        assert!(row.is_expired(now));
    }
}
