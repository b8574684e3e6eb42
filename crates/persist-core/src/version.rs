// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Global version sequence (component I).
//!
//! A single-row allocator backed by the `Version` infrastructure table:
//! `(Version INTEGER PRIMARY KEY AUTOINCREMENT, Timestamp TEXT NOT NULL
//! DEFAULT (datetime('now')))`. Writers insert a new row and read back
//! `last_insert_rowid()`; SQLite's single-writer guarantee serializes
//! concurrent callers without additional locking.

use chrono::{DateTime, Utc};

use crate::error::PersistError;

/// One allocated entry from the version sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRow {
    /// The strictly-increasing allocated value.
    pub version: i64
}

#[cfg(feature = "sqlite")]
mod sqlite_impl {
    use sqlx::{Row, SqlitePool};

    use super::{PersistError, VersionRow};

    /// DDL for the infrastructure `Version` table.
    pub const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS Version (\n    \
         Version INTEGER PRIMARY KEY AUTOINCREMENT,\n    \
         Timestamp TEXT NOT NULL DEFAULT (datetime('now'))\n)";

    /// Monotonic version allocator over a shared SQLite pool.
    pub struct VersionSequence {
        pool: SqlitePool
    }

    impl VersionSequence {
        /// Wraps a pool, assuming the `Version` table already exists
        /// (call [`Self::ensure_table`] first if not).
        #[must_use]
        pub const fn new(pool: SqlitePool) -> Self {
            Self { pool }
        }

        /// Creates the `Version` table if absent.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] on engine failure.
        pub async fn ensure_table(&self) -> Result<(), PersistError> {
            sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
            Ok(())
        }

        /// Allocates and returns the next strictly-increasing version.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] on engine failure.
        pub async fn next(&self) -> Result<VersionRow, PersistError> {
            let result = sqlx::query("INSERT INTO Version DEFAULT VALUES")
                .execute(&self.pool)
                .await?;
            let version = result.last_insert_rowid();
            Ok(VersionRow { version })
        }

        /// Returns the most recently allocated version without
        /// allocating a new one, or `0` if none has been allocated yet.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] on engine failure.
        pub async fn current(&self) -> Result<i64, PersistError> {
            let row = sqlx::query("SELECT COALESCE(MAX(Version), 0) AS v FROM Version")
                .fetch_one(&self.pool)
                .await?;
            Ok(row.try_get::<i64, _>("v")?)
        }
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite_impl::{CREATE_TABLE_SQL, VersionSequence};

/// Timestamp recorded alongside a version allocation, decoded from the
/// `Timestamp` column.
#[must_use]
pub fn decode_allocation_time(raw: &str) -> Option<DateTime<Utc>> {
    crate::value::decode_timestamp(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_row_equality() {
        assert_eq!(VersionRow { version: 1 }, VersionRow { version: 1 });
        assert_ne!(VersionRow { version: 1 }, VersionRow { version: 2 });
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn allocates_strictly_increasing_versions() {
        use sqlx::sqlite::SqlitePoolOptions;

        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let seq = VersionSequence::new(pool);
        seq.ensure_table().await.unwrap();

        let first = seq.next().await.unwrap();
        let second = seq.next().await.unwrap();
        assert!(second.version > first.version);
        assert_eq!(seq.current().await.unwrap(), second.version);
    }
}
