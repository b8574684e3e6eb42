// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Versioned persistence provider (component F).
//!
//! `SqliteProvider<E>` is the CRUD/batch/paging/bulk-import-export
//! surface over a single SQLite table, driven entirely by `E`'s
//! [`Mapping`](crate::mapping::Mapping) and [`Entity`] implementations.
//! Optimistic concurrency is mandatory on every update/soft-delete path:
//! the `UPDATE` statement's `WHERE` clause always includes the caller's
//! expected `Version`, and zero affected rows is reported as
//! [`PersistError::Concurrency`].

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use tokio_util::sync::CancellationToken;

use crate::{
    Pagination, SortDirection,
    caller::CallerInfo,
    cancel,
    entity::Entity,
    error::{PersistError, PersistResult},
    mapping::{AuditKind, Mapping},
    predicate::{OrderDirection, Predicate, translate, translate_order_by},
    stats::{OptimizationTracker, Statistics},
    value::Value
};

/// Page of results plus the total row count across all pages.
#[derive(Debug, Clone)]
pub struct PagedResult<E> {
    /// Items on this page.
    pub items: Vec<E>,
    /// 1-indexed page number that was requested.
    pub page_number: u32,
    /// Requested page size.
    pub page_size: u32,
    /// Total matching rows across every page.
    pub total_count: u64
}

/// Options controlling [`SqliteProvider::bulk_import`].
#[derive(Debug, Clone)]
pub struct BulkImportOptions {
    /// Rows per implicit transaction batch.
    pub batch_size: u32,
    /// Skip rows whose primary key already exists instead of failing.
    pub ignore_duplicates: bool,
    /// Validate every item before writing any of them; the first
    /// validation failure aborts the whole import with no partial
    /// writes.
    pub validate_before_import: bool,
    /// Treat an existing row as an update rather than a duplicate.
    pub update_existing: bool,
    /// Overall wall-clock budget for the import.
    pub timeout: Option<Duration>
}

impl Default for BulkImportOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            ignore_duplicates: false,
            validate_before_import: false,
            update_existing: false,
            timeout: None
        }
    }
}

/// Progress snapshot reported at batch boundaries during bulk
/// import/export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    /// Items processed so far.
    pub processed: u64,
    /// Total items to process.
    pub total: u64,
    /// Elapsed wall-clock time since the operation started.
    pub elapsed: Duration,
    /// Human-readable description of the current batch operation.
    pub current_op: String
}

/// Callback invoked with a [`Progress`] snapshot at each batch boundary.
pub type ProgressCallback<'a> = dyn Fn(&Progress) + Send + Sync + 'a;

/// Outcome of a [`SqliteProvider::bulk_import`] call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkImportResult {
    /// Rows successfully inserted or updated.
    pub success_count: u64,
    /// Rows that failed and were skipped.
    pub failure_count: u64,
    /// Rows skipped because `ignore_duplicates` was set and the key
    /// already existed.
    pub duplicate_count: u64,
    /// Total wall-clock duration of the import.
    pub duration: Duration,
    /// Per-item error descriptions, index-aligned with the input slice.
    pub errors: Vec<String>
}

/// Options controlling [`SqliteProvider::bulk_export`].
#[derive(Debug, Clone)]
pub struct BulkExportOptions {
    /// Rows fetched per batch.
    pub batch_size: u32,
    /// Include soft-deleted rows.
    pub include_deleted: bool,
    /// Restrict exported columns to this allow-list, if set.
    pub include_fields: Option<Vec<String>>,
    /// Exclude these columns from the export, if set.
    pub exclude_fields: Option<Vec<String>>,
    /// Overall wall-clock budget for the export.
    pub timeout: Option<Duration>
}

impl Default for BulkExportOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            include_deleted: false,
            include_fields: None,
            exclude_fields: None,
            timeout: None
        }
    }
}

/// Replaces `@name` placeholders with `?` in declaration order and
/// returns the rewritten SQL. Our DDL/predicate generators always
/// emit `@name` tokens in exactly the order values must be bound, so
/// the caller only needs to bind in that same order.
fn to_positional(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '@' {
            out.push('?');
            while matches!(chars.peek(), Some(c) if c.is_alphanumeric() || *c == '_') {
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(feature = "sqlite")]
mod sqlite_impl {
    use std::marker::PhantomData;

    use sqlx::{Row, Sqlite, sqlite::SqliteRow, sqlite::SqlitePool};

    use super::*;
    use crate::ddl::{create_index_sql, create_table_sql, delete_sql, insert_sql, select_by_key_sql, update_sql};

    fn bind_value<'q>(
        query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
        value: Value
    ) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match value {
            Value::Null => query.bind(None::<i64>),
            Value::Integer(v) => query.bind(v),
            Value::Real(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
            Value::Blob(v) => query.bind(v)
        }
    }

    fn row_to_values(row: &SqliteRow, mapping: &Mapping) -> PersistResult<Vec<(&'static str, Value)>> {
        let mut values = Vec::with_capacity(mapping.properties.len());
        for prop in &mapping.properties {
            let value = match prop.storage_type {
                crate::mapping::StorageType::Integer => row
                    .try_get::<Option<i64>, _>(prop.column_name)
                    .map(|v| v.map_or(Value::Null, Value::Integer)),
                crate::mapping::StorageType::Real => row
                    .try_get::<Option<f64>, _>(prop.column_name)
                    .map(|v| v.map_or(Value::Null, Value::Real)),
                crate::mapping::StorageType::Text => row
                    .try_get::<Option<String>, _>(prop.column_name)
                    .map(|v| v.map_or(Value::Null, Value::Text)),
                crate::mapping::StorageType::Blob => row
                    .try_get::<Option<Vec<u8>>, _>(prop.column_name)
                    .map(|v| v.map_or(Value::Null, Value::Blob))
            }
            .map_err(PersistError::from)?;
            values.push((prop.column_name, value));
        }
        Ok(values)
    }

    /// SQLite-backed implementation of the persistence provider for a
    /// single entity type `E`.
    pub struct SqliteProvider<E: Entity> {
        pool: SqlitePool,
        optimized_at: OptimizationTracker,
        _marker: PhantomData<fn() -> E>
    }

    impl<E: Entity> SqliteProvider<E> {
        /// Wraps an existing pool. Call [`Self::ensure_schema`] once
        /// after construction to create the table and its indexes.
        #[must_use]
        pub fn new(pool: SqlitePool) -> Self {
            Self {
                pool,
                optimized_at: OptimizationTracker::new(),
                _marker: PhantomData
            }
        }

        /// Reference to the underlying pool, for custom queries or
        /// composing a [`crate::transaction::TransactionScope`].
        #[must_use]
        pub const fn pool(&self) -> &SqlitePool {
            &self.pool
        }

        /// Creates `E`'s table and indexes if they do not already
        /// exist.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] on engine failure or an invalid
        /// mapping (missing primary key, conflicting foreign keys), or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        pub async fn ensure_schema(&self, cancel: Option<&CancellationToken>) -> PersistResult<()> {
            cancel::race(cancel, async {
                let mapping = E::mapping();
                mapping.validate()?;
                sqlx::query(&create_table_sql(mapping)).execute(&self.pool).await?;
                for index_sql in create_index_sql(mapping) {
                    sqlx::query(&index_sql).execute(&self.pool).await?;
                }
                Ok(())
            })
            .await
        }

        fn not_deleted_not_expired_clause(mapping: &Mapping) -> String {
            let mut clauses = Vec::new();
            if let Some(deleted) = mapping.audit_property(AuditKind::IsDeleted) {
                clauses.push(format!("{} = 0", deleted.column_name));
            }
            if let Some(exp) = mapping.audit_property(AuditKind::ExpirationTime) {
                clauses.push(format!(
                    "({} IS NULL OR {} > datetime('now'))",
                    exp.column_name, exp.column_name
                ));
            }
            clauses.join(" AND ")
        }

        /// Creates a new entity: assigns `Version = 1` and
        /// `CreatedTime = LastWriteTime = now`, then inserts.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::Duplicate`] on primary-key collision,
        /// or [`PersistError::Canceled`] if `cancel` fires first.
        #[tracing::instrument(skip(self, entity, _caller, cancel))]
        pub async fn create(
            &self,
            mut entity: E,
            _caller: CallerInfo,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<E> {
            cancel::race(cancel, async {
                let now = Utc::now();
                entity.set_created_time(now);
                entity.set_last_write_time(now);
                entity.set_version(1);
                entity.set_deleted(false);

                let mapping = E::mapping();
                let sql = to_positional(&insert_sql(mapping));
                let mut query = sqlx::query(&sql);
                let bound: std::collections::HashMap<_, _> = entity.bind_values().into_iter().collect();
                for column in mapping.insert_columns() {
                    let value = bound.get(column).cloned().unwrap_or(Value::Null);
                    query = bind_value(query, value);
                }

                match query.execute(&self.pool).await {
                    Ok(_) => Ok(entity),
                    Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                        Err(PersistError::Duplicate)
                    }
                    Err(other) => Err(PersistError::from(other))
                }
            })
            .await
        }

        /// Selects the latest non-deleted, non-expired version of the
        /// row with key `key`, or `None` if absent.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] on engine failure, or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        #[tracing::instrument(skip(self, _caller, cancel))]
        pub async fn get(
            &self,
            key: &E::Key,
            _caller: CallerInfo,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<Option<E>> {
            cancel::race(cancel, async {
                let mapping = E::mapping();
                let base = select_by_key_sql(mapping);
                let filter = Self::not_deleted_not_expired_clause(mapping);
                let sql = if filter.is_empty() {
                    base
                } else {
                    format!("{base} AND {filter}")
                };
                let sql = to_positional(&sql);
                let mut query = sqlx::query(&sql);
                for (_, value) in E::key_params(key) {
                    query = bind_value(query, value);
                }

                let row = query.fetch_optional(&self.pool).await?;
                match row {
                    Some(row) => {
                        let values = row_to_values(&row, mapping)?;
                        Ok(Some(E::from_values(&values)?))
                    }
                    None => Ok(None)
                }
            })
            .await
        }

        /// Updates an entity, requiring `entity.version()` to equal the
        /// stored version.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::Concurrency`] if the stored version
        /// has moved on, or [`PersistError::Canceled`] if `cancel`
        /// fires first.
        #[tracing::instrument(skip(self, entity, _caller, cancel))]
        pub async fn update(
            &self,
            mut entity: E,
            _caller: CallerInfo,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<E> {
            cancel::race(cancel, async {
                let mapping = E::mapping();
                let key = entity.id();
                let expected_version = entity.version();
                entity.set_last_write_time(Utc::now());
                entity.set_version(expected_version + 1);

                let sql = to_positional(&update_sql(mapping));
                let mut query = sqlx::query(&sql);
                let bound: std::collections::HashMap<_, _> = entity.bind_values().into_iter().collect();
                for column in mapping.update_columns() {
                    let value = bound.get(column).cloned().unwrap_or(Value::Null);
                    query = bind_value(query, value);
                }
                for (_, value) in E::key_params(&key) {
                    query = bind_value(query, value);
                }
                if mapping.audit_property(AuditKind::Version).is_some() {
                    query = bind_value(query, Value::Integer(expected_version));
                }

                let result = query.execute(&self.pool).await?;
                if result.rows_affected() == 0 {
                    return Err(PersistError::Concurrency);
                }
                Ok(entity)
            })
            .await
        }

        /// Deletes the row with key `key`. Soft-delete (`hard = false`)
        /// bumps `Version` and sets the soft-delete flag; hard-delete
        /// removes the row outright.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::NotFound`] if no row changed, or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        #[tracing::instrument(skip(self, _caller, cancel))]
        pub async fn delete(
            &self,
            key: &E::Key,
            hard: bool,
            _caller: CallerInfo,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<bool> {
            cancel::race(cancel, async {
                let mapping = E::mapping();

                if hard {
                    let sql = to_positional(&delete_sql(mapping));
                    let mut query = sqlx::query(&sql);
                    for (_, value) in E::key_params(key) {
                        query = bind_value(query, value);
                    }
                    let result = query.execute(&self.pool).await?;
                    return Ok(result.rows_affected() > 0);
                }

                let existing = self
                    .get(key, CallerInfo::new("delete", file!(), line!()), cancel)
                    .await?;
                let Some(mut entity) = existing else {
                    return Ok(false);
                };
                entity.set_deleted(true);
                self.update(entity, CallerInfo::new("delete", file!(), line!()), cancel)
                    .await?;
                Ok(true)
            })
            .await
        }

        /// Creates every item within a single implicit transaction;
        /// any failure rolls back the whole batch.
        ///
        /// # Errors
        ///
        /// Returns the first error encountered; no rows from this call
        /// are persisted if any item fails. Returns
        /// [`PersistError::Canceled`] if `cancel` fires first, also
        /// rolling back the transaction.
        pub async fn create_batch(
            &self,
            items: Vec<E>,
            caller: CallerInfo,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<Vec<E>> {
            cancel::race(cancel, async {
                let mut tx = self.pool.begin().await.map_err(PersistError::from)?;
                let mapping = E::mapping();
                let mut created = Vec::with_capacity(items.len());
                let now = Utc::now();

                for mut entity in items {
                    entity.set_created_time(now);
                    entity.set_last_write_time(now);
                    entity.set_version(1);
                    entity.set_deleted(false);

                    let sql = to_positional(&insert_sql(mapping));
                    let mut query = sqlx::query(&sql);
                    let bound: std::collections::HashMap<_, _> = entity.bind_values().into_iter().collect();
                    for column in mapping.insert_columns() {
                        let value = bound.get(column).cloned().unwrap_or(Value::Null);
                        query = bind_value(query, value);
                    }
                    match query.execute(&mut *tx).await {
                        Ok(_) => created.push(entity),
                        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                            tx.rollback().await.map_err(PersistError::from)?;
                            return Err(PersistError::Duplicate);
                        }
                        Err(other) => {
                            tx.rollback().await.ok();
                            return Err(PersistError::from(other));
                        }
                    }
                }

                tx.commit().await.map_err(PersistError::from)?;
                let _ = caller;
                Ok(created)
            })
            .await
        }

        /// Fetches each key, skipping any that are absent.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] on engine failure, or
        /// [`PersistError::Canceled`] if `cancel` fires before the
        /// batch finishes.
        pub async fn get_batch(
            &self,
            keys: &[E::Key],
            caller: CallerInfo,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<Vec<E>> {
            cancel::race(cancel, async {
                let mut results = Vec::with_capacity(keys.len());
                for key in keys {
                    if let Some(entity) = self.get(key, caller.clone(), cancel).await? {
                        results.push(entity);
                    }
                }
                Ok(results)
            })
            .await
        }

        /// Updates every item within a single implicit transaction;
        /// any concurrency conflict rolls back the whole batch.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::Concurrency`] on the first conflict,
        /// or [`PersistError::Canceled`] if `cancel` fires first.
        pub async fn update_batch(
            &self,
            items: Vec<E>,
            caller: CallerInfo,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<Vec<E>> {
            cancel::race(cancel, async {
                let mut tx = self.pool.begin().await.map_err(PersistError::from)?;
                let mapping = E::mapping();
                let mut updated = Vec::with_capacity(items.len());

                for mut entity in items {
                    let key = entity.id();
                    let expected_version = entity.version();
                    entity.set_last_write_time(Utc::now());
                    entity.set_version(expected_version + 1);

                    let sql = to_positional(&update_sql(mapping));
                    let mut query = sqlx::query(&sql);
                    let bound: std::collections::HashMap<_, _> = entity.bind_values().into_iter().collect();
                    for column in mapping.update_columns() {
                        let value = bound.get(column).cloned().unwrap_or(Value::Null);
                        query = bind_value(query, value);
                    }
                    for (_, value) in E::key_params(&key) {
                        query = bind_value(query, value);
                    }
                    if mapping.audit_property(AuditKind::Version).is_some() {
                        query = bind_value(query, Value::Integer(expected_version));
                    }

                    let result = query.execute(&mut *tx).await.map_err(PersistError::from)?;
                    if result.rows_affected() == 0 {
                        tx.rollback().await.ok();
                        return Err(PersistError::Concurrency);
                    }
                    updated.push(entity);
                }

                tx.commit().await.map_err(PersistError::from)?;
                let _ = caller;
                Ok(updated)
            })
            .await
        }

        /// Soft- or hard-deletes every key within a single implicit
        /// transaction.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] on engine failure, or
        /// [`PersistError::Canceled`] if `cancel` fires before the
        /// batch finishes.
        pub async fn delete_batch(
            &self,
            keys: &[E::Key],
            hard: bool,
            caller: CallerInfo,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<u64> {
            cancel::race(cancel, async {
                let mut changed = 0;
                for key in keys {
                    if self.delete(key, hard, caller.clone(), cancel).await? {
                        changed += 1;
                    }
                }
                Ok(changed)
            })
            .await
        }

        /// Streams non-deleted, non-expired rows matching `predicate`.
        /// No ordering guarantee; use [`Self::query_paged`] for
        /// deterministic ordering.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::UnsupportedExpression`] if the
        /// predicate references an unmapped field, or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        pub async fn query(&self, predicate: &Predicate, cancel: Option<&CancellationToken>) -> PersistResult<Vec<E>> {
            cancel::race(cancel, async {
                let mapping = E::mapping();
                let translated = translate(predicate, mapping)?;
                let base_filter = Self::not_deleted_not_expired_clause(mapping);
                let where_clause = if base_filter.is_empty() {
                    translated.sql.clone()
                } else {
                    format!("({}) AND {base_filter}", translated.sql)
                };

                let sql = format!(
                    "SELECT {} FROM {} WHERE {where_clause}",
                    mapping.select_columns().join(", "),
                    mapping.fq_table()
                );
                let sql = to_positional(&sql);
                let mut query = sqlx::query(&sql);
                for (_, value) in translated.params {
                    query = bind_value(query, value);
                }

                let rows = query.fetch_all(&self.pool).await?;
                rows.iter()
                    .map(|row| row_to_values(row, mapping).and_then(|v| E::from_values(&v)))
                    .collect()
            })
            .await
        }

        /// Returns rows including soft-deleted ones matching
        /// `predicate`.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::UnsupportedExpression`] if the
        /// predicate references an unmapped field, or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        pub async fn query_include_deleted(
            &self,
            predicate: &Predicate,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<Vec<E>> {
            cancel::race(cancel, async {
                let mapping = E::mapping();
                let translated = translate(predicate, mapping)?;
                let sql = format!(
                    "SELECT {} FROM {} WHERE {}",
                    mapping.select_columns().join(", "),
                    mapping.fq_table(),
                    translated.sql
                );
                let sql = to_positional(&sql);
                let mut query = sqlx::query(&sql);
                for (_, value) in translated.params {
                    query = bind_value(query, value);
                }
                let rows = query.fetch_all(&self.pool).await?;
                rows.iter()
                    .map(|row| row_to_values(row, mapping).and_then(|v| E::from_values(&v)))
                    .collect()
            })
            .await
        }

        /// Returns one page of results matching `predicate`, ordered by
        /// `order_by` (or primary key in `direction` when `None`),
        /// along with the total matching row count.
        ///
        /// A `pagination` window beyond the last row yields an empty
        /// `items` with a correct `total_count`.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::UnsupportedExpression`] if the
        /// predicate or `order_by` references an unmapped field, or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        #[allow(clippy::too_many_arguments)]
        pub async fn query_paged(
            &self,
            predicate: &Predicate,
            pagination: Pagination,
            order_by: Option<&str>,
            direction: SortDirection,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<PagedResult<E>> {
            cancel::race(cancel, async {
                let mapping = E::mapping();
                let translated = translate(predicate, mapping)?;
                let base_filter = Self::not_deleted_not_expired_clause(mapping);
                let where_clause = if base_filter.is_empty() {
                    translated.sql.clone()
                } else {
                    format!("({}) AND {base_filter}", translated.sql)
                };

                let count_sql = to_positional(&format!(
                    "SELECT COUNT(*) AS c FROM {} WHERE {where_clause}",
                    mapping.fq_table()
                ));
                let mut count_query = sqlx::query(&count_sql);
                for (_, value) in translated.params.clone() {
                    count_query = bind_value(count_query, value);
                }
                let total_count: i64 = count_query.fetch_one(&self.pool).await?.try_get("c")?;

                let order_direction = match direction {
                    SortDirection::Asc => OrderDirection::Ascending,
                    SortDirection::Desc => OrderDirection::Descending
                };
                let order = translate_order_by(order_by, order_direction, mapping)?;

                let page_size = i64::max(pagination.limit, 1);
                let offset = i64::max(pagination.offset, 0);
                let page_number = (offset / page_size) as u32 + 1;

                let sql = to_positional(&format!(
                    "SELECT {} FROM {} WHERE {where_clause} ORDER BY {order} LIMIT {page_size} OFFSET {offset}",
                    mapping.select_columns().join(", "),
                    mapping.fq_table()
                ));
                let mut query = sqlx::query(&sql);
                for (_, value) in translated.params {
                    query = bind_value(query, value);
                }
                let rows = query.fetch_all(&self.pool).await?;
                let items = rows
                    .iter()
                    .map(|row| row_to_values(row, mapping).and_then(|v| E::from_values(&v)))
                    .collect::<PersistResult<Vec<_>>>()?;

                Ok(PagedResult {
                    items,
                    page_number,
                    page_size: page_size as u32,
                    total_count: total_count.max(0) as u64
                })
            })
            .await
        }

        /// Counts rows matching `predicate` (or every active row if
        /// `None`).
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::UnsupportedExpression`] if the
        /// predicate references an unmapped field, or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        pub async fn count(
            &self,
            predicate: Option<&Predicate>,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<u64> {
            cancel::race(cancel, async {
                let mapping = E::mapping();
                let predicate = predicate.cloned().unwrap_or(Predicate::True);
                let translated = translate(&predicate, mapping)?;
                let base_filter = Self::not_deleted_not_expired_clause(mapping);
                let where_clause = if base_filter.is_empty() {
                    translated.sql.clone()
                } else {
                    format!("({}) AND {base_filter}", translated.sql)
                };
                let sql = to_positional(&format!(
                    "SELECT COUNT(*) AS c FROM {} WHERE {where_clause}",
                    mapping.fq_table()
                ));
                let mut query = sqlx::query(&sql);
                for (_, value) in translated.params {
                    query = bind_value(query, value);
                }
                let count: i64 = query.fetch_one(&self.pool).await?.try_get("c")?;
                Ok(count.max(0) as u64)
            })
            .await
        }

        /// True if at least one active row matches `predicate`.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::UnsupportedExpression`] if the
        /// predicate references an unmapped field, or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        pub async fn exists(&self, predicate: &Predicate, cancel: Option<&CancellationToken>) -> PersistResult<bool> {
            Ok(self.count(Some(predicate), cancel).await? > 0)
        }

        /// True if `a` and `b` carry the same payload: every
        /// [`Mapping::content_columns`] value matches. Primary key,
        /// computed and audit-role columns (`Version`, `LastWriteTime`,
        /// ...) are ignored, since those legitimately differ between
        /// any two writes of the same logical row.
        fn payload_equal(mapping: &Mapping, a: &E, b: &E) -> bool {
            let content: std::collections::HashSet<&str> = mapping.content_columns().into_iter().collect();
            let a_values: std::collections::HashMap<_, _> = a
                .bind_values()
                .into_iter()
                .filter(|(col, _)| content.contains(col))
                .collect();
            let b_values: std::collections::HashMap<_, _> = b
                .bind_values()
                .into_iter()
                .filter(|(col, _)| content.contains(col))
                .collect();
            a_values == b_values
        }

        /// Imports `items` in batches of `options.batch_size`, honoring
        /// `ignore_duplicates`/`update_existing`/`validate_before_import`.
        /// With `update_existing` set, an existing row is only
        /// overwritten (bumping `Version`) when its payload actually
        /// differs from the incoming item; an unchanged payload is
        /// left untouched and still counted as a success.
        ///
        /// # Errors
        ///
        /// Returns an error only when `validate_before_import` is set
        /// and the first item fails validation, or if `cancel` fires;
        /// otherwise per-item failures accumulate into
        /// `BulkImportResult::errors`.
        pub async fn bulk_import(
            &self,
            items: Vec<E>,
            options: BulkImportOptions,
            progress: Option<&ProgressCallback<'_>>,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<BulkImportResult> {
            cancel::race(cancel, async {
                let started = std::time::Instant::now();
                let total = items.len() as u64;
                let batch_size = u64::from(options.batch_size.max(1));
                let mut result = BulkImportResult::default();
                let mapping = E::mapping();

                if options.validate_before_import {
                    mapping.validate()?;
                }

                for (index, entity) in items.into_iter().enumerate() {
                    let key = entity.id();
                    let existing = self
                        .get(&key, CallerInfo::new("bulk_import", file!(), line!()), cancel)
                        .await?;
                    match existing {
                        Some(current) if options.update_existing => {
                            if Self::payload_equal(mapping, &current, &entity) {
                                result.success_count += 1;
                            } else {
                                let mut updated = entity;
                                updated.set_version(current.version());
                                match self
                                    .update(updated, CallerInfo::new("bulk_import", file!(), line!()), cancel)
                                    .await
                                {
                                    Ok(_) => result.success_count += 1,
                                    Err(err) => {
                                        result.failure_count += 1;
                                        result.errors.push(err.to_string());
                                    }
                                }
                            }
                        }
                        Some(_) if options.ignore_duplicates => {
                            result.duplicate_count += 1;
                        }
                        Some(_) => {
                            result.failure_count += 1;
                            result.errors.push("duplicate key".to_string());
                        }
                        None => {
                            match self
                                .create(entity, CallerInfo::new("bulk_import", file!(), line!()), cancel)
                                .await
                            {
                                Ok(_) => result.success_count += 1,
                                Err(err) => {
                                    result.failure_count += 1;
                                    result.errors.push(err.to_string());
                                }
                            }
                        }
                    }

                    let processed = index as u64 + 1;
                    if let Some(cb) = progress {
                        if processed % batch_size == 0 || processed == total {
                            cb(&Progress {
                                processed,
                                total,
                                elapsed: started.elapsed(),
                                current_op: format!("row {processed}/{total}")
                            });
                        }
                    }
                }

                result.duration = started.elapsed();
                Ok(result)
            })
            .await
        }

        /// Exports rows matching `predicate` in batches, reporting
        /// progress at each batch boundary.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError::UnsupportedExpression`] if the
        /// predicate references an unmapped field, or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        pub async fn bulk_export(
            &self,
            predicate: Option<&Predicate>,
            options: BulkExportOptions,
            progress: Option<&ProgressCallback<'_>>,
            cancel: Option<&CancellationToken>
        ) -> PersistResult<Vec<E>> {
            cancel::race(cancel, async {
                let started = std::time::Instant::now();
                let predicate = predicate.cloned().unwrap_or(Predicate::True);
                let all = if options.include_deleted {
                    self.query_include_deleted(&predicate, cancel).await?
                } else {
                    self.query(&predicate, cancel).await?
                };

                let total = all.len() as u64;
                let batch_size = options.batch_size.max(1) as usize;
                for (batch_index, _) in all.chunks(batch_size).enumerate() {
                    if let Some(cb) = progress {
                        let processed = ((batch_index + 1) * batch_size).min(all.len()) as u64;
                        cb(&Progress {
                            processed,
                            total,
                            elapsed: started.elapsed(),
                            current_op: format!("batch {}", batch_index + 1)
                        });
                    }
                }

                Ok(all)
            })
            .await
        }

        /// Hard-deletes every row whose expiration instant has passed.
        /// Idempotent: a second call with no new expirations returns 0.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] on engine failure, or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        pub async fn cleanup_expired(&self, cancel: Option<&CancellationToken>) -> PersistResult<u64> {
            cancel::race(cancel, async {
                let mapping = E::mapping();
                let Some(exp) = mapping.audit_property(AuditKind::ExpirationTime) else {
                    return Ok(0);
                };
                let sql = format!(
                    "DELETE FROM {} WHERE {} IS NOT NULL AND {} < datetime('now')",
                    mapping.fq_table(),
                    exp.column_name,
                    exp.column_name
                );
                let result = sqlx::query(&sql).execute(&self.pool).await?;
                Ok(result.rows_affected())
            })
            .await
        }

        /// Triggers a best-effort `VACUUM` and `ANALYZE`.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] if the engine rejects the
        /// maintenance statements (e.g. inside an open transaction), or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        pub async fn optimize_storage(&self, cancel: Option<&CancellationToken>) -> PersistResult<()> {
            cancel::race(cancel, async {
                sqlx::query("VACUUM").execute(&self.pool).await?;
                sqlx::query("ANALYZE").execute(&self.pool).await?;
                self.optimized_at.record(Utc::now());
                Ok(())
            })
            .await
        }

        /// Gathers row-count and size statistics for this entity's
        /// table.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] on engine failure, or
        /// [`PersistError::Canceled`] if `cancel` fires first.
        pub async fn statistics(&self, cancel: Option<&CancellationToken>) -> PersistResult<Statistics> {
            cancel::race(cancel, async {
                let mapping = E::mapping();
                let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS c FROM {}", mapping.fq_table()))
                    .fetch_one(&self.pool)
                    .await?
                    .try_get("c")?;

                let deleted: i64 = match mapping.audit_property(AuditKind::IsDeleted) {
                    Some(col) => {
                        sqlx::query(&format!(
                            "SELECT COUNT(*) AS c FROM {} WHERE {} = 1",
                            mapping.fq_table(),
                            col.column_name
                        ))
                        .fetch_one(&self.pool)
                        .await?
                        .try_get("c")?
                    }
                    None => 0
                };

                let expired: i64 = match mapping.audit_property(AuditKind::ExpirationTime) {
                    Some(col) => {
                        sqlx::query(&format!(
                            "SELECT COUNT(*) AS c FROM {} WHERE {} IS NOT NULL AND {} < datetime('now')",
                            mapping.fq_table(),
                            col.column_name,
                            col.column_name
                        ))
                        .fetch_one(&self.pool)
                        .await?
                        .try_get("c")?
                    }
                    None => 0
                };

                let page_count: i64 = sqlx::query("PRAGMA page_count")
                    .fetch_one(&self.pool)
                    .await
                    .and_then(|r| r.try_get::<i64, _>("page_count"))
                    .unwrap_or(0);
                let page_size: i64 = sqlx::query("PRAGMA page_size")
                    .fetch_one(&self.pool)
                    .await
                    .and_then(|r| r.try_get::<i64, _>("page_size"))
                    .unwrap_or(0);

                Ok(Statistics {
                    total: total.max(0) as u64,
                    active: (total - deleted - expired).max(0) as u64,
                    deleted: deleted.max(0) as u64,
                    expired: expired.max(0) as u64,
                    size_bytes: (page_count.max(0) * page_size.max(0)) as u64,
                    per_type_counts: vec![(mapping.table.to_string(), total.max(0) as u64)],
                    last_optimized_at: self.optimized_at.last_run()
                })
            })
            .await
        }
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite_impl::SqliteProvider;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_positional_replaces_named_params_in_order() {
        let sql = "UPDATE t SET a = @a, b = @b WHERE id = @old_id";
        assert_eq!(to_positional(sql), "UPDATE t SET a = ?, b = ? WHERE id = ?");
    }

    #[test]
    fn to_positional_leaves_plain_sql_untouched() {
        let sql = "SELECT * FROM t WHERE 1 = 1";
        assert_eq!(to_positional(sql), sql);
    }

    #[test]
    fn bulk_import_options_default_batch_size() {
        let opts = BulkImportOptions::default();
        assert_eq!(opts.batch_size, 1000);
        assert!(!opts.ignore_duplicates);
    }
}
