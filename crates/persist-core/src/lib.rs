// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Core traits and types behind `persist-derive`: a versioned SQLite
//! persistence provider, predicate translation, transaction scopes and
//! a typed cache facade.
//!
//! This crate is usable standalone — the derive macro in
//! `persist-derive` only generates [`mapping::Mapped`] and
//! [`entity::Entity`] implementations on top of it.
//!
//! # Overview
//!
//! - [`mapping`] — immutable per-type column/key/index/FK metadata
//! - [`ddl`] — `CREATE TABLE`/`INSERT`/`UPDATE`/`DELETE` synthesis from a mapping
//! - [`predicate`] — algebraic predicate tree and its SQL translation
//! - [`provider`] — `SqliteProvider<E>`, the CRUD/batch/paging/bulk surface
//! - [`transaction`] — ordered operation chains with compensating rollback
//! - [`cache`] — typed get/set cache facade with TTL and sliding expiration
//! - [`stats`] — row-count/size statistics and maintenance bookkeeping
//! - [`serializer`] — pluggable payload codec used by the cache facade
//! - [`version`] — monotonic global version allocator
//! - [`value`] — engine-neutral column value and key encoding
//! - [`error`] — the shared [`error::PersistError`] taxonomy
//! - [`caller`] — `file!()`/`line!()` audit carrier
//! - [`cancel`] — cooperative cancellation shared by every operation
//! - [`prelude`] — convenient re-exports

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod caller;
pub mod cancel;
pub mod ddl;
pub mod entity;
pub mod error;
pub mod mapping;
pub mod predicate;
pub mod prelude;
pub mod provider;
pub mod serializer;
pub mod stats;
pub mod transaction;
pub mod version;

/// Re-export async_trait for generated code.
pub use async_trait::async_trait;
pub use caller::CallerInfo;

/// Result-page window for `limit`/`offset`-style pagination, kept
/// alongside [`provider::PagedResult`]'s `page_size`/`page_number` form
/// for callers that prefer to think in raw offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Maximum number of results to return.
    pub limit: i64,
    /// Number of results to skip.
    pub offset: i64
}

impl Pagination {
    /// Builds pagination from an explicit limit and offset.
    #[must_use]
    pub const fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    /// Builds pagination for a 0-indexed `page` of `per_page` items.
    #[must_use]
    pub const fn page(page: i64, per_page: i64) -> Self {
        Self {
            limit: per_page,
            offset: page * per_page
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { limit: 100, offset: 0 }
    }
}

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Ascending order (A-Z, 0-9, oldest first).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0, newest first).
    Desc
}

impl SortDirection {
    /// Convert to the SQL keyword.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC"
        }
    }
}
