// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The [`Entity`] lifecycle trait.
//!
//! Every persisted type carries, at minimum, an identifier, creation and
//! last-write instants, a monotonic version and a soft-delete flag, plus
//! an optional expiration instant. `#[derive(Entity)]` implements this
//! trait alongside [`crate::mapping::Mapped`].

use chrono::{DateTime, Utc};

use crate::value::Value;

/// Lifecycle accessors shared by every mapped entity.
///
/// `Key` is the primary-key type: a scalar for a simple key, or a tuple
/// for a composite key. [`Entity::key_params`] is how the persistence
/// provider binds a bare key (without a full instance) to the primary
/// key's `@`-prefixed parameters — it is implemented by the derive
/// macro, which alone knows the declared primary-key column order.
pub trait Entity: crate::mapping::Mapped + Send + Sync + Unpin + Sized {
    /// Primary key type (scalar or tuple for a composite key).
    type Key: Clone + Send + Sync + std::fmt::Debug;

    /// This instance's primary key value.
    fn id(&self) -> Self::Key;

    /// Binds a bare key to `@`-prefixed primary-key parameters, in
    /// [`crate::mapping::Mapping::primary_key`] column order.
    fn key_params(key: &Self::Key) -> Vec<(&'static str, Value)>;

    /// Row creation instant.
    fn created_time(&self) -> DateTime<Utc>;
    /// Sets the row creation instant.
    fn set_created_time(&mut self, value: DateTime<Utc>);

    /// Last successful write instant.
    fn last_write_time(&self) -> DateTime<Utc>;
    /// Sets the last successful write instant.
    fn set_last_write_time(&mut self, value: DateTime<Utc>);

    /// Monotonic optimistic-concurrency counter.
    fn version(&self) -> i64;
    /// Sets the optimistic-concurrency counter.
    fn set_version(&mut self, value: i64);

    /// Soft-delete flag.
    fn is_deleted(&self) -> bool;
    /// Sets the soft-delete flag.
    fn set_deleted(&mut self, value: bool);

    /// Optional absolute expiration instant.
    fn expiration_time(&self) -> Option<DateTime<Utc>>;
    /// Sets the optional absolute expiration instant.
    fn set_expiration_time(&mut self, value: Option<DateTime<Utc>>);

    /// True if [`Entity::expiration_time`] is set and in the past
    /// relative to `now`.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time().is_some_and(|exp| exp <= now)
    }
}
