// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rustdoc::missing_crate_level_docs,
    rustdoc::broken_intra_doc_links,
    rust_2018_idioms
)]
#![deny(unsafe_code)]

mod entity;

use proc_macro::TokenStream;

/// Derive macro that builds a [`persist_core::mapping::Mapped`] and
/// [`persist_core::entity::Entity`] implementation from a single struct
/// definition.
///
/// # Entity Attributes
///
/// | Attribute | Required | Description |
/// |-----------|----------|-------------|
/// | `#[entity(table = "...")]` | Yes | Database table name |
/// | `#[entity(schema = "...")]` | No | Schema/namespace prefix; omitted for SQLite |
///
/// # Field Attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `#[column(name = "...")]` | Overrides the column name (defaults to the field name) |
/// | `#[column(size = N)]` | Declared size/precision for `TEXT`/`REAL` columns |
/// | `#[column(default = "...")]` | Raw SQL default expression |
/// | `#[column(check = "...")]` | Raw `CHECK` constraint expression |
/// | `#[column(unique)]` | Single-column `UNIQUE` constraint |
/// | `#[column(auto_increment)]` | `INTEGER PRIMARY KEY AUTOINCREMENT` |
/// | `#[column(computed = "...", stored)]` | Generated column; `stored` persists it |
/// | `#[pk]` / `#[pk(order = N)]` | Marks a (possibly composite) primary-key field |
/// | `#[audit(created_time\|last_write_time\|version\|is_deleted\|expiration_time)]` | Marks an audit-role field |
/// | `#[index(name = "...", unique, order = N, filter = "...")]` | Merges into a named index across fields |
/// | `#[fk(name = "...", table = "...", column = "...", order = N, on_delete = "...", on_update = "...")]` | Merges into a named foreign key across fields |
///
/// A field named `id`/`key` is the primary key by convention absent an
/// explicit `#[pk]`; a field named `created_time`/`last_write_time`/
/// `version`/`is_deleted`/`expiration_time` fills that audit role by
/// convention absent an explicit `#[audit(...)]`. Every entity must carry
/// all five audit roles and exactly one primary key, or the macro fails
/// with a compile error.
///
/// # Example
///
/// ```rust,ignore
/// use persist_derive::Entity;
/// use uuid::Uuid;
/// use chrono::{DateTime, Utc};
///
/// #[derive(Entity)]
/// #[entity(table = "widgets")]
/// pub struct Widget {
///     pub id: Uuid,
///     pub name: String,
///     pub created_time: DateTime<Utc>,
///     pub last_write_time: DateTime<Utc>,
///     pub version: i64,
///     pub is_deleted: bool,
///     pub expiration_time: Option<DateTime<Utc>>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity, column, pk, audit, index, fk))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity::derive(input)
}
