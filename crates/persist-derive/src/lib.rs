// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

//! # persist-derive
//!
//! Public facade: re-exports everything from `persist-core` plus the
//! [`Entity`] derive macro from `persist-derive-impl`.
//!
//! ```rust,ignore
//! use persist_derive::{Entity, prelude::*};
//! use uuid::Uuid;
//! use chrono::{DateTime, Utc};
//!
//! #[derive(Entity)]
//! #[entity(table = "widgets")]
//! pub struct Widget {
//!     pub id: Uuid,
//!     pub name: String,
//!     pub created_time: DateTime<Utc>,
//!     pub last_write_time: DateTime<Utc>,
//!     pub version: i64,
//!     pub is_deleted: bool,
//!     pub expiration_time: Option<DateTime<Utc>>,
//! }
//! ```

pub use persist_core::*;
pub use persist_derive_impl::Entity;
