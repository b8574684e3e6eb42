// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Convenient re-exports for common usage.
//!
//! # Usage
//!
//! ```rust,ignore
//! use persist_core::prelude::*;
//! ```

pub use tokio_util::sync::CancellationToken;

pub use crate::{
    Pagination, SortDirection, async_trait,
    caller::CallerInfo,
    caller_info,
    entity::Entity,
    error::{PersistError, PersistResult},
    mapping::{Mapped, Mapping},
    predicate::{OrderDirection, Predicate},
    stats::Statistics,
    transaction::{ExecutionMode, ScopeState, ScopedOperation, TransactionScope},
    value::{FromValue, Value}
};
#[cfg(feature = "sqlite")]
pub use crate::{
    cache::CacheFacade,
    provider::{BulkExportOptions, BulkImportOptions, BulkImportResult, PagedResult, Progress, SqliteProvider},
    version::VersionSequence
};
