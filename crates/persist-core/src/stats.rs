// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Counters, storage estimation and maintenance bookkeeping (component
//! J, "Statistics & Maintenance").

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage and row-count statistics for one entity table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    /// Every row, including soft-deleted and expired.
    pub total: u64,
    /// Non-deleted, non-expired rows.
    pub active: u64,
    /// Soft-deleted rows.
    pub deleted: u64,
    /// Rows past their expiration instant but not yet swept.
    pub expired: u64,
    /// Estimated on-disk size in bytes (`page_count * page_size`).
    pub size_bytes: u64,
    /// Row counts keyed by table name, for multi-entity pools.
    pub per_type_counts: Vec<(String, u64)>,
    /// Timestamp of the last successful `optimize_storage` call
    /// observed through this table's [`OptimizationTracker`], if any.
    pub last_optimized_at: Option<DateTime<Utc>>
}

/// Records the instant a table's maintenance (`VACUUM`/`ANALYZE`) last
/// ran. Shared (`Clone`s point at the same cell) so a provider can hand
/// a clone to callers that need to observe it without exposing a
/// mutable reference into the provider itself.
#[derive(Debug, Clone, Default)]
pub struct OptimizationTracker {
    last_run: Arc<Mutex<Option<DateTime<Utc>>>>
}

impl OptimizationTracker {
    /// Builds a tracker with no recorded run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `now` as the most recent maintenance run.
    pub fn record(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.last_run.lock() {
            *guard = Some(now);
        }
    }

    /// The most recently recorded maintenance instant, if any.
    #[must_use]
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run.lock().ok().and_then(|guard| *guard)
    }
}
