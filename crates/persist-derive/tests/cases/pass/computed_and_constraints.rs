// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use persist_derive::Entity;

#[derive(Entity)]
#[entity(table = "accounts", schema = "billing")]
pub struct Account {
    #[column(auto_increment)]
    pub id: i64,
    #[column(unique, check = "length(email) > 0")]
    pub email: String,
    #[column(default = "0")]
    pub balance_cents: i64,
    #[column(computed = "balance_cents / 100", stored)]
    pub balance_dollars: i64,
    pub created_time: DateTime<Utc>,
    pub last_write_time: DateTime<Utc>,
    pub version: i64,
    pub is_deleted: bool,
    pub expiration_time: Option<DateTime<Utc>>
}

fn main() {}
