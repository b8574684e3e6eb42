// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use persist_derive::Entity;
use uuid::Uuid;

#[derive(Entity)]
#[entity(table = "widgets")]
pub struct Widget {
    pub id: Uuid,
    pub name: String,
    pub created_time: DateTime<Utc>,
    pub last_write_time: DateTime<Utc>,
    pub version: i64,
    pub is_deleted: bool
}

fn main() {}
