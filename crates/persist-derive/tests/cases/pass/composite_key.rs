// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use persist_derive::Entity;
use uuid::Uuid;

#[derive(Entity)]
#[entity(table = "order_items")]
pub struct OrderItem {
    #[pk(order = 0)]
    pub order_id: Uuid,
    #[pk(order = 1)]
    pub line_no: i32,
    pub quantity: i32,
    pub created_time: DateTime<Utc>,
    pub last_write_time: DateTime<Utc>,
    pub version: i64,
    pub is_deleted: bool,
    pub expiration_time: Option<DateTime<Utc>>
}

fn main() {}
