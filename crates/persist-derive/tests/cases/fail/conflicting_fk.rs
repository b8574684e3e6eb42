// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use persist_derive::Entity;
use uuid::Uuid;

#[derive(Entity)]
#[entity(table = "comments")]
pub struct Comment {
    pub id: Uuid,
    #[fk(name = "fk_post", table = "posts", on_delete = "cascade")]
    pub post_id: Uuid,
    #[fk(name = "fk_post", table = "articles", on_delete = "restrict")]
    pub article_id: Uuid,
    pub created_time: DateTime<Utc>,
    pub last_write_time: DateTime<Utc>,
    pub version: i64,
    pub is_deleted: bool,
    pub expiration_time: Option<DateTime<Utc>>
}

fn main() {}
