// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use persist_derive::Entity;
use uuid::Uuid;

#[derive(Entity)]
#[entity(table = "comments")]
pub struct Comment {
    pub id: Uuid,
    #[column(name = "post_id")]
    #[index(name = "idx_comments_post", order = 0)]
    #[fk(name = "fk_comments_post", table = "posts", column = "id", on_delete = "cascade")]
    pub post_id: Uuid,
    #[index(name = "idx_comments_author", unique, order = 0)]
    pub author_email: String,
    pub body: String,
    pub created_time: DateTime<Utc>,
    pub last_write_time: DateTime<Utc>,
    pub version: i64,
    pub is_deleted: bool,
    pub expiration_time: Option<DateTime<Utc>>
}

fn main() {}
