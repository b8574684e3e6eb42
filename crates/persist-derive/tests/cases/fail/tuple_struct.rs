// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

use persist_derive::Entity;
use uuid::Uuid;

#[derive(Entity)]
#[entity(table = "widgets")]
pub struct Widget(Uuid, String);

fn main() {}
