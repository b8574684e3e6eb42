// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! `#[derive(Entity)]` implementation.
//!
//! Parses a struct's `#[entity(...)]`/`#[column(...)]`/`#[pk]`/
//! `#[audit(...)]`/`#[index(...)]`/`#[fk(...)]` attributes into an
//! [`parse::EntityDef`] and emits `impl Mapped` plus `impl Entity` for it.
//!
//! ```text
//! entity.rs (orchestrator)
//! ├── parse.rs    → attribute parsing into EntityDef/FieldDef
//! ├── storage.rs  → Rust-type → StorageType/nullability inference
//! └── codegen.rs  → Mapped + Entity impl emission
//! ```

mod codegen;
pub mod parse;
mod storage;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

use self::parse::EntityDef;

/// Entry point for `#[derive(Entity)]`.
pub fn derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let entity = match EntityDef::from_derive_input(&input) {
        Ok(entity) => entity,
        Err(err) => return err.to_compile_error().into()
    };

    match codegen::generate(&entity) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into()
    }
}
