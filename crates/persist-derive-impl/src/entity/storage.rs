// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Rust-type-to-storage-class inference.
//!
//! Maps a field's Rust type to the [`StorageType`] SQLite column it binds
//! to, matching the set of types with both a `From<T> for Value` and
//! `FromValue for T` impl in `persist-core`. `Option<T>` unwraps one level
//! and marks the column nullable.

use syn::{GenericArgument, PathArguments, Type};

/// Mirrors `persist_core::mapping::StorageType` for codegen purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Integer,
    Real,
    Text,
    Blob
}

impl StorageType {
    pub fn to_tokens(self) -> proc_macro2::TokenStream {
        use quote::quote;
        match self {
            Self::Integer => quote!(::persist_core::mapping::StorageType::Integer),
            Self::Real => quote!(::persist_core::mapping::StorageType::Real),
            Self::Text => quote!(::persist_core::mapping::StorageType::Text),
            Self::Blob => quote!(::persist_core::mapping::StorageType::Blob)
        }
    }
}

/// Returns `(storage_type, nullable)` for a field's declared type.
///
/// Unrecognized types default to `Text` with `nullable = false`; `Vec<u8>`
/// is the only `Vec<_>` shape recognized (as a blob), everything else
/// collection-shaped is out of scope for a mapped column.
pub fn infer_storage(ty: &Type) -> (StorageType, bool) {
    if let Some(inner) = option_inner(ty) {
        let (storage, _) = infer_storage(inner);
        return (storage, true);
    }
    (storage_of(ty), false)
}

fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else { return None };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(t) => Some(t),
        _ => None
    })
}

fn storage_of(ty: &Type) -> StorageType {
    let Type::Path(path) = ty else { return StorageType::Text };
    let Some(segment) = path.path.segments.last() else {
        return StorageType::Text;
    };
    match segment.ident.to_string().as_str() {
        "bool" | "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" => StorageType::Integer,
        "f32" | "f64" => StorageType::Real,
        "String" | "Uuid" => StorageType::Text,
        "DateTime" => StorageType::Text,
        "Vec" => StorageType::Blob,
        _ => StorageType::Text
    }
}

#[cfg(test)]
mod tests {
    use syn::parse_quote;

    use super::*;

    #[test]
    fn plain_scalars() {
        let ty: Type = parse_quote!(i64);
        assert_eq!(infer_storage(&ty), (StorageType::Integer, false));
        let ty: Type = parse_quote!(bool);
        assert_eq!(infer_storage(&ty), (StorageType::Integer, false));
        let ty: Type = parse_quote!(f64);
        assert_eq!(infer_storage(&ty), (StorageType::Real, false));
        let ty: Type = parse_quote!(String);
        assert_eq!(infer_storage(&ty), (StorageType::Text, false));
    }

    #[test]
    fn uuid_and_datetime_are_text() {
        let ty: Type = parse_quote!(Uuid);
        assert_eq!(infer_storage(&ty), (StorageType::Text, false));
        let ty: Type = parse_quote!(DateTime<Utc>);
        assert_eq!(infer_storage(&ty), (StorageType::Text, false));
    }

    #[test]
    fn vec_u8_is_blob() {
        let ty: Type = parse_quote!(Vec<u8>);
        assert_eq!(infer_storage(&ty), (StorageType::Blob, false));
    }

    #[test]
    fn option_unwraps_and_marks_nullable() {
        let ty: Type = parse_quote!(Option<DateTime<Utc>>);
        assert_eq!(infer_storage(&ty), (StorageType::Text, true));
        let ty: Type = parse_quote!(Option<i64>);
        assert_eq!(infer_storage(&ty), (StorageType::Integer, true));
    }
}
