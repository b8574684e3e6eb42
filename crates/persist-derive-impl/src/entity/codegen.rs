// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Code generation: `impl Mapped` and `impl Entity` for a parsed
//! [`EntityDef`].

use proc_macro2::TokenStream;
use quote::{ToTokens, format_ident, quote};

use super::parse::{AuditRole, EntityDef, FieldDef};

pub fn generate(entity: &EntityDef) -> syn::Result<TokenStream> {
    let mapped = generate_mapped(entity);
    let entity_impl = generate_entity(entity)?;
    Ok(quote! {
        #mapped
        #entity_impl
    })
}

fn generate_mapped(entity: &EntityDef) -> TokenStream {
    let ident = &entity.ident;
    let table = &entity.table;
    let schema = match &entity.schema {
        Some(s) => quote!(::core::option::Option::Some(#s)),
        None => quote!(::core::option::Option::None)
    };

    let properties = entity.fields.iter().map(property_tokens);

    let pk_columns = entity.pk_fields().into_iter().map(|f| f.column_name.clone());
    let indexes = entity.indexes.iter().map(index_tokens);
    let foreign_keys = entity.foreign_keys.iter().map(fk_tokens);

    let bind_entries = entity.fields.iter().map(|f| {
        let field_ident = &f.ident;
        let column = &f.column_name;
        quote! {
            (#column, ::persist_core::value::Value::from(self.#field_ident.clone()))
        }
    });

    let key_entries = entity.pk_fields().into_iter().map(|f| {
        let field_ident = &f.ident;
        let column = &f.column_name;
        quote! {
            (#column, ::persist_core::value::Value::from(self.#field_ident.clone()))
        }
    });

    let from_values_fields = entity.fields.iter().map(|f| {
        let field_ident = &f.ident;
        let ty = &f.ty;
        let column = &f.column_name;
        quote! {
            #field_ident: <#ty as ::persist_core::value::FromValue>::from_value(
                column(row, #column)?
            )?
        }
    });

    quote! {
        impl ::persist_core::mapping::Mapped for #ident {
            fn mapping() -> &'static ::persist_core::mapping::Mapping {
                static MAPPING: ::std::sync::OnceLock<::persist_core::mapping::Mapping> =
                    ::std::sync::OnceLock::new();
                MAPPING.get_or_init(|| ::persist_core::mapping::Mapping {
                    table: #table,
                    schema: #schema,
                    properties: ::std::vec![#(#properties),*],
                    primary_key: ::persist_core::mapping::PrimaryKey {
                        columns: ::std::vec![#(#pk_columns),*]
                    },
                    indexes: ::std::vec![#(#indexes),*],
                    foreign_keys: ::std::vec![#(#foreign_keys),*]
                })
            }

            fn bind_values(&self) -> ::std::vec::Vec<(&'static str, ::persist_core::value::Value)> {
                ::std::vec![#(#bind_entries),*]
            }

            fn key_values(&self) -> ::std::vec::Vec<(&'static str, ::persist_core::value::Value)> {
                ::std::vec![#(#key_entries),*]
            }

            fn from_values(
                row: &[(&'static str, ::persist_core::value::Value)]
            ) -> ::std::result::Result<Self, ::persist_core::error::PersistError> {
                fn column(
                    row: &[(&'static str, ::persist_core::value::Value)],
                    name: &str
                ) -> ::std::result::Result<::persist_core::value::Value, ::persist_core::error::PersistError> {
                    row.iter()
                        .find(|(c, _)| *c == name)
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| ::persist_core::error::PersistError::Serialization(
                            ::std::format!("missing column '{name}'")
                        ))
                }
                ::std::result::Result::Ok(Self {
                    #(#from_values_fields),*
                })
            }
        }
    }
}

fn property_tokens(field: &FieldDef) -> TokenStream {
    let property_name = field.ident.to_string();
    let column_name = &field.column_name;
    let storage = field.storage.to_tokens();
    let size = option_u32(field.size);
    let nullable = field.nullable;
    let default_expr = option_str(field.default_expr.as_deref());
    let is_primary_key = field.is_primary_key;
    let pk_order = field.pk_order;
    let is_auto_increment = field.is_auto_increment;
    let is_unique = field.is_unique;
    let is_computed = field.is_computed();
    let computed_expr = option_str(field.computed_expr.as_deref());
    let computed_persisted = field.computed_persisted;
    let audit_kind = match field.audit_role {
        Some(role) => {
            let tokens = role.to_tokens();
            quote!(::core::option::Option::Some(#tokens))
        }
        None => quote!(::core::option::Option::None)
    };
    let check_expr = option_str(field.check_expr.as_deref());

    quote! {
        ::persist_core::mapping::PropertyMapping {
            property_name: #property_name,
            column_name: #column_name,
            storage_type: #storage,
            size: #size,
            nullable: #nullable,
            default_expr: #default_expr,
            is_primary_key: #is_primary_key,
            pk_order: #pk_order,
            is_auto_increment: #is_auto_increment,
            is_unique: #is_unique,
            is_computed: #is_computed,
            computed_expr: #computed_expr,
            computed_persisted: #computed_persisted,
            audit_kind: #audit_kind,
            check_expr: #check_expr
        }
    }
}

fn index_tokens(index: &super::parse::IndexDef) -> TokenStream {
    let name = &index.name;
    let mut columns = index.columns.clone();
    columns.sort_by_key(|(order, _)| *order);
    let columns = columns.into_iter().map(|(_, c)| c);
    let unique = index.unique;
    let filter = option_str(index.filter.as_deref());
    quote! {
        ::persist_core::mapping::IndexDef {
            name: #name,
            columns: ::std::vec![#(#columns),*],
            unique: #unique,
            filter: #filter
        }
    }
}

fn fk_tokens(fk: &super::parse::ForeignKeyDef) -> TokenStream {
    let name = &fk.name;
    let table = &fk.referenced_table;
    let mut locals = fk.local_columns.clone();
    locals.sort_by_key(|(order, _)| *order);
    let local_columns = locals.into_iter().map(|(_, c)| c);
    let mut refs = fk.referenced_columns.clone();
    refs.sort_by_key(|(order, _)| *order);
    let referenced_columns = refs.into_iter().map(|(_, c)| c);
    let on_delete = fk.on_delete.to_tokens();
    let on_update = fk.on_update.to_tokens();
    quote! {
        ::persist_core::mapping::ForeignKeyDef {
            name: #name,
            local_columns: ::std::vec![#(#local_columns),*],
            referenced_table: #table,
            referenced_columns: ::std::vec![#(#referenced_columns),*],
            on_delete: #on_delete,
            on_update: #on_update
        }
    }
}

fn option_u32(value: Option<u32>) -> TokenStream {
    match value {
        Some(v) => quote!(::core::option::Option::Some(#v)),
        None => quote!(::core::option::Option::None)
    }
}

fn option_str(value: Option<&str>) -> TokenStream {
    match value {
        Some(v) => quote!(::core::option::Option::Some(#v)),
        None => quote!(::core::option::Option::None)
    }
}

fn generate_entity(entity: &EntityDef) -> syn::Result<TokenStream> {
    let ident = &entity.ident;

    let created = require_audit(entity, AuditRole::CreatedTime, "created_time")?;
    let last_write = require_audit(entity, AuditRole::LastWriteTime, "last_write_time")?;
    let version = require_audit(entity, AuditRole::Version, "version")?;
    let is_deleted = require_audit(entity, AuditRole::IsDeleted, "is_deleted")?;
    let expiration = require_audit(entity, AuditRole::ExpirationTime, "expiration_time")?;

    let created_ident = &created.ident;
    let last_write_ident = &last_write.ident;
    let version_ident = &version.ident;
    let is_deleted_ident = &is_deleted.ident;
    let expiration_ident = &expiration.ident;

    let pk_fields = entity.pk_fields();
    let key_type = key_type_tokens(&pk_fields);
    let id_body = id_body_tokens(&pk_fields);
    let key_params_body = key_params_body_tokens(&pk_fields);

    Ok(quote! {
        impl ::persist_core::entity::Entity for #ident {
            type Key = #key_type;

            fn id(&self) -> Self::Key {
                #id_body
            }

            fn key_params(key: &Self::Key) -> ::std::vec::Vec<(&'static str, ::persist_core::value::Value)> {
                #key_params_body
            }

            fn created_time(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.#created_ident
            }

            fn set_created_time(&mut self, value: ::chrono::DateTime<::chrono::Utc>) {
                self.#created_ident = value;
            }

            fn last_write_time(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.#last_write_ident
            }

            fn set_last_write_time(&mut self, value: ::chrono::DateTime<::chrono::Utc>) {
                self.#last_write_ident = value;
            }

            fn version(&self) -> i64 {
                self.#version_ident
            }

            fn set_version(&mut self, value: i64) {
                self.#version_ident = value;
            }

            fn is_deleted(&self) -> bool {
                self.#is_deleted_ident
            }

            fn set_deleted(&mut self, value: bool) {
                self.#is_deleted_ident = value;
            }

            fn expiration_time(&self) -> ::core::option::Option<::chrono::DateTime<::chrono::Utc>> {
                self.#expiration_ident
            }

            fn set_expiration_time(&mut self, value: ::core::option::Option<::chrono::DateTime<::chrono::Utc>>) {
                self.#expiration_ident = value;
            }
        }
    })
}

fn require_audit<'a>(
    entity: &'a EntityDef,
    role: AuditRole,
    label: &str
) -> syn::Result<&'a FieldDef> {
    entity.audit_field(role).ok_or_else(|| {
        syn::Error::new(
            entity.ident.span(),
            format!(
                "entity '{}' is missing a '{label}' audit field: tag one with #[audit({label})] \
                 or name it '{label}'",
                entity.ident
            )
        )
    })
}

fn key_type_tokens(pk_fields: &[&FieldDef]) -> TokenStream {
    match pk_fields {
        [single] => single.ty.to_token_stream(),
        many => {
            let types = many.iter().map(|f| f.ty.to_token_stream());
            quote!((#(#types),*))
        }
    }
}

fn id_body_tokens(pk_fields: &[&FieldDef]) -> TokenStream {
    match pk_fields {
        [single] => {
            let field_ident = &single.ident;
            quote!(self.#field_ident.clone())
        }
        many => {
            let field_idents = many.iter().map(|f| &f.ident);
            quote!((#(self.#field_idents.clone()),*))
        }
    }
}

fn key_params_body_tokens(pk_fields: &[&FieldDef]) -> TokenStream {
    match pk_fields {
        [single] => {
            let column = &single.column_name;
            quote! {
                ::std::vec![(#column, ::persist_core::value::Value::from(key.clone()))]
            }
        }
        many => {
            let bindings = many.iter().enumerate().map(|(i, _)| format_ident!("k{i}"));
            let bindings2 = bindings.clone();
            let entries = many.iter().zip(bindings2).map(|(f, binding)| {
                let column = &f.column_name;
                quote!((#column, ::persist_core::value::Value::from(#binding)))
            });
            quote! {
                let (#(#bindings),*) = key.clone();
                ::std::vec![#(#entries),*]
            }
        }
    }
}
