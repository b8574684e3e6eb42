// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Attribute parsing for the `Entity` derive macro.
//!
//! Struct-level `#[entity(table = "...", schema = "...")]` is parsed with
//! [`darling`]; field-level attributes (`#[column(...)]`, `#[pk]`,
//! `#[audit(...)]`, `#[index(...)]`, `#[fk(...)]`) use marker-style manual
//! parsing since they mix bare markers with key/value pairs and can repeat
//! per field.

use darling::FromDeriveInput;
use syn::{Data, DeriveInput, Fields, Ident, LitInt, LitStr, Type, Visibility, spanned::Spanned};

use super::storage::{StorageType, infer_storage};

/// Referential action for a `#[fk(...)]` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
    NoAction
}

impl ReferentialAction {
    fn parse(raw: &str, span: proc_macro2::Span) -> syn::Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "cascade" => Ok(Self::Cascade),
            "set_null" | "setnull" => Ok(Self::SetNull),
            "set_default" | "setdefault" => Ok(Self::SetDefault),
            "restrict" => Ok(Self::Restrict),
            "no_action" | "noaction" => Ok(Self::NoAction),
            other => Err(syn::Error::new(
                span,
                format!("unknown referential action '{other}'; expected one of cascade, set_null, set_default, restrict, no_action")
            ))
        }
    }

    /// Token stream for the matching `persist_core::mapping::ReferentialAction` variant.
    pub fn to_tokens(self) -> proc_macro2::TokenStream {
        use quote::quote;
        match self {
            Self::Cascade => quote!(::persist_core::mapping::ReferentialAction::Cascade),
            Self::SetNull => quote!(::persist_core::mapping::ReferentialAction::SetNull),
            Self::SetDefault => quote!(::persist_core::mapping::ReferentialAction::SetDefault),
            Self::Restrict => quote!(::persist_core::mapping::ReferentialAction::Restrict),
            Self::NoAction => quote!(::persist_core::mapping::ReferentialAction::NoAction)
        }
    }
}

impl Default for ReferentialAction {
    fn default() -> Self {
        Self::NoAction
    }
}

/// Which of the five mandatory audit roles a field fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditRole {
    CreatedTime,
    LastWriteTime,
    Version,
    IsDeleted,
    ExpirationTime
}

impl AuditRole {
    fn from_attr_str(raw: &str, span: proc_macro2::Span) -> syn::Result<Self> {
        match raw {
            "created_time" => Ok(Self::CreatedTime),
            "last_write_time" => Ok(Self::LastWriteTime),
            "version" => Ok(Self::Version),
            "is_deleted" => Ok(Self::IsDeleted),
            "expiration_time" => Ok(Self::ExpirationTime),
            other => Err(syn::Error::new(
                span,
                format!(
                    "unknown audit role '{other}'; expected one of created_time, \
                     last_write_time, version, is_deleted, expiration_time"
                )
            ))
        }
    }

    fn from_field_name(name: &str) -> Option<Self> {
        match name {
            "created_time" => Some(Self::CreatedTime),
            "last_write_time" => Some(Self::LastWriteTime),
            "version" => Some(Self::Version),
            "is_deleted" => Some(Self::IsDeleted),
            "expiration_time" => Some(Self::ExpirationTime),
            _ => None
        }
    }

    /// Token stream for the matching `persist_core::mapping::AuditKind` variant.
    pub fn to_tokens(self) -> proc_macro2::TokenStream {
        use quote::quote;
        match self {
            Self::CreatedTime => quote!(::persist_core::mapping::AuditKind::CreatedTime),
            Self::LastWriteTime => quote!(::persist_core::mapping::AuditKind::LastWriteTime),
            Self::Version => quote!(::persist_core::mapping::AuditKind::Version),
            Self::IsDeleted => quote!(::persist_core::mapping::AuditKind::IsDeleted),
            Self::ExpirationTime => quote!(::persist_core::mapping::AuditKind::ExpirationTime)
        }
    }
}

/// One merged `#[index(...)]` entry, collected across every field that
/// names it.
#[derive(Debug, Clone)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<(u32, String)>,
    pub unique: bool,
    pub filter: Option<String>
}

/// One merged `#[fk(...)]` entry.
#[derive(Debug, Clone)]
pub struct ForeignKeyDef {
    pub name: String,
    pub local_columns: Vec<(u32, String)>,
    pub referenced_table: String,
    pub referenced_columns: Vec<(u32, String)>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction
}

/// A single mapped field.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub ident: Ident,
    pub ty: Type,
    pub column_name: String,
    pub storage: StorageType,
    pub nullable: bool,
    pub size: Option<u32>,
    pub default_expr: Option<String>,
    pub check_expr: Option<String>,
    pub is_primary_key: bool,
    pub pk_order: u32,
    pub is_auto_increment: bool,
    pub is_unique: bool,
    pub computed_expr: Option<String>,
    pub computed_persisted: bool,
    pub audit_role: Option<AuditRole>
}

impl FieldDef {
    pub const fn is_computed(&self) -> bool {
        self.computed_expr.is_some()
    }
}

/// Fully parsed `#[derive(Entity)]` input.
#[derive(Debug)]
pub struct EntityDef {
    pub ident: Ident,
    pub vis: Visibility,
    pub table: String,
    pub schema: Option<String>,
    pub fields: Vec<FieldDef>,
    pub indexes: Vec<IndexDef>,
    pub foreign_keys: Vec<ForeignKeyDef>
}

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(entity), supports(struct_named))]
struct EntityAttrs {
    #[darling(default)]
    table: Option<String>,
    #[darling(default)]
    schema: Option<String>
}

impl EntityDef {
    pub fn from_derive_input(input: &DeriveInput) -> syn::Result<Self> {
        let attrs = EntityAttrs::from_derive_input(input)
            .map_err(|e| syn::Error::new(input.span(), e.to_string()))?;
        let table = attrs.table.ok_or_else(|| {
            syn::Error::new(
                input.span(),
                "#[entity(table = \"...\")] is required: no table name was given"
            )
        })?;

        let Data::Struct(data) = &input.data else {
            return Err(syn::Error::new(input.span(), "Entity can only be derived for structs"));
        };
        let Fields::Named(named) = &data.fields else {
            return Err(syn::Error::new(input.span(), "Entity requires named fields"));
        };

        let mut fields = Vec::with_capacity(named.named.len());
        let mut indexes: Vec<IndexDef> = Vec::new();
        let mut foreign_keys: Vec<ForeignKeyDef> = Vec::new();

        for field in &named.named {
            let ident = field.ident.clone().expect("named field");
            let field_name = ident.to_string();
            let mut column_name = field_name.clone();
            let mut size = None;
            let mut default_expr = None;
            let mut check_expr = None;
            let mut is_unique = false;
            let mut is_primary_key = false;
            let mut pk_order = 0u32;
            let mut is_auto_increment = false;
            let mut computed_expr = None;
            let mut computed_persisted = false;
            let mut audit_role = None;

            for attr in &field.attrs {
                if attr.path().is_ident("column") {
                    attr.parse_nested_meta(|meta| {
                        if meta.path.is_ident("name") {
                            column_name = meta.value()?.parse::<LitStr>()?.value();
                        } else if meta.path.is_ident("size") {
                            size = Some(meta.value()?.parse::<LitInt>()?.base10_parse()?);
                        } else if meta.path.is_ident("default") {
                            default_expr = Some(meta.value()?.parse::<LitStr>()?.value());
                        } else if meta.path.is_ident("check") {
                            check_expr = Some(meta.value()?.parse::<LitStr>()?.value());
                        } else if meta.path.is_ident("unique") {
                            is_unique = true;
                        } else if meta.path.is_ident("auto_increment") {
                            is_auto_increment = true;
                        } else if meta.path.is_ident("computed") {
                            computed_expr = Some(meta.value()?.parse::<LitStr>()?.value());
                        } else if meta.path.is_ident("stored") {
                            computed_persisted = true;
                        } else {
                            return Err(meta.error("unknown #[column(...)] key"));
                        }
                        Ok(())
                    })?;
                } else if attr.path().is_ident("pk") {
                    is_primary_key = true;
                    if matches!(attr.meta, syn::Meta::List(_)) {
                        attr.parse_nested_meta(|meta| {
                            if meta.path.is_ident("order") {
                                pk_order = meta.value()?.parse::<LitInt>()?.base10_parse()?;
                            } else {
                                return Err(meta.error("unknown #[pk(...)] key"));
                            }
                            Ok(())
                        })?;
                    }
                } else if attr.path().is_ident("audit") {
                    attr.parse_nested_meta(|meta| {
                        let role = meta
                            .path
                            .get_ident()
                            .map(std::string::ToString::to_string)
                            .ok_or_else(|| meta.error("expected an audit role identifier"))?;
                        audit_role = Some(AuditRole::from_attr_str(&role, meta.path.span())?);
                        Ok(())
                    })?;
                } else if attr.path().is_ident("index") {
                    let mut name = None;
                    let mut unique = false;
                    let mut order = 0u32;
                    let mut filter = None;
                    attr.parse_nested_meta(|meta| {
                        if meta.path.is_ident("name") {
                            name = Some(meta.value()?.parse::<LitStr>()?.value());
                        } else if meta.path.is_ident("unique") {
                            unique = true;
                        } else if meta.path.is_ident("order") {
                            order = meta.value()?.parse::<LitInt>()?.base10_parse()?;
                        } else if meta.path.is_ident("filter") {
                            filter = Some(meta.value()?.parse::<LitStr>()?.value());
                        } else {
                            return Err(meta.error("unknown #[index(...)] key"));
                        }
                        Ok(())
                    })?;
                    let name = name.ok_or_else(|| {
                        syn::Error::new(attr.span(), "#[index(...)] requires a 'name'")
                    })?;
                    merge_index(&mut indexes, name, order, column_name.clone(), unique, filter);
                } else if attr.path().is_ident("fk") {
                    let mut name = None;
                    let mut table = None;
                    let mut column = None;
                    let mut order = 0u32;
                    let mut on_delete = ReferentialAction::NoAction;
                    let mut on_update = ReferentialAction::NoAction;
                    attr.parse_nested_meta(|meta| {
                        if meta.path.is_ident("name") {
                            name = Some(meta.value()?.parse::<LitStr>()?.value());
                        } else if meta.path.is_ident("table") {
                            table = Some(meta.value()?.parse::<LitStr>()?.value());
                        } else if meta.path.is_ident("column") {
                            column = Some(meta.value()?.parse::<LitStr>()?.value());
                        } else if meta.path.is_ident("order") {
                            order = meta.value()?.parse::<LitInt>()?.base10_parse()?;
                        } else if meta.path.is_ident("on_delete") {
                            let raw = meta.value()?.parse::<LitStr>()?.value();
                            on_delete = ReferentialAction::parse(&raw, attr.span())?;
                        } else if meta.path.is_ident("on_update") {
                            let raw = meta.value()?.parse::<LitStr>()?.value();
                            on_update = ReferentialAction::parse(&raw, attr.span())?;
                        } else {
                            return Err(meta.error("unknown #[fk(...)] key"));
                        }
                        Ok(())
                    })?;
                    let name = name
                        .ok_or_else(|| syn::Error::new(attr.span(), "#[fk(...)] requires a 'name'"))?;
                    let table = table.ok_or_else(|| {
                        syn::Error::new(attr.span(), "#[fk(...)] requires a referenced 'table'")
                    })?;
                    let referenced_column = column.unwrap_or_else(|| column_name.clone());
                    merge_fk(
                        &mut foreign_keys,
                        name,
                        table,
                        order,
                        column_name.clone(),
                        referenced_column,
                        on_delete,
                        on_update,
                        attr.span()
                    )?;
                }
            }

            if audit_role.is_none() {
                audit_role = AuditRole::from_field_name(&field_name);
            }
            if !is_primary_key && (field_name == "id" || field_name == "key") {
                is_primary_key = true;
            }

            let (storage, nullable) = infer_storage(&field.ty);

            fields.push(FieldDef {
                ident,
                ty: field.ty.clone(),
                column_name,
                storage,
                nullable,
                size,
                default_expr,
                check_expr,
                is_primary_key,
                pk_order,
                is_auto_increment,
                is_unique,
                computed_expr,
                computed_persisted,
                audit_role
            });
        }

        if !fields.iter().any(|f| f.is_primary_key) {
            return Err(syn::Error::new(
                input.span(),
                "no primary key found: mark a field with #[pk] or name it 'id'/'key'"
            ));
        }

        Ok(Self {
            ident: input.ident.clone(),
            vis: input.vis.clone(),
            table,
            schema: attrs.schema,
            fields,
            indexes,
            foreign_keys
        })
    }

    /// Fields whose ordinal position in the primary key is declared,
    /// sorted by that order.
    pub fn pk_fields(&self) -> Vec<&FieldDef> {
        let mut pk: Vec<&FieldDef> = self.fields.iter().filter(|f| f.is_primary_key).collect();
        pk.sort_by_key(|f| f.pk_order);
        pk
    }

    pub fn audit_field(&self, role: AuditRole) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.audit_role == Some(role))
    }
}

fn merge_index(
    indexes: &mut Vec<IndexDef>,
    name: String,
    order: u32,
    column: String,
    unique: bool,
    filter: Option<String>
) {
    if let Some(existing) = indexes.iter_mut().find(|i| i.name == name) {
        existing.columns.push((order, column));
        existing.unique |= unique;
        existing.filter = existing.filter.take().or(filter);
    } else {
        indexes.push(IndexDef {
            name,
            columns: vec![(order, column)],
            unique,
            filter
        });
    }
}

#[allow(clippy::too_many_arguments)]
fn merge_fk(
    foreign_keys: &mut Vec<ForeignKeyDef>,
    name: String,
    table: String,
    order: u32,
    local_column: String,
    referenced_column: String,
    on_delete: ReferentialAction,
    on_update: ReferentialAction,
    span: proc_macro2::Span
) -> syn::Result<()> {
    if let Some(existing) = foreign_keys.iter_mut().find(|fk| fk.name == name) {
        if existing.referenced_table != table {
            return Err(syn::Error::new(
                span,
                format!(
                    "foreign key '{name}' references table '{}' elsewhere but '{table}' here",
                    existing.referenced_table
                )
            ));
        }
        if existing.on_delete != on_delete || existing.on_update != on_update {
            return Err(syn::Error::new(
                span,
                format!("foreign key '{name}' has conflicting ON DELETE/UPDATE actions")
            ));
        }
        existing.local_columns.push((order, local_column));
        existing.referenced_columns.push((order, referenced_column));
    } else {
        foreign_keys.push(ForeignKeyDef {
            name,
            local_columns: vec![(order, local_column)],
            referenced_table: table,
            referenced_columns: vec![(order, referenced_column)],
            on_delete,
            on_update
        });
    }
    Ok(())
}
