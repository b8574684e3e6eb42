// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! DDL and per-operation SQL synthesis (component C).
//!
//! Every function here is a pure string builder over a [`Mapping`] — no
//! I/O, no engine handle. The persistence provider calls these once per
//! entity type (results are cheap to cache) and reuses the fragments
//! across calls.

use crate::mapping::{AuditKind, Mapping, PropertyMapping};

fn column_def(prop: &PropertyMapping) -> String {
    let mut parts = vec![prop.column_name.to_string(), prop.storage_type.as_sql().to_string()];

    if prop.is_primary_key
        && prop.is_auto_increment
        && matches!(prop.storage_type, crate::mapping::StorageType::Integer)
    {
        parts.push("PRIMARY KEY AUTOINCREMENT".to_string());
    }
    if !prop.nullable && !(prop.is_primary_key && prop.is_auto_increment) {
        parts.push("NOT NULL".to_string());
    }
    if prop.is_unique && !prop.is_primary_key {
        parts.push("UNIQUE".to_string());
    }
    if let Some(expr) = default_expr_for(prop) {
        parts.push(format!("DEFAULT ({expr})"));
    }
    if let Some(check) = prop.check_expr {
        parts.push(format!("CHECK ({check})"));
    }
    if prop.is_computed {
        if let Some(expr) = prop.computed_expr {
            let persisted = if prop.computed_persisted { "STORED" } else { "VIRTUAL" };
            return format!(
                "{} {} GENERATED ALWAYS AS ({expr}) {persisted}",
                prop.column_name,
                prop.storage_type.as_sql()
            );
        }
    }
    parts.join(" ")
}

fn default_expr_for(prop: &PropertyMapping) -> Option<&'static str> {
    match prop.default_expr {
        Some(expr) => Some(expr),
        None if matches!(
            prop.audit_kind,
            Some(AuditKind::CreatedTime | AuditKind::LastWriteTime)
        ) =>
        {
            Some("datetime('now')")
        }
        None => None
    }
}

/// `CREATE TABLE IF NOT EXISTS` statement for `mapping`, including the
/// composite primary key and foreign-key clauses.
#[must_use]
pub fn create_table_sql(mapping: &Mapping) -> String {
    let mut clauses: Vec<String> = mapping.properties.iter().map(column_def).collect();

    // A single auto-incrementing integer PK is declared inline
    // (`INTEGER PRIMARY KEY AUTOINCREMENT`); anything else needs a
    // trailing composite/simple PRIMARY KEY clause.
    let has_inline_autoincrement_pk = mapping.primary_key.columns.len() == 1
        && mapping.properties.iter().any(|p| {
            p.is_primary_key
                && p.is_auto_increment
                && matches!(p.storage_type, crate::mapping::StorageType::Integer)
        });

    if !has_inline_autoincrement_pk && !mapping.primary_key.columns.is_empty() {
        clauses.push(format!("PRIMARY KEY ({})", mapping.primary_key.columns.join(", ")));
    }

    for fk in &mapping.foreign_keys {
        clauses.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            fk.local_columns.join(", "),
            fk.referenced_table,
            fk.referenced_columns.join(", "),
            fk.on_delete.as_sql(),
            fk.on_update.as_sql()
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        mapping.fq_table(),
        clauses.join(",\n    ")
    )
}

/// `CREATE [UNIQUE] INDEX IF NOT EXISTS` statements, one per merged
/// index.
#[must_use]
pub fn create_index_sql(mapping: &Mapping) -> Vec<String> {
    mapping
        .indexes
        .iter()
        .map(|idx| {
            let unique = if idx.unique { "UNIQUE " } else { "" };
            let filter = match &idx.filter {
                Some(expr) => format!(" WHERE {expr}"),
                None => String::new()
            };
            format!(
                "CREATE {unique}INDEX IF NOT EXISTS {} ON {} ({}){filter}",
                idx.name,
                mapping.fq_table(),
                idx.columns.join(", ")
            )
        })
        .collect()
}

/// `SELECT` statement returning the latest non-deleted version of a
/// logical row by primary key.
///
/// The `ORDER BY Version DESC LIMIT 1` clause is included only when the
/// table carries a `Version` column.
#[must_use]
pub fn select_by_key_sql(mapping: &Mapping) -> String {
    let cols = mapping.select_columns().join(", ");
    let where_clause = mapping.primary_key.where_clause("");
    let order = if mapping.audit_property(AuditKind::Version).is_some() {
        let version_col = mapping.audit_property(AuditKind::Version).unwrap().column_name;
        format!(" ORDER BY {version_col} DESC LIMIT 1")
    } else {
        String::new()
    };
    format!(
        "SELECT {cols} FROM {} WHERE {where_clause}{order}",
        mapping.fq_table()
    )
}

/// `INSERT INTO` statement using `@column` named parameters.
#[must_use]
pub fn insert_sql(mapping: &Mapping) -> String {
    let cols = mapping.insert_columns();
    let binds: Vec<String> = cols.iter().map(|c| format!("@{c}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        mapping.fq_table(),
        cols.join(", "),
        binds.join(", ")
    )
}

/// `UPDATE ... SET` statement. Old-primary-key parameters are
/// prefixed `@old_` to distinguish them from new-value binds. When the
/// entity carries a `Version` column, the `WHERE` clause also requires
/// it to equal `@old_<version column>` — this is what turns a plain
/// update into a compare-and-swap: zero affected rows means the stored
/// version moved on since the caller read it.
#[must_use]
pub fn update_sql(mapping: &Mapping) -> String {
    let sets: Vec<String> = mapping
        .update_columns()
        .into_iter()
        .map(|c| format!("{c} = @{c}"))
        .collect();
    let mut where_clause = mapping.primary_key.where_clause("old_");
    if let Some(version) = mapping.audit_property(AuditKind::Version) {
        where_clause.push_str(&format!(" AND {} = @old_{}", version.column_name, version.column_name));
    }
    format!("UPDATE {} SET {} WHERE {}", mapping.fq_table(), sets.join(", "), where_clause)
}

/// `DELETE FROM` statement keyed by primary key.
#[must_use]
pub fn delete_sql(mapping: &Mapping) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        mapping.fq_table(),
        mapping.primary_key.where_clause("")
    )
}
