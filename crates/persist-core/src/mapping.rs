// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Entity metadata (component A).
//!
//! [`Mapping`] is the immutable, statically-built schema descriptor that
//! the `#[derive(Entity)]` macro constructs for each entity type. Every
//! other runtime component (DDL synthesis, predicate translation, the
//! persistence provider, the cache facade) reads from a `Mapping`
//! instead of doing any reflection of its own — this is the
//! compile-time-derivation redesign called for over a reflection-driven
//! approach.

use std::collections::BTreeMap;

use crate::{error::PersistError, value::Value};

/// Declared storage type of a property, independent of its Rust type.
///
/// Drives the column's SQLite storage class (component C's type
/// mapping table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// Any integer width or boolean.
    Integer,
    /// Floating point or decimal/money.
    Real,
    /// Fixed or variable length text, temporal, UUID.
    Text,
    /// Binary blob.
    Blob
}

impl StorageType {
    /// SQLite storage class keyword.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB"
        }
    }
}

/// Which audit-field role a property fills, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    /// Row creation instant.
    CreatedTime,
    /// Last successful write instant.
    LastWriteTime,
    /// Monotonic optimistic-concurrency counter.
    Version,
    /// Soft-delete flag.
    IsDeleted,
    /// Optional absolute expiration instant.
    ExpirationTime
}

/// Metadata for a single mapped property.
#[derive(Debug, Clone)]
pub struct PropertyMapping {
    /// Rust field/property name.
    pub property_name: &'static str,
    /// Database column name.
    pub column_name: &'static str,
    /// Declared storage type.
    pub storage_type: StorageType,
    /// Declared size/precision for `TEXT`/`REAL` columns (e.g. `VARCHAR(n)`).
    pub size: Option<u32>,
    /// Whether the column allows `NULL`.
    pub nullable: bool,
    /// Raw SQL default expression, if any.
    pub default_expr: Option<&'static str>,
    /// True if this property participates in the primary key.
    pub is_primary_key: bool,
    /// Ordinal position within a composite primary key (0 if not composite).
    pub pk_order: u32,
    /// True if the column auto-increments (`INTEGER PRIMARY KEY AUTOINCREMENT`).
    pub is_auto_increment: bool,
    /// True if a `UNIQUE` constraint applies to this column alone.
    pub is_unique: bool,
    /// True if this is a computed (generated) column.
    pub is_computed: bool,
    /// Generation expression for a computed column.
    pub computed_expr: Option<&'static str>,
    /// Whether a computed column is persisted (`STORED`) or virtual.
    pub computed_persisted: bool,
    /// Audit-field role, if this property fills one.
    pub audit_kind: Option<AuditKind>,
    /// Raw `CHECK` constraint expression, if any.
    pub check_expr: Option<&'static str>
}

impl PropertyMapping {
    /// True if this property is excluded from `INSERT` column lists
    /// (computed or auto-increment).
    #[must_use]
    pub const fn excluded_from_insert(&self) -> bool {
        self.is_computed || self.is_auto_increment
    }

    /// True if this property is excluded from `UPDATE SET` lists
    /// (computed or primary-key).
    #[must_use]
    pub const fn excluded_from_update(&self) -> bool {
        self.is_computed || self.is_primary_key
    }
}

/// Primary key descriptor: one or more properties in strict ordinal
/// order.
#[derive(Debug, Clone)]
pub struct PrimaryKey {
    /// Column names in declared ordinal order.
    pub columns: Vec<&'static str>
}

impl PrimaryKey {
    /// `WHERE` fragment for an equality match on this primary key,
    /// using `@`-prefixed parameter names built from `prefix` (e.g.
    /// `""` or `"old_"`).
    #[must_use]
    pub fn where_clause(&self, prefix: &str) -> String {
        self.columns
            .iter()
            .map(|c| format!("{c} = @{prefix}{c}"))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// A merged index definition: attributes from multiple properties that
/// share an index name collapse into a single composite index.
#[derive(Debug, Clone)]
pub struct IndexDef {
    /// Index name.
    pub name: &'static str,
    /// Ordered column list.
    pub columns: Vec<&'static str>,
    /// `UNIQUE INDEX` if true.
    pub unique: bool,
    /// Optional partial-index filter expression.
    pub filter: Option<&'static str>
}

/// Referential action for `ON DELETE`/`ON UPDATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    /// `CASCADE`.
    Cascade,
    /// `SET NULL`.
    SetNull,
    /// `SET DEFAULT`.
    SetDefault,
    /// `RESTRICT`.
    Restrict,
    /// `NO ACTION`.
    NoAction
}

impl ReferentialAction {
    /// SQL keyword for this action.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION"
        }
    }
}

/// A (possibly composite) foreign-key definition.
#[derive(Debug, Clone)]
pub struct ForeignKeyDef {
    /// Constraint name shared by every participating column.
    pub name: &'static str,
    /// Local columns, in referenced-key order.
    pub local_columns: Vec<&'static str>,
    /// Referenced table.
    pub referenced_table: &'static str,
    /// Referenced columns, matching `local_columns` ordinal position.
    pub referenced_columns: Vec<&'static str>,
    /// `ON DELETE` action.
    pub on_delete: ReferentialAction,
    /// `ON UPDATE` action.
    pub on_update: ReferentialAction
}

/// Immutable, per-type schema descriptor produced by `#[derive(Entity)]`.
///
/// Built once per type (the macro emits a `OnceLock`-backed accessor)
/// and treated as read-only afterwards.
#[derive(Debug, Clone)]
pub struct Mapping {
    /// Table name (defaults to the entity's type name).
    pub table: &'static str,
    /// Optional schema/namespace prefix; `None` for engines like SQLite
    /// that do not support schemas.
    pub schema: Option<&'static str>,
    /// Declared properties in source order.
    pub properties: Vec<PropertyMapping>,
    /// Primary key descriptor.
    pub primary_key: PrimaryKey,
    /// Merged index definitions.
    pub indexes: Vec<IndexDef>,
    /// Merged foreign-key definitions.
    pub foreign_keys: Vec<ForeignKeyDef>
}

impl Mapping {
    /// Fully-qualified table name (`schema.table` or just `table`).
    #[must_use]
    pub fn fq_table(&self) -> String {
        match self.schema {
            Some(schema) => format!("{schema}.{}", self.table),
            None => self.table.to_string()
        }
    }

    /// Columns selected by `SELECT` (every mapped, non-excluded
    /// property).
    #[must_use]
    pub fn select_columns(&self) -> Vec<&'static str> {
        self.properties.iter().map(|p| p.column_name).collect()
    }

    /// Columns written by `INSERT` (excludes computed and
    /// auto-increment properties).
    #[must_use]
    pub fn insert_columns(&self) -> Vec<&'static str> {
        self.properties
            .iter()
            .filter(|p| !p.excluded_from_insert())
            .map(|p| p.column_name)
            .collect()
    }

    /// Columns written by `UPDATE ... SET` (excludes computed and
    /// primary-key properties).
    #[must_use]
    pub fn update_columns(&self) -> Vec<&'static str> {
        self.properties
            .iter()
            .filter(|p| !p.excluded_from_update())
            .map(|p| p.column_name)
            .collect()
    }

    /// Columns that carry actual payload rather than bookkeeping
    /// (excludes primary-key, computed and audit-role columns).
    ///
    /// Used to decide whether two versions of a row genuinely differ,
    /// as opposed to differing only in `Version`/`LastWriteTime`/etc.
    #[must_use]
    pub fn content_columns(&self) -> Vec<&'static str> {
        self.properties
            .iter()
            .filter(|p| !p.is_primary_key && !p.is_computed && p.audit_kind.is_none())
            .map(|p| p.column_name)
            .collect()
    }

    /// Resolves a property name (or the `Id`/`Key` sentinel) to its
    /// column name, as used by the predicate translator's member-access
    /// nodes.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::UnsupportedExpression`] if no property
    /// with that name is mapped.
    pub fn resolve_column(&self, property: &str) -> Result<&'static str, PersistError> {
        if (property == "Id" || property == "Key") && self.primary_key.columns.len() == 1 {
            return Ok(self.primary_key.columns[0]);
        }
        self.properties
            .iter()
            .find(|p| p.property_name == property)
            .map(|p| p.column_name)
            .ok_or_else(|| {
                PersistError::UnsupportedExpression(format!("unknown property '{property}'"))
            })
    }

    /// The property carrying a given audit role, if mapped.
    #[must_use]
    pub fn audit_property(&self, kind: AuditKind) -> Option<&PropertyMapping> {
        self.properties.iter().find(|p| p.audit_kind == Some(kind))
    }

    /// Validates structural invariants that cannot be fully checked at
    /// macro-expansion time against a live value.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Configuration`] if no primary key is
    /// present, or if foreign keys sharing a name disagree on actions.
    pub fn validate(&self) -> Result<(), PersistError> {
        if self.primary_key.columns.is_empty() {
            return Err(PersistError::Configuration(format!(
                "entity mapped to table '{}' has no primary key",
                self.table
            )));
        }

        let mut by_name: BTreeMap<&str, &ForeignKeyDef> = BTreeMap::new();
        for fk in &self.foreign_keys {
            if let Some(existing) = by_name.get(fk.name) {
                if existing.on_delete != fk.on_delete || existing.on_update != fk.on_update {
                    return Err(PersistError::Configuration(format!(
                        "foreign key '{}' has conflicting ON DELETE/UPDATE actions across properties",
                        fk.name
                    )));
                }
            } else {
                by_name.insert(fk.name, fk);
            }
        }
        Ok(())
    }
}

/// Implemented by `#[derive(Entity)]` for every mapped type.
///
/// Provides the statically-built [`Mapping`] plus conversion to/from the
/// generic [`Value`] representation used by DDL synthesis, parameter
/// binding and predicate translation.
pub trait Mapped: Sized {
    /// Returns this type's schema mapping (computed once, then cached).
    fn mapping() -> &'static Mapping;

    /// Column values to bind for `INSERT`/`UPDATE`, keyed by column
    /// name, in the order `Mapping::insert_columns`/`update_columns`
    /// expects.
    fn bind_values(&self) -> Vec<(&'static str, Value)>;

    /// Primary-key values, keyed by column name, in
    /// `Mapping::primary_key` order.
    fn key_values(&self) -> Vec<(&'static str, Value)>;

    /// Materializes an instance from a fully-selected row of
    /// `(column_name, Value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Serialization`] if a required column is
    /// missing or carries an incompatible storage class.
    fn from_values(row: &[(&'static str, Value)]) -> Result<Self, PersistError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mapping() -> Mapping {
        Mapping {
            table: "widgets",
            schema: None,
            properties: vec![
                PropertyMapping {
                    property_name: "id",
                    column_name: "Id",
                    storage_type: StorageType::Text,
                    size: None,
                    nullable: false,
                    default_expr: None,
                    is_primary_key: true,
                    pk_order: 0,
                    is_auto_increment: false,
                    is_unique: true,
                    is_computed: false,
                    computed_expr: None,
                    computed_persisted: false,
                    audit_kind: None,
                    check_expr: None
                },
                PropertyMapping {
                    property_name: "version",
                    column_name: "Version",
                    storage_type: StorageType::Integer,
                    size: None,
                    nullable: false,
                    default_expr: None,
                    is_primary_key: false,
                    pk_order: 0,
                    is_auto_increment: false,
                    is_unique: false,
                    is_computed: false,
                    computed_expr: None,
                    computed_persisted: false,
                    audit_kind: Some(AuditKind::Version),
                    check_expr: None
                },
            ],
            primary_key: PrimaryKey {
                columns: vec!["Id"]
            },
            indexes: vec![],
            foreign_keys: vec![]
        }
    }

    #[test]
    fn select_insert_update_columns() {
        let m = sample_mapping();
        assert_eq!(m.select_columns(), vec!["Id", "Version"]);
        assert_eq!(m.insert_columns(), vec!["Id", "Version"]);
        assert_eq!(m.update_columns(), vec!["Version"]);
    }

    #[test]
    fn content_columns_excludes_pk_and_audit() {
        let m = sample_mapping();
        assert!(m.content_columns().is_empty());
    }

    #[test]
    fn resolve_column_sentinel() {
        let m = sample_mapping();
        assert_eq!(m.resolve_column("Id").unwrap(), "Id");
        assert_eq!(m.resolve_column("version").unwrap(), "Version");
        assert!(m.resolve_column("missing").is_err());
    }

    #[test]
    fn validate_requires_primary_key() {
        let mut m = sample_mapping();
        m.primary_key.columns.clear();
        assert!(m.validate().is_err());
    }

    #[test]
    fn pk_where_clause_with_prefix() {
        let m = sample_mapping();
        assert_eq!(m.primary_key.where_clause("old_"), "Id = @old_Id");
        assert_eq!(m.primary_key.where_clause(""), "Id = @Id");
    }
}
