// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Hand-written `Entity`/`Mapped` fixture shared by the integration
//! tests. `persist-core` cannot depend on its own derive macro, so this
//! plays the role `#[derive(Entity)]` would generate for a small
//! `widgets` table.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use persist_core::{
    entity::Entity,
    error::PersistError,
    mapping::{AuditKind, Mapped, Mapping, PrimaryKey, PropertyMapping, StorageType},
    value::{FromValue, Value}
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: String,
    pub name: String,
    pub quantity: i64,
    pub created_time: DateTime<Utc>,
    pub last_write_time: DateTime<Utc>,
    pub version: i64,
    pub is_deleted: bool,
    pub expiration_time: Option<DateTime<Utc>>
}

impl Widget {
    pub fn new(id: &str, name: &str, quantity: i64) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            quantity,
            created_time: now,
            last_write_time: now,
            version: 0,
            is_deleted: false,
            expiration_time: None
        }
    }
}

fn mapping() -> &'static Mapping {
    static MAPPING: OnceLock<Mapping> = OnceLock::new();
    MAPPING.get_or_init(|| Mapping {
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
                property_name: "name",
                column_name: "Name",
                storage_type: StorageType::Text,
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
                audit_kind: None,
                check_expr: None
            },
            PropertyMapping {
                property_name: "quantity",
                column_name: "Quantity",
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
                audit_kind: None,
                check_expr: None
            },
            PropertyMapping {
                property_name: "created_time",
                column_name: "CreatedTime",
                storage_type: StorageType::Text,
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
                audit_kind: Some(AuditKind::CreatedTime),
                check_expr: None
            },
            PropertyMapping {
                property_name: "last_write_time",
                column_name: "LastWriteTime",
                storage_type: StorageType::Text,
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
                audit_kind: Some(AuditKind::LastWriteTime),
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
            PropertyMapping {
                property_name: "is_deleted",
                column_name: "IsDeleted",
                storage_type: StorageType::Integer,
                size: None,
                nullable: false,
                default_expr: Some("0"),
                is_primary_key: false,
                pk_order: 0,
                is_auto_increment: false,
                is_unique: false,
                is_computed: false,
                computed_expr: None,
                computed_persisted: false,
                audit_kind: Some(AuditKind::IsDeleted),
                check_expr: None
            },
            PropertyMapping {
                property_name: "expiration_time",
                column_name: "ExpirationTime",
                storage_type: StorageType::Text,
                size: None,
                nullable: true,
                default_expr: None,
                is_primary_key: false,
                pk_order: 0,
                is_auto_increment: false,
                is_unique: false,
                is_computed: false,
                computed_expr: None,
                computed_persisted: false,
                audit_kind: Some(AuditKind::ExpirationTime),
                check_expr: None
            },
        ],
        primary_key: PrimaryKey { columns: vec!["Id"] },
        indexes: vec![],
        foreign_keys: vec![]
    })
}

impl Mapped for Widget {
    fn mapping() -> &'static Mapping {
        mapping()
    }

    fn bind_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("Id", self.id.clone().into()),
            ("Name", self.name.clone().into()),
            ("Quantity", self.quantity.into()),
            ("CreatedTime", self.created_time.into()),
            ("LastWriteTime", self.last_write_time.into()),
            ("Version", self.version.into()),
            ("IsDeleted", self.is_deleted.into()),
            ("ExpirationTime", self.expiration_time.into()),
        ]
    }

    fn key_values(&self) -> Vec<(&'static str, Value)> {
        vec![("Id", self.id.clone().into())]
    }

    fn from_values(row: &[(&'static str, Value)]) -> Result<Self, PersistError> {
        let get = |col: &str| -> Result<Value, PersistError> {
            row.iter()
                .find(|(c, _)| *c == col)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| PersistError::Serialization(format!("missing column {col}")))
        };
        Ok(Self {
            id: String::from_value(get("Id")?)?,
            name: String::from_value(get("Name")?)?,
            quantity: i64::from_value(get("Quantity")?)?,
            created_time: DateTime::<Utc>::from_value(get("CreatedTime")?)?,
            last_write_time: DateTime::<Utc>::from_value(get("LastWriteTime")?)?,
            version: i64::from_value(get("Version")?)?,
            is_deleted: bool::from_value(get("IsDeleted")?)?,
            expiration_time: Option::<DateTime<Utc>>::from_value(get("ExpirationTime")?)?
        })
    }
}

impl Entity for Widget {
    type Key = String;

    fn id(&self) -> Self::Key {
        self.id.clone()
    }

    fn key_params(key: &Self::Key) -> Vec<(&'static str, Value)> {
        vec![("Id", key.clone().into())]
    }

    fn created_time(&self) -> DateTime<Utc> {
        self.created_time
    }

    fn set_created_time(&mut self, value: DateTime<Utc>) {
        self.created_time = value;
    }

    fn last_write_time(&self) -> DateTime<Utc> {
        self.last_write_time
    }

    fn set_last_write_time(&mut self, value: DateTime<Utc>) {
        self.last_write_time = value;
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, value: i64) {
        self.version = value;
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn set_deleted(&mut self, value: bool) {
        self.is_deleted = value;
    }

    fn expiration_time(&self) -> Option<DateTime<Utc>> {
        self.expiration_time
    }

    fn set_expiration_time(&mut self, value: Option<DateTime<Utc>>) {
        self.expiration_time = value;
    }
}

/// Opens a fresh in-memory database and runs `Widget`'s schema.
pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite pool")
}
