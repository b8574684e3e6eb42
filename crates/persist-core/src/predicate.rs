// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Predicate translator (component D).
//!
//! Filters are built as values of the [`Predicate`] algebraic datatype
//! — never as a host-language expression tree — and translated into a
//! parameterized `WHERE` fragment plus a positional parameter list by a
//! visitor over that datatype, so the translator never needs to couple
//! to a host-language AST.

use crate::{error::PersistError, mapping::Mapping, value::Value};

/// Binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge
}

impl BinaryOp {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">="
        }
    }
}

/// String-method predicate (`contains`/`starts_with`/`ends_with`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMatch {
    /// `field LIKE '%'||v||'%'`
    Contains,
    /// `field LIKE v||'%'`
    StartsWith,
    /// `field LIKE '%'||v`
    EndsWith
}

/// A filter expression over an entity's mapped properties.
///
/// Never reference a Rust expression tree or closure — every node is a
/// plain data value so the translator can be exhaustively tested.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// `left OP right` where `left` is a property name and `right` a
    /// literal value.
    Compare {
        /// Mapped property name (or the `Id`/`Key` sentinel).
        field: String,
        /// Comparison operator.
        op: BinaryOp,
        /// Bound literal value.
        value: Value
    },
    /// Logical conjunction.
    And(Box<Predicate>, Box<Predicate>),
    /// Logical disjunction.
    Or(Box<Predicate>, Box<Predicate>),
    /// Logical negation.
    Not(Box<Predicate>),
    /// `field.Contains/StartsWith/EndsWith(v)`.
    StringMatch {
        /// Mapped property name.
        field: String,
        /// Which pattern shape to emit.
        kind: StringMatch,
        /// Bound substring value.
        value: String
    },
    /// `collection.Contains(x.Field)` → `field IN (...)`.
    In {
        /// Mapped property name.
        field: String,
        /// Candidate literal values.
        values: Vec<Value>
    },
    /// Always true (identity for `AND`, used for an empty filter).
    True
}

impl Predicate {
    /// `left = value`.
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op: BinaryOp::Eq,
            value: value.into()
        }
    }

    /// `left OP value` for an arbitrary [`BinaryOp`].
    #[must_use]
    pub fn compare(field: impl Into<String>, op: BinaryOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into()
        }
    }

    /// Combine with `AND`.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Combine with `OR`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Negate.
    #[must_use]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// `field.Contains(value)`.
    #[must_use]
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::StringMatch {
            field: field.into(),
            kind: StringMatch::Contains,
            value: value.into()
        }
    }

    /// `field.StartsWith(value)`.
    #[must_use]
    pub fn starts_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::StringMatch {
            field: field.into(),
            kind: StringMatch::StartsWith,
            value: value.into()
        }
    }

    /// `field.EndsWith(value)`.
    #[must_use]
    pub fn ends_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::StringMatch {
            field: field.into(),
            kind: StringMatch::EndsWith,
            value: value.into()
        }
    }

    /// `values.Contains(field)`.
    #[must_use]
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::In {
            field: field.into(),
            values
        }
    }
}

/// Direction of an `ORDER BY` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// `ASC`
    Ascending,
    /// `DESC`
    Descending
}

impl OrderDirection {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC"
        }
    }
}

/// Translated `WHERE` fragment and its positional bind parameters.
pub struct Translated {
    /// SQL boolean fragment, referencing `@pN` parameters.
    pub sql: String,
    /// Parameters in the order they appear in `sql`.
    pub params: Vec<(String, Value)>
}

/// Translates a [`Predicate`] into a parameterized SQL fragment against
/// `mapping`'s column names.
///
/// # Errors
///
/// Returns [`PersistError::UnsupportedExpression`] if a referenced
/// field is not mapped, or an `IN` list is empty.
pub fn translate(predicate: &Predicate, mapping: &Mapping) -> Result<Translated, PersistError> {
    let mut params = Vec::new();
    let sql = translate_node(predicate, mapping, &mut params)?;
    Ok(Translated { sql, params })
}

fn translate_node(
    predicate: &Predicate,
    mapping: &Mapping,
    params: &mut Vec<(String, Value)>
) -> Result<String, PersistError> {
    match predicate {
        Predicate::True => Ok("1 = 1".to_string()),
        Predicate::Compare { field, op, value } => {
            let column = mapping.resolve_column(field)?;
            let name = next_param_name(params.len());
            params.push((name.clone(), value.clone()));
            Ok(format!("{column} {} @{name}", op.as_sql()))
        }
        Predicate::And(l, r) => {
            let l = translate_node(l, mapping, params)?;
            let r = translate_node(r, mapping, params)?;
            Ok(format!("({l} AND {r})"))
        }
        Predicate::Or(l, r) => {
            let l = translate_node(l, mapping, params)?;
            let r = translate_node(r, mapping, params)?;
            Ok(format!("({l} OR {r})"))
        }
        Predicate::Not(inner) => {
            let inner = translate_node(inner, mapping, params)?;
            Ok(format!("NOT ({inner})"))
        }
        Predicate::StringMatch { field, kind, value } => {
            let column = mapping.resolve_column(field)?;
            let name = next_param_name(params.len());
            params.push((name.clone(), Value::Text(value.clone())));
            let expr = match kind {
                StringMatch::Contains => format!("'%' || @{name} || '%'"),
                StringMatch::StartsWith => format!("@{name} || '%'"),
                StringMatch::EndsWith => format!("'%' || @{name}")
            };
            Ok(format!("{column} LIKE {expr}"))
        }
        Predicate::In { field, values } => {
            if values.is_empty() {
                return Err(PersistError::UnsupportedExpression(format!(
                    "IN predicate on '{field}' has an empty candidate list"
                )));
            }
            let column = mapping.resolve_column(field)?;
            let mut names = Vec::with_capacity(values.len());
            for value in values {
                let name = next_param_name(params.len());
                params.push((name.clone(), value.clone()));
                names.push(format!("@{name}"));
            }
            Ok(format!("{column} IN ({})", names.join(", ")))
        }
    }
}

fn next_param_name(index: usize) -> String {
    format!("p{}", index + 1)
}

/// Translates an order-by expression (property name + direction) into
/// an `ORDER BY` fragment, or a deterministic primary-key ascending
/// fragment if `field` is `None` — unordered paging is otherwise
/// nondeterministic across calls, which breaks page-by-page iteration.
///
/// # Errors
///
/// Returns [`PersistError::UnsupportedExpression`] if `field` is `Some`
/// but not mapped.
pub fn translate_order_by(
    field: Option<&str>,
    direction: OrderDirection,
    mapping: &Mapping
) -> Result<String, PersistError> {
    match field {
        Some(field) => {
            let column = mapping.resolve_column(field)?;
            Ok(format!("{column} {}", direction.as_sql()))
        }
        None => {
            let pk = mapping.primary_key.columns.join(", ");
            Ok(format!("{pk} ASC"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{PrimaryKey, PropertyMapping, StorageType};

    fn mapping() -> Mapping {
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
                    property_name: "value",
                    column_name: "Value",
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
            ],
            primary_key: PrimaryKey {
                columns: vec!["Id"]
            },
            indexes: vec![],
            foreign_keys: vec![]
        }
    }

    #[test]
    fn compare_binds_single_param() {
        let m = mapping();
        let t = translate(&Predicate::eq("value", 5i64), &m).unwrap();
        assert_eq!(t.sql, "Value = @p1");
        assert_eq!(t.params, vec![("p1".to_string(), Value::Integer(5))]);
    }

    #[test]
    fn and_combines_with_sequential_params() {
        let m = mapping();
        let pred = Predicate::compare("value", BinaryOp::Ge, 500i64)
            .and(Predicate::compare("value", BinaryOp::Lt, 800i64));
        let t = translate(&pred, &m).unwrap();
        assert_eq!(t.sql, "(Value >= @p1 AND Value < @p2)");
        assert_eq!(t.params.len(), 2);
    }

    #[test]
    fn contains_produces_like_pattern() {
        let m = mapping();
        let t = translate(&Predicate::contains("name", "foo"), &m).unwrap();
        assert_eq!(t.sql, "Name LIKE '%' || @p1 || '%'");
    }

    #[test]
    fn starts_with_and_ends_with() {
        let m = mapping();
        let sw = translate(&Predicate::starts_with("name", "foo"), &m).unwrap();
        assert_eq!(sw.sql, "Name LIKE @p1 || '%'");
        let ew = translate(&Predicate::ends_with("name", "foo"), &m).unwrap();
        assert_eq!(ew.sql, "Name LIKE '%' || @p1");
    }

    #[test]
    fn in_predicate_binds_each_value() {
        let m = mapping();
        let t = translate(
            &Predicate::is_in("value", vec![Value::Integer(1), Value::Integer(2)]),
            &m
        )
        .unwrap();
        assert_eq!(t.sql, "Value IN (@p1, @p2)");
        assert_eq!(t.params.len(), 2);
    }

    #[test]
    fn empty_in_list_is_unsupported() {
        let m = mapping();
        let err = translate(&Predicate::is_in("value", vec![]), &m).unwrap_err();
        assert!(matches!(err, PersistError::UnsupportedExpression(_)));
    }

    #[test]
    fn unknown_field_is_unsupported() {
        let m = mapping();
        let err = translate(&Predicate::eq("bogus", 1i64), &m).unwrap_err();
        assert!(matches!(err, PersistError::UnsupportedExpression(_)));
    }

    #[test]
    fn order_by_defaults_to_primary_key_ascending() {
        let m = mapping();
        let order = translate_order_by(None, OrderDirection::Ascending, &m).unwrap();
        assert_eq!(order, "Id ASC");
    }

    #[test]
    fn order_by_named_field() {
        let m = mapping();
        let order = translate_order_by(Some("value"), OrderDirection::Descending, &m).unwrap();
        assert_eq!(order, "Value DESC");
    }

    #[test]
    fn not_wraps_inner_expression() {
        let m = mapping();
        let t = translate(&Predicate::eq("value", 1i64).not(), &m).unwrap();
        assert_eq!(t.sql, "NOT (Value = @p1)");
    }

    #[test]
    fn or_combines() {
        let m = mapping();
        let t = translate(
            &Predicate::eq("value", 1i64).or(Predicate::eq("value", 2i64)),
            &m
        )
        .unwrap();
        assert_eq!(t.sql, "(Value = @p1 OR Value = @p2)");
    }
}
