// Copyright (c) 2025 Table Engine Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::Error;
use crate::join::JoinedRow;
use crate::row::Row;
use crate::schema::Schema;

/// A single column reference within a [`Projection`]: an optional owning
/// table (for qualifying a joined-row lookup), the column name, and an
/// optional output alias.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
    pub alias: Option<String>,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        ColumnRef { table: None, column: column.into(), alias: None }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        ColumnRef { table: Some(table.into()), column: column.into(), alias: None }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column)
    }

    fn applies_to(&self, table_name: &str) -> bool {
        self.table.as_deref().is_none_or(|t| t == table_name)
    }
}

/// Either "all columns" or an ordered list of [`ColumnRef`]s.
#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    All,
    Columns(Vec<ColumnRef>),
}

impl Projection {
    /// Every `ColumnRef` whose `table` is absent or equal to `table_name`
    /// must name a real column in `schema`.
    pub fn validate(&self, schema: &Schema, table_name: &str) -> crate::Result<()> {
        let Projection::Columns(refs) = self else { return Ok(()) };
        for column_ref in refs {
            if column_ref.applies_to(table_name) && schema.column(&column_ref.column).is_none() {
                return Err(Error::ColumnNotFound {
                    table: table_name.to_string(),
                    column: column_ref.column.clone(),
                });
            }
        }
        Ok(())
    }

    /// Projects a single-table `row`. Refs that don't apply to
    /// `table_name` are skipped; a ref whose source column is absent
    /// from `row` is silently skipped too (the join fill-with-null case,
    /// where `row` may be the unmatched side of an outer join).
    pub fn project_row(&self, row: &Row, table_name: &str) -> Row {
        match self {
            Projection::All => row.clone(),
            Projection::Columns(refs) => {
                let mut out = Row::new();
                for column_ref in refs {
                    if !column_ref.applies_to(table_name) {
                        continue;
                    }
                    if let Some(value) = row.get(&column_ref.column) {
                        out.set(column_ref.output_name(), value.clone());
                    }
                }
                out
            }
        }
    }

    /// Projects a [`JoinedRow`]. A qualified ref (`ref.table` present)
    /// looks up `"table.column"` directly. An unqualified ref looks up
    /// the bare column name, which [`JoinedRow::lookup`] resolves to the
    /// first qualified key it's a suffix of — callers joining two tables
    /// that share a column name are expected to qualify when ambiguity
    /// matters (see spec §9's note on this).
    pub fn project_joined_row(&self, joined: &JoinedRow) -> Row {
        match self {
            Projection::All => joined.to_row(),
            Projection::Columns(refs) => {
                let mut out = Row::new();
                for column_ref in refs {
                    let key = match &column_ref.table {
                        Some(table) => format!("{table}.{}", column_ref.column),
                        None => column_ref.column.clone(),
                    };
                    if let Some(value) = joined.lookup(&key) {
                        out.set(column_ref.output_name(), value.clone());
                    }
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::value::{Value, ValueType};

    #[test]
    fn all_projection_deep_copies_the_row() {
        let mut row = Row::new();
        row.set("id", Value::Integer(1));
        let projected = Projection::All.project_row(&row, "t");
        assert_eq!(projected, row);
    }

    #[test]
    fn named_projection_applies_alias_and_skips_foreign_refs() {
        let mut row = Row::new();
        row.set("id", Value::Integer(1));
        row.set("name", Value::Text("A".into()));

        let projection = Projection::Columns(vec![
            ColumnRef::new("name").aliased("full_name"),
            ColumnRef::qualified("other_table", "id"),
        ]);
        let projected = projection.project_row(&row, "users");
        assert_eq!(projected.get("full_name"), Some(&Value::Text("A".into())));
        assert!(!projected.contains("id"));
    }

    #[test]
    fn validate_rejects_unknown_column() {
        let schema = Schema::new("users", vec![Column::new("id", ValueType::Integer)]);
        let projection = Projection::Columns(vec![ColumnRef::new("missing")]);
        assert!(projection.validate(&schema, "users").is_err());
    }

    #[test]
    fn project_joined_row_resolves_qualified_and_bare_refs() {
        use crate::join::{JoinEngine, JoinKind};
        use crate::table::Table;

        let users = Table::open(Schema::new("users", vec![Column::new("id", ValueType::Integer)]));
        let mut u = Row::new();
        u.set("id", Value::Integer(1));
        users.insert(u, None).unwrap();

        let orders = Table::open(Schema::new(
            "orders",
            vec![Column::new("id", ValueType::Integer), Column::new("user_id", ValueType::Integer)],
        ));
        let mut o = Row::new();
        o.set("id", Value::Integer(10));
        o.set("user_id", Value::Integer(1));
        orders.insert(o, None).unwrap();

        let joined = JoinEngine::join(&users, &orders, "id", "user_id", JoinKind::Inner, None).unwrap();
        let projection = Projection::Columns(vec![
            ColumnRef::qualified("orders", "id").aliased("order_id"),
            ColumnRef::new("user_id"),
        ]);
        let projected = projection.project_joined_row(&joined[0]);
        assert_eq!(projected.get("order_id"), Some(&Value::Integer(10)));
        assert_eq!(projected.get("user_id"), Some(&Value::Integer(1)));
    }
}
