// Copyright (c) 2025 Table Engine Contributors
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use tracing::instrument;

use crate::error::{ConstraintKind, Error};
use crate::row::Row;
use crate::schema::Schema;
use crate::value::Value;

/// An in-memory hash index: `Value` under the indexed column maps to the
/// ordered sequence of row positions holding that value.
///
/// Invariants (see spec §3):
/// - I1: for every `(column, pos)` pair recorded here, `rows[pos]` holds
///   `value` under `column`.
/// - I2: if `unique`, every bucket has length exactly 1.
/// - I3: every recorded position is a valid offset into the table's rows.
///
/// Bucket order is insertion order, which is what makes join output
/// deterministic (see [`crate::join`]).
#[derive(Clone, Debug, Default)]
pub struct Index {
    pub column: String,
    pub unique: bool,
    data: IndexMap<Value, Vec<usize>>,
}

impl Index {
    pub fn new(column: impl Into<String>, unique: bool) -> Self {
        Index { column: column.into(), unique, data: IndexMap::new() }
    }

    pub fn bucket(&self, value: &Value) -> Option<&[usize]> {
        self.data.get(value).map(Vec::as_slice)
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.data.contains_key(value)
    }

    pub fn first(&self, value: &Value) -> Option<usize> {
        self.bucket(value).and_then(|b| b.first().copied())
    }

    pub fn would_violate_unique(&self, value: &Value) -> bool {
        self.unique && self.contains(value)
    }

    /// Appends `pos` to `value`'s bucket. Callers are expected to have
    /// already rejected unique violations via [`Self::would_violate_unique`].
    pub fn insert(&mut self, value: Value, pos: usize) {
        self.data.entry(value).or_default().push(pos);
    }

    /// Removes `pos` from `value`'s bucket, dropping the bucket entirely
    /// once it's empty.
    pub fn remove(&mut self, value: &Value, pos: usize) {
        if let Some(bucket) = self.data.get_mut(value) {
            bucket.retain(|&p| p != pos);
            if bucket.is_empty() {
                self.data.shift_remove(value);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterates `(value, bucket)` pairs in the order buckets were first
    /// created — used by the join engine to reuse an existing index as a
    /// probe table without rescanning the table's rows.
    pub fn entries(&self) -> impl Iterator<Item = (&Value, &[usize])> {
        self.data.iter().map(|(v, b)| (v, b.as_slice()))
    }

    #[cfg(test)]
    pub fn bucket_count(&self) -> usize {
        self.data.len()
    }
}

/// Discards any existing indexes and rebuilds one unique index per
/// primary-key/unique column from `rows`, in row order. Used both at
/// table-open time and after `DELETE`, where row positions shift and any
/// previously-built index would reference stale positions.
#[instrument(level = "debug", skip(schema, rows), fields(table = %schema.table_name, rows = rows.len()))]
pub fn rebuild(schema: &Schema, rows: &[Row]) -> crate::Result<IndexMap<String, Index>> {
    let mut indexes = IndexMap::new();
    let mut seen_types: IndexMap<String, crate::value::ValueType> = IndexMap::new();
    for column in schema.unique_columns() {
        indexes.insert(column.name.clone(), Index::new(&column.name, true));
    }

    for (pos, row) in rows.iter().enumerate() {
        for column in schema.unique_columns() {
            let index = indexes.get_mut(&column.name).expect("just inserted above");
            match row.get(&column.name) {
                None if column.not_null => {
                    return Err(Error::constraint(
                        &schema.table_name,
                        &column.name,
                        None,
                        ConstraintKind::NotNull,
                        "row is missing a required indexed column",
                        Some(pos),
                    ));
                }
                None => continue,
                Some(value) => {
                    match seen_types.get(&column.name) {
                        Some(&first_type) if first_type != value.value_type() => {
                            tracing::warn!(
                                table = %schema.table_name,
                                column = %column.name,
                                position = pos,
                                first_type = %first_type,
                                this_type = %value.value_type(),
                                "indexed column holds inconsistent value types across rows",
                            );
                        }
                        Some(_) => {}
                        None => {
                            seen_types.insert(column.name.clone(), value.value_type());
                        }
                    }
                    let value = normalize_for_index(schema, column, value, pos)?;
                    if index.would_violate_unique(&value) {
                        let existing = index.first(&value);
                        return Err(Error::constraint(
                            &schema.table_name,
                            &column.name,
                            Some(value),
                            if column.primary_key { ConstraintKind::PrimaryKey } else { ConstraintKind::Unique },
                            format!("duplicate value also present at position {:?}", existing),
                            Some(pos),
                        ));
                    }
                    index.insert(value, pos);
                }
            }
        }
    }

    Ok(indexes)
}

/// Auto-increment PK columns may hold a whole float before normalization
/// (mirrors the coercion the validator performs on insert); the index
/// builder re-derives the same canonical integer so index keys line up.
fn normalize_for_index(
    schema: &Schema,
    column: &crate::schema::Column,
    value: &Value,
    pos: usize,
) -> crate::Result<Value> {
    if !column.auto_increment {
        return Ok(value.clone());
    }
    match value {
        Value::Integer(_) => Ok(value.clone()),
        Value::Float(v) if *v == v.trunc() && v.is_finite() => Ok(Value::Integer(*v as i64)),
        other => Err(Error::constraint(
            &schema.table_name,
            &column.name,
            Some(other.clone()),
            ConstraintKind::AutoIncrement,
            "auto-increment column must hold a whole integer",
            Some(pos),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::value::ValueType;

    fn schema() -> Schema {
        Schema::new(
            "users",
            vec![
                Column::new("id", ValueType::Integer).primary_key(),
                Column::new("email", ValueType::Email).unique(),
            ],
        )
    }

    #[test]
    fn rebuild_detects_unique_violation() {
        let schema = schema();
        let mut rows = Vec::new();
        for i in 0..2 {
            let mut row = Row::new();
            row.set("id", Value::Integer(i));
            row.set("email", Value::Email("same@example.com".into()));
            rows.push(row);
        }
        let err = rebuild(&schema, &rows).unwrap_err();
        assert!(matches!(err, Error::Constraint(e) if e.kind == ConstraintKind::Unique));
    }

    #[test]
    fn rebuild_indexes_every_unique_column() {
        let schema = schema();
        let mut row0 = Row::new();
        row0.set("id", Value::Integer(0));
        row0.set("email", Value::Email("a@example.com".into()));
        let mut row1 = Row::new();
        row1.set("id", Value::Integer(1));
        row1.set("email", Value::Email("b@example.com".into()));

        let indexes = rebuild(&schema, &[row0, row1]).unwrap();
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes["id"].first(&Value::Integer(1)), Some(1));
        assert_eq!(indexes["email"].bucket_count(), 2);
    }
}
