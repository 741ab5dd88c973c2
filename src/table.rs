// Copyright (c) 2025 Table Engine Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::instrument;

use crate::error::{ConstraintKind, Error};
use crate::index::{self, Index};
use crate::row::Row;
use crate::schema::Schema;
use crate::transaction::Transaction;
use crate::validate;
use crate::value::Value;

/// The mutable storage owned by a [`Table`]: rows, their indexes, the
/// auto-increment sequence, and the dirty bit. Always accessed through
/// `Table::state`'s lock, never piecemeal.
pub(crate) struct TableState {
    pub(crate) rows: Vec<Row>,
    pub(crate) indexes: IndexMap<String, Index>,
    pub(crate) last_insert_id: i64,
    pub(crate) dirty: bool,
}

/// An in-memory table: storage, indexes, auto-increment sequence, dirty
/// bit, and a reader/writer lock guarding all of it.
///
/// `SELECT` takes the read lock; `INSERT`/`UPDATE`/`DELETE` and index
/// rebuilds take the write lock for the whole operation — no public
/// method releases the lock mid-operation and re-acquires it (see spec
/// §9's "reader/writer discipline" note).
pub struct Table {
    schema: Schema,
    state: RwLock<TableState>,
    poisoned: AtomicBool,
}

impl Table {
    /// Opens an empty table for `schema`: no rows, no indexes,
    /// `last_insert_id = 0`, not dirty.
    pub fn open(schema: Schema) -> Self {
        let indexes = index::rebuild(&schema, &[]).expect("rebuilding from zero rows cannot fail");
        Table {
            schema,
            state: RwLock::new(TableState { rows: Vec::new(), indexes, last_insert_id: 0, dirty: false }),
            poisoned: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.schema.table_name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_dirty(&self) -> bool {
        self.state.read().dirty
    }

    /// Cleared only by an external persistence layer once it has flushed
    /// this table's current state; the core never clears it itself.
    pub fn clear_dirty(&self) {
        self.state.write().dirty = false;
    }

    pub fn last_insert_id(&self) -> i64 {
        self.state.read().last_insert_id
    }

    pub fn row_count(&self) -> usize {
        self.state.read().rows.len()
    }

    pub(crate) fn lock_read(&self) -> RwLockReadGuard<'_, TableState> {
        self.state.read()
    }

    fn lock_write(&self) -> RwLockWriteGuard<'_, TableState> {
        self.state.write()
    }

    fn check_alive(&self) -> crate::Result<()> {
        if self.poisoned.load(Ordering::Acquire) {
            return Err(Error::Poisoned { table: self.name().to_string() });
        }
        Ok(())
    }

    fn poison(&self) {
        self.poisoned.store(true, Ordering::Release);
    }

    /// Bulk-load interface for an external persistence layer: takes
    /// ownership of `rows` and `last_insert_id` as-is, normalizes
    /// Float-whole values into `Integer` for `Integer` columns, rebuilds
    /// indexes, and clears `dirty`.
    #[instrument(level = "debug", skip(self, rows), fields(table = %self.name(), rows = rows.len()))]
    pub fn load(&self, mut rows: Vec<Row>, last_insert_id: i64) -> crate::Result<()> {
        self.check_alive()?;
        for row in &mut rows {
            validate::validate(row, &self.schema)?;
        }
        let indexes = index::rebuild(&self.schema, &rows)?;
        let mut state = self.lock_write();
        state.rows = rows;
        state.indexes = indexes;
        state.last_insert_id = last_insert_id;
        state.dirty = false;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, row), fields(table = %self.name(), txn = ?txn.map(Transaction::id)))]
    pub fn insert(&self, row: Row, txn: Option<&Transaction>) -> crate::Result<Row> {
        self.check_alive()?;
        let mut row = row;
        let mut state = self.lock_write();

        if let Some(pk) = self.schema.auto_increment_primary_key() {
            let candidate = match row.get(&pk.name) {
                None => state.last_insert_id + 1,
                Some(supplied) => {
                    let supplied = match supplied {
                        Value::Integer(v) => *v,
                        Value::Float(v) if *v == v.trunc() && v.is_finite() => *v as i64,
                        other => {
                            return Err(Error::constraint(
                                self.name(),
                                &pk.name,
                                Some(other.clone()),
                                ConstraintKind::AutoIncrement,
                                "auto-increment value must be a whole integer",
                                None,
                            ));
                        }
                    };
                    if supplied <= state.last_insert_id {
                        return Err(Error::constraint(
                            self.name(),
                            &pk.name,
                            Some(Value::Integer(supplied)),
                            ConstraintKind::AutoIncrement,
                            "auto-increment value must be greater than the last issued id",
                            None,
                        ));
                    }
                    supplied
                }
            };
            row.set(&pk.name, Value::Integer(candidate));
            state.last_insert_id = candidate;
        } else if let Some(pk) = self.schema.primary_key() {
            if !row.contains(&pk.name) {
                return Err(Error::constraint(
                    self.name(),
                    &pk.name,
                    None,
                    ConstraintKind::PrimaryKey,
                    "primary key value is required",
                    None,
                ));
            }
        }

        validate::validate(&mut row, &self.schema)?;

        for (col_name, idx) in &state.indexes {
            if let Some(value) = row.get(col_name) {
                if idx.would_violate_unique(value) {
                    let kind = if self.schema.column(col_name).is_some_and(|c| c.primary_key) {
                        ConstraintKind::PrimaryKey
                    } else {
                        ConstraintKind::Unique
                    };
                    return Err(Error::constraint(
                        self.name(),
                        col_name,
                        Some(value.clone()),
                        kind,
                        "value already present in a unique index",
                        None,
                    ));
                }
            }
        }

        let new_pos = state.rows.len();
        for (col_name, idx) in state.indexes.iter_mut() {
            if let Some(value) = row.get(col_name) {
                idx.insert(value.clone(), new_pos);
            }
        }
        state.rows.push(row.clone());
        state.dirty = true;
        Ok(row)
    }

    #[instrument(level = "debug", skip(self, predicate, updates), fields(table = %self.name(), txn = ?txn.map(Transaction::id)))]
    pub fn update<P>(&self, predicate: P, updates: &Row, txn: Option<&Transaction>) -> crate::Result<usize>
    where
        P: Fn(&Row) -> bool,
    {
        self.check_alive()?;
        let mut state = self.lock_write();
        let matches: Vec<usize> =
            state.rows.iter().enumerate().filter(|(_, row)| predicate(row)).map(|(i, _)| i).collect();

        let mut new_rows = Vec::with_capacity(matches.len());
        for &i in &matches {
            let mut new_row = state.rows[i].merged(updates);
            validate::validate(&mut new_row, &self.schema)?;

            for (col_name, idx) in &state.indexes {
                if !idx.unique {
                    continue;
                }
                let old_value = state.rows[i].get(col_name);
                let new_value = new_row.get(col_name);
                if new_value == old_value {
                    continue;
                }
                if let Some(value) = new_value {
                    if idx.contains(value) && idx.first(value) != Some(i) {
                        let kind = if self.schema.column(col_name).is_some_and(|c| c.primary_key) {
                            ConstraintKind::PrimaryKey
                        } else {
                            ConstraintKind::Unique
                        };
                        return Err(Error::constraint(
                            self.name(),
                            col_name,
                            Some(value.clone()),
                            kind,
                            "value already present in a unique index",
                            Some(i),
                        ));
                    }
                }
            }
            new_rows.push(new_row);
        }

        for (&i, new_row) in matches.iter().zip(new_rows.iter()) {
            let old_row = state.rows[i].clone();
            for (col_name, idx) in state.indexes.iter_mut() {
                if let Some(old_value) = old_row.get(col_name) {
                    idx.remove(old_value, i);
                }
                if let Some(new_value) = new_row.get(col_name) {
                    idx.insert(new_value.clone(), i);
                }
            }
            state.rows[i] = new_row.clone();
        }

        let count = matches.len();
        if count > 0 {
            state.dirty = true;
        }
        Ok(count)
    }

    /// Deletes every row matching `predicate`, then fully rebuilds every
    /// index from the surviving rows (positions shift, so any previous
    /// index would reference stale positions). If the rebuild itself
    /// fails — only possible from allocation failure on well-formed
    /// input — the table is poisoned and rejects every later operation,
    /// because the row vector has already been mutated and partial
    /// indexes can no longer be trusted.
    #[instrument(level = "debug", skip(self, predicate), fields(table = %self.name()))]
    pub fn delete<P>(&self, predicate: P) -> crate::Result<usize>
    where
        P: Fn(&Row) -> bool,
    {
        self.check_alive()?;
        let mut state = self.lock_write();
        let before = state.rows.len();
        let kept: Vec<Row> = state.rows.iter().filter(|row| !predicate(row)).cloned().collect();
        let deleted = before - kept.len();
        if deleted == 0 {
            return Ok(0);
        }

        match index::rebuild(&self.schema, &kept) {
            Ok(indexes) => {
                state.rows = kept;
                state.indexes = indexes;
                state.dirty = true;
                Ok(deleted)
            }
            Err(err) => {
                state.rows = kept;
                drop(state);
                self.poison();
                Err(err)
            }
        }
    }

    pub fn select_all(&self) -> Vec<Row> {
        self.state.read().rows.clone()
    }

    pub fn select_where<P>(&self, predicate: P) -> Vec<Row>
    where
        P: Fn(&Row) -> bool,
    {
        self.state.read().rows.iter().filter(|row| predicate(row)).cloned().collect()
    }

    /// Looks up a single row by a unique index's value. Coerces a plain
    /// whole-float lookup value to `Integer` first, matching how the
    /// column itself would have been normalized on insert.
    pub fn select_by_unique_index(&self, column: &str, value: &Value) -> Option<Row> {
        let value = match value {
            Value::Float(v) if *v == v.trunc() && v.is_finite() => Value::Integer(*v as i64),
            other => other.clone(),
        };
        let state = self.state.read();
        let idx = state.indexes.get(column)?;
        if !idx.unique {
            return None;
        }
        let pos = idx.first(&value)?;
        state.rows.get(pos).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::value::ValueType;

    fn users_table() -> Table {
        let schema = Schema::new(
            "users",
            vec![
                Column::new("id", ValueType::Integer).auto_increment(),
                Column::new("name", ValueType::Text).not_null(),
            ],
        );
        Table::open(schema)
    }

    fn row(name: &str) -> Row {
        let mut r = Row::new();
        r.set("name", Value::Text(name.into()));
        r
    }

    #[test]
    fn auto_increment_basic_scenario() {
        let table = users_table();

        let a = table.insert(row("A"), None).unwrap();
        assert_eq!(a.get("id"), Some(&Value::Integer(1)));
        assert!(table.is_dirty());

        let b = table.insert(row("B"), None).unwrap();
        assert_eq!(b.get("id"), Some(&Value::Integer(2)));

        let mut with_id = row("C");
        with_id.set("id", Value::Integer(2));
        let err = table.insert(with_id, None).unwrap_err();
        assert!(matches!(err, Error::Constraint(e) if e.kind == ConstraintKind::AutoIncrement));

        let mut with_gap = row("D");
        with_gap.set("id", Value::Integer(5));
        let d = table.insert(with_gap, None).unwrap();
        assert_eq!(d.get("id"), Some(&Value::Integer(5)));
        assert_eq!(table.last_insert_id(), 5);

        let e = table.insert(row("E"), None).unwrap();
        assert_eq!(e.get("id"), Some(&Value::Integer(6)));
    }

    #[test]
    fn unique_violation_on_update_leaves_row_and_index_unchanged() {
        let schema = Schema::new(
            "users",
            vec![
                Column::new("id", ValueType::Integer).auto_increment(),
                Column::new("email", ValueType::Email).unique(),
            ],
        );
        let table = Table::open(schema);

        let mut r1 = Row::new();
        r1.set("email", Value::Email("a@example.com".into()));
        table.insert(r1, None).unwrap();

        let mut r2 = Row::new();
        r2.set("email", Value::Email("b@example.com".into()));
        table.insert(r2, None).unwrap();

        let mut updates = Row::new();
        updates.set("email", Value::Email("a@example.com".into()));
        let err = table.update(|row| row.get("id") == Some(&Value::Integer(2)), &updates, None).unwrap_err();
        assert!(matches!(err, Error::Constraint(e) if e.kind == ConstraintKind::Unique));

        let still = table.select_by_unique_index("id", &Value::Integer(2)).unwrap();
        assert_eq!(still.get("email"), Some(&Value::Email("b@example.com".into())));
    }

    #[test]
    fn delete_then_select_by_unique_index_reflects_shifted_positions() {
        let table = users_table();
        for name in ["A", "B", "C"] {
            table.insert(row(name), None).unwrap();
        }
        let deleted = table.delete(|r| r.get("id") == Some(&Value::Integer(2))).unwrap();
        assert_eq!(deleted, 1);

        let third = table.select_by_unique_index("id", &Value::Integer(3)).unwrap();
        assert_eq!(third.get("name"), Some(&Value::Text("C".into())));
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn select_on_empty_predicate_match_is_a_no_op() {
        let table = users_table();
        table.insert(row("A"), None).unwrap();
        let deleted = table.delete(|r| r.get("id") == Some(&Value::Integer(99))).unwrap();
        assert_eq!(deleted, 0);
        assert!(!table.is_dirty());
    }

    #[test]
    fn insert_deep_copies_so_caller_mutation_does_not_alias_storage() {
        let table = users_table();
        let mut input = row("A");
        table.insert(input.clone(), None).unwrap();
        input.set("name", Value::Text("mutated".into()));
        let stored = table.select_by_unique_index("id", &Value::Integer(1)).unwrap();
        assert_eq!(stored.get("name"), Some(&Value::Text("A".into())));
    }
}
