// Copyright (c) 2025 Table Engine Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use indexmap::IndexMap;
use parking_lot::RwLockReadGuard;
use tracing::instrument;

use crate::error::{Error, JoinSide};
use crate::row::Row;
use crate::table::{Table, TableState};
use crate::value::Value;

/// Holds either one read guard (self-join, `left` and `right` are the
/// same table) or two (distinct tables, locked in canonical order).
enum Guards<'a> {
    Same(RwLockReadGuard<'a, TableState>),
    Pair(RwLockReadGuard<'a, TableState>, RwLockReadGuard<'a, TableState>),
}

impl<'a> Guards<'a> {
    fn left(&self) -> &TableState {
        match self {
            Guards::Same(g) => g,
            Guards::Pair(l, _) => l,
        }
    }

    fn right(&self) -> &TableState {
        match self {
            Guards::Same(g) => g,
            Guards::Pair(_, r) => r,
        }
    }
}

/// A row produced by a join: every key is a qualified `"table.column"`
/// name. [`Self::lookup`] also accepts a bare column name, falling back
/// to a scan for the first key suffixed by `.column` — callers that join
/// tables sharing a column name are expected to qualify instead of
/// relying on that fallback (see the crate-level join documentation).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JoinedRow(IndexMap<String, Value>);

impl JoinedRow {
    fn new() -> Self {
        JoinedRow(IndexMap::new())
    }

    fn set(&mut self, table: &str, column: &str, value: Value) {
        self.0.insert(format!("{table}.{column}"), value);
    }

    pub fn lookup(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.0.get(key) {
            return Some(value);
        }
        let suffix = format!(".{key}");
        self.0.iter().find(|(k, _)| k.ends_with(&suffix)).map(|(_, v)| v)
    }

    pub fn to_row(&self) -> Row {
        self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Which outer-join variant to evaluate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl std::fmt::Display for JoinKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JoinKind::Inner => "inner",
            JoinKind::Left => "left",
            JoinKind::Right => "right",
            JoinKind::Full => "full",
        };
        f.write_str(s)
    }
}

/// Hash-probe join driver. Builds (or reuses) a probe index on the right
/// table's join column, then emits joined rows in the contractual order:
/// inner matches in left-row order first, then unmatched-left rows (for
/// LEFT/FULL), then unmatched-right rows (for RIGHT/FULL). This ordering
/// is part of the public contract, not an implementation accident — see
/// spec §4.5 step 5 and §9.
pub struct JoinEngine;

impl JoinEngine {
    #[instrument(level = "debug", skip(left, right, predicate), fields(left = left.name(), right = right.name(), %kind))]
    pub fn join(
        left: &Table,
        right: &Table,
        left_col: &str,
        right_col: &str,
        kind: JoinKind,
        predicate: Option<&dyn Fn(&JoinedRow) -> bool>,
    ) -> crate::Result<Vec<JoinedRow>> {
        if left.schema().column(left_col).is_none() {
            return Err(Error::JoinCondition {
                side: JoinSide::Left,
                table: left.name().to_string(),
                column: left_col.to_string(),
            });
        }
        if right.schema().column(right_col).is_none() {
            return Err(Error::JoinCondition {
                side: JoinSide::Right,
                table: right.name().to_string(),
                column: right_col.to_string(),
            });
        }

        // Lock both tables in a total order (lexicographic by name) so two
        // concurrent joins over the same pair of tables can never deadlock.
        // A self-join (`left` and `right` are the same `Table`) is locked
        // exactly once instead: `parking_lot::RwLock` read locks aren't
        // reentrant against a queued writer, so acquiring the same table's
        // read lock twice in a row here could deadlock against a writer
        // that queues between the two acquisitions.
        let guards = if std::ptr::eq(left, right) {
            Guards::Same(left.lock_read())
        } else if left.name() <= right.name() {
            let l = left.lock_read();
            let r = right.lock_read();
            Guards::Pair(l, r)
        } else {
            let r = right.lock_read();
            let l = left.lock_read();
            Guards::Pair(l, r)
        };
        let left_state = guards.left();
        let right_state = guards.right();

        // Reuse the right table's existing index as the probe table when
        // one already covers the join column; its bucket semantics (unique
        // or not, insertion order) already match what a join needs. Only
        // build a transient map when no such index exists.
        let mut probe: HashMap<&Value, Vec<usize>> = HashMap::new();
        match right_state.indexes.get(right_col) {
            Some(existing) => {
                for (value, bucket) in existing.entries() {
                    probe.insert(value, bucket.to_vec());
                }
            }
            None => {
                for (pos, row) in right_state.rows.iter().enumerate() {
                    if let Some(value) = row.get(right_col) {
                        probe.entry(value).or_default().push(pos);
                    }
                }
            }
        }

        let mut out = Vec::new();
        let mut matched_left = vec![false; left_state.rows.len()];
        let mut matched_right = vec![false; right_state.rows.len()];

        for (lpos, lrow) in left_state.rows.iter().enumerate() {
            let Some(lvalue) = lrow.get(left_col) else { continue };
            let Some(bucket) = probe.get(lvalue) else { continue };
            for &rpos in bucket {
                let rrow = &right_state.rows[rpos];
                let joined = build_joined_row(left.name(), lrow, right.name(), rrow);
                if predicate.is_none_or(|p| p(&joined)) {
                    matched_left[lpos] = true;
                    matched_right[rpos] = true;
                    out.push(joined);
                }
            }
        }

        if matches!(kind, JoinKind::Left | JoinKind::Full) {
            for (lpos, lrow) in left_state.rows.iter().enumerate() {
                if matched_left[lpos] {
                    continue;
                }
                let joined = build_joined_row_null_right(left.name(), lrow, right.name(), right.schema().columns.iter().map(|c| c.name.as_str()));
                if predicate.is_none_or(|p| p(&joined)) {
                    out.push(joined);
                }
            }
        }

        if matches!(kind, JoinKind::Right | JoinKind::Full) {
            for (rpos, rrow) in right_state.rows.iter().enumerate() {
                if matched_right[rpos] {
                    continue;
                }
                let joined = build_joined_row_null_left(left.name(), left.schema().columns.iter().map(|c| c.name.as_str()), right.name(), rrow);
                if predicate.is_none_or(|p| p(&joined)) {
                    out.push(joined);
                }
            }
        }

        Ok(out)
    }
}

fn build_joined_row(left_table: &str, left_row: &Row, right_table: &str, right_row: &Row) -> JoinedRow {
    let mut joined = JoinedRow::new();
    for (col, value) in left_row.iter() {
        joined.set(left_table, col, value.clone());
    }
    for (col, value) in right_row.iter() {
        joined.set(right_table, col, value.clone());
    }
    joined
}

fn build_joined_row_null_right<'a>(
    left_table: &str,
    left_row: &Row,
    right_table: &str,
    right_columns: impl Iterator<Item = &'a str>,
) -> JoinedRow {
    let mut joined = JoinedRow::new();
    for (col, value) in left_row.iter() {
        joined.set(left_table, col, value.clone());
    }
    for col in right_columns {
        joined.set(right_table, col, Value::Null);
    }
    joined
}

fn build_joined_row_null_left<'a>(
    left_table: &str,
    left_columns: impl Iterator<Item = &'a str>,
    right_table: &str,
    right_row: &Row,
) -> JoinedRow {
    let mut joined = JoinedRow::new();
    for col in left_columns {
        joined.set(left_table, col, Value::Null);
    }
    for (col, value) in right_row.iter() {
        joined.set(right_table, col, value.clone());
    }
    joined
}
