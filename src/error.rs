// Copyright (c) 2025 Table Engine Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::value::Value;

/// The kind of constraint a write violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    NotNull,
    TypeMismatch,
    Unique,
    PrimaryKey,
    AutoIncrement,
    InvalidEmail,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConstraintKind::NotNull => "not_null",
            ConstraintKind::TypeMismatch => "type_mismatch",
            ConstraintKind::Unique => "unique",
            ConstraintKind::PrimaryKey => "primary_key",
            ConstraintKind::AutoIncrement => "auto_increment",
            ConstraintKind::InvalidEmail => "invalid_email",
        };
        f.write_str(s)
    }
}

/// A validation or constraint failure on a specific table/column/value.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintError {
    pub table: String,
    pub column: String,
    pub value: Option<Value>,
    pub kind: ConstraintKind,
    pub reason: String,
    pub row_index: Option<usize>,
}

impl std::fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}: {} ({})",
            self.table, self.column, self.reason, self.kind
        )
    }
}

impl std::error::Error for ConstraintError {}

/// Which side of a join named a column that doesn't exist in its schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinSide {
    Left,
    Right,
}

impl std::fmt::Display for JoinSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinSide::Left => f.write_str("left"),
            JoinSide::Right => f.write_str("right"),
        }
    }
}

/// The error type returned by every fallible operation in this crate.
#[derive(Clone, Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    #[error("column `{column}` not found in table `{table}`")]
    ColumnNotFound { table: String, column: String },

    #[error("{side} side of join is missing column `{column}` in table `{table}`")]
    JoinCondition {
        side: JoinSide,
        table: String,
        column: String,
    },

    /// The table's indexes were left inconsistent by a failed rebuild
    /// (see `Table::delete`) and the table now rejects all operations.
    #[error("table `{table}` is poisoned after a failed index rebuild")]
    Poisoned { table: String },
}

impl Error {
    pub fn constraint(
        table: impl Into<String>,
        column: impl Into<String>,
        value: Option<Value>,
        kind: ConstraintKind,
        reason: impl Into<String>,
        row_index: Option<usize>,
    ) -> Self {
        Error::Constraint(ConstraintError {
            table: table.into(),
            column: column.into(),
            value,
            kind,
            reason: reason.into(),
            row_index,
        })
    }
}
