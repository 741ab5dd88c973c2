// Copyright (c) 2025 Table Engine Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::value::ValueType;

/// The declared type of a column. An alias rather than a distinct type:
/// a column's type is exactly a [`ValueType`] tag, nothing more.
pub type ColumnType = ValueType;

/// A column definition within a [`super::Schema`].
///
/// Constraints enforced by the schema builder (not by this struct, which
/// is a plain data holder): at most one column per table has
/// `primary_key = true`; `auto_increment` implies `primary_key` and
/// `column_type == ValueType::Integer`; `unique` is enforced through the
/// table's [`crate::Index`], not here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub unique: bool,
    pub not_null: bool,
    pub auto_increment: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Column {
            name: name.into(),
            column_type,
            primary_key: false,
            unique: false,
            not_null: false,
            auto_increment: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self.primary_key = true;
        self.not_null = true;
        self
    }

    /// `true` iff this column must be covered by a unique [`crate::Index`]
    /// (a primary key is unique by definition).
    pub fn is_uniquely_indexed(&self) -> bool {
        self.primary_key || self.unique
    }
}
