// Copyright (c) 2025 Table Engine Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

pub use column::{Column, ColumnType};

mod column;

/// An ordered sequence of [`Column`]s plus the owning table's name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub table_name: String,
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(table_name: impl Into<String>, columns: Vec<Column>) -> Self {
        Schema { table_name: table_name.into(), columns }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.primary_key)
    }

    pub fn auto_increment_primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.auto_increment)
    }

    pub fn unique_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_uniquely_indexed())
    }
}
