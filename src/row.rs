// Copyright (c) 2025 Table Engine Contributors
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;

use crate::value::Value;

/// A mapping from column name to [`Value`].
///
/// A missing key denotes `NULL`; a present key holding [`Value::Null`] is
/// a distinguishable but equivalent case for `not_null` validation (see
/// [`crate::validate`]). Rows are always deep-copied on ingress and on
/// `SELECT` output so stored state never aliases a caller's data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row(IndexMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Row(IndexMap::new())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.0.insert(column.into(), value);
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.shift_remove(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `self` overlaid with `updates`: every key in `updates` replaces the
    /// corresponding key in `self`, everything else in `self` is kept.
    pub fn merged(&self, updates: &Row) -> Row {
        let mut out = self.clone();
        for (k, v) in updates.iter() {
            out.set(k, v.clone());
        }
        out
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Row(IndexMap::from_iter(iter))
    }
}
