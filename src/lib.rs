// Copyright (c) 2025 Table Engine Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! An in-memory relational table engine.
//!
//! Provides a typed-row store with schema validation, secondary indexes
//! with unique/primary-key enforcement, auto-increment sequences, and
//! hash-join evaluation across tables. This crate is the storage/query
//! kernel only: it does not parse a query language, coordinate
//! transactions, or persist anything to disk. Those are the concern of
//! collaborators that sit on top of [`Table`].

pub use error::{ConstraintError, ConstraintKind, Error, JoinSide};
pub use index::Index;
pub use join::{JoinEngine, JoinKind, JoinedRow};
pub use projection::{ColumnRef, Projection};
pub use row::Row;
pub use schema::{Column, ColumnType, Schema};
pub use table::Table;
pub use transaction::Transaction;
pub use value::{Value, ValueType};

mod error;
mod index;
mod join;
mod projection;
mod row;
mod schema;
mod table;
mod transaction;
mod validate;
mod value;

pub type Result<T> = std::result::Result<T, Error>;
