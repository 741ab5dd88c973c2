// Copyright (c) 2025 Table Engine Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::instrument;

use crate::error::{ConstraintKind, Error};
use crate::row::Row;
use crate::schema::{Column, Schema};
use crate::value::{Value, ValueType};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("static email regex is valid")
});

/// Validates `row` against `schema`, mutating `row` in place to normalize
/// coercible values (whole floats into integers for `Integer` columns,
/// parseable text into `Date`/`Time` values for temporal columns).
///
/// Idempotent: running `validate` again on an already-normalized row is a
/// no-op that returns `Ok`, because every coercion target is also an
/// accepted input for its own column type (I5 in the design notes).
#[instrument(level = "trace", skip(row, schema), fields(table = %schema.table_name))]
pub fn validate(row: &mut Row, schema: &Schema) -> crate::Result<()> {
    for column in &schema.columns {
        validate_column(row, schema, column)?;
    }
    Ok(())
}

fn validate_column(row: &mut Row, schema: &Schema, column: &Column) -> crate::Result<()> {
    let present = row.contains(&column.name);
    let is_null = matches!(row.get(&column.name), Some(Value::Null));

    if (!present || is_null) && column.not_null {
        return Err(Error::constraint(
            &schema.table_name,
            &column.name,
            None,
            ConstraintKind::NotNull,
            "required column is missing",
            None,
        ));
    }

    if !present || is_null {
        return Ok(());
    }

    match column.column_type {
        ValueType::Text | ValueType::Bool | ValueType::Email => validate_exact_tag(row, schema, column),
        ValueType::Integer => validate_integer(row, schema, column),
        ValueType::Float => validate_float(row, schema, column),
        ValueType::Date => validate_date(row, schema, column),
        ValueType::Time => validate_time(row, schema, column),
        ValueType::Null => Ok(()),
    }
}

fn type_mismatch(schema: &Schema, column: &Column, value: &Value, reason: impl Into<String>) -> Error {
    Error::constraint(
        &schema.table_name,
        &column.name,
        Some(value.clone()),
        ConstraintKind::TypeMismatch,
        reason,
        None,
    )
}

fn validate_exact_tag(row: &mut Row, schema: &Schema, column: &Column) -> crate::Result<()> {
    let value = row.get(&column.name).expect("presence checked by caller").clone();
    if value.value_type() != column.column_type {
        return Err(type_mismatch(
            schema,
            column,
            &value,
            format!("expected {}, got {}", column.column_type, value.value_type()),
        ));
    }
    if column.column_type == ValueType::Email {
        let Value::Email(address) = &value else { unreachable!() };
        if !EMAIL_RE.is_match(address) {
            return Err(Error::constraint(
                &schema.table_name,
                &column.name,
                Some(value),
                ConstraintKind::InvalidEmail,
                "does not match the email format",
                None,
            ));
        }
    }
    Ok(())
}

fn validate_integer(row: &mut Row, schema: &Schema, column: &Column) -> crate::Result<()> {
    let value = row.get(&column.name).expect("presence checked by caller").clone();
    match value {
        Value::Integer(_) => Ok(()),
        Value::Float(v) if v == v.trunc() && v.is_finite() => {
            row.set(&column.name, Value::Integer(v as i64));
            Ok(())
        }
        other => Err(type_mismatch(schema, column, &other, "expected a whole integer")),
    }
}

fn validate_float(row: &mut Row, schema: &Schema, column: &Column) -> crate::Result<()> {
    let value = row.get(&column.name).expect("presence checked by caller").clone();
    match value {
        Value::Float(_) if value.is_non_finite_float() => {
            Err(type_mismatch(schema, column, &value, "float must be finite (no NaN/Infinity)"))
        }
        Value::Float(_) => Ok(()),
        other => Err(type_mismatch(schema, column, &other, "expected a float")),
    }
}

fn validate_date(row: &mut Row, schema: &Schema, column: &Column) -> crate::Result<()> {
    let value = row.get(&column.name).expect("presence checked by caller").clone();
    match value {
        Value::Date(_) => Ok(()),
        Value::Text(ref text) => match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            Ok(date) => {
                row.set(&column.name, Value::Date(date));
                Ok(())
            }
            Err(_) => Err(type_mismatch(schema, column, &value, "expected YYYY-MM-DD")),
        },
        other => Err(type_mismatch(schema, column, &other, "expected a date")),
    }
}

fn validate_time(row: &mut Row, schema: &Schema, column: &Column) -> crate::Result<()> {
    let value = row.get(&column.name).expect("presence checked by caller").clone();
    match value {
        Value::Time(_) => Ok(()),
        Value::Text(ref text) => {
            if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                let instant = date.and_hms_opt(0, 0, 0).expect("midnight is always valid").and_utc();
                row.set(&column.name, Value::Time(instant));
                return Ok(());
            }
            match DateTime::parse_from_rfc3339(text) {
                Ok(instant) => {
                    row.set(&column.name, Value::Time(instant.with_timezone(&Utc)));
                    Ok(())
                }
                Err(_) => Err(type_mismatch(schema, column, &value, "expected YYYY-MM-DD or RFC-3339")),
            }
        }
        other => Err(type_mismatch(schema, column, &other, "expected a time")),
    }
}
