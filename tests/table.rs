// Copyright (c) 2025 Table Engine Contributors
// SPDX-License-Identifier: Apache-2.0

//! Round-trip and algebraic-law tests for [`tablekit::Table`]: the
//! properties that must hold across an INSERT/UPDATE/DELETE/SELECT
//! sequence regardless of how any single operation is implemented.

use tablekit::{Column, Row, Schema, Table, Value, ValueType};

fn users_schema() -> Schema {
    Schema::new(
        "users",
        vec![
            Column::new("id", ValueType::Integer).auto_increment(),
            Column::new("email", ValueType::Email).unique(),
            Column::new("name", ValueType::Text).not_null(),
        ],
    )
}

fn row(email: &str, name: &str) -> Row {
    let mut r = Row::new();
    r.set("email", Value::Email(email.into()));
    r.set("name", Value::Text(name.into()));
    r
}

#[test]
fn insert_then_select_by_pk_returns_the_row_with_auto_inc_set() {
    let table = Table::open(users_schema());
    let inserted = table.insert(row("a@example.com", "A"), None).unwrap();

    let selected = table.select_by_unique_index("id", inserted.get("id").unwrap()).unwrap();
    assert_eq!(selected, inserted);
    assert_eq!(selected.get("id"), Some(&Value::Integer(1)));
}

#[test]
fn update_then_select_returns_rows_matching_the_update() {
    let table = Table::open(users_schema());
    table.insert(row("a@example.com", "A"), None).unwrap();
    table.insert(row("b@example.com", "B"), None).unwrap();

    let mut updates = Row::new();
    updates.set("name", Value::Text("Renamed".into()));
    let changed = table.update(|r| r.get("email") == Some(&Value::Email("a@example.com".into())), &updates, None).unwrap();
    assert_eq!(changed, 1);

    let matching = table.select_where(|r| r.get("name") == Some(&Value::Text("Renamed".into())));
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].get("email"), Some(&Value::Email("a@example.com".into())));
}

#[test]
fn delete_then_select_by_predicate_is_empty() {
    let table = Table::open(users_schema());
    table.insert(row("a@example.com", "A"), None).unwrap();

    let deleted = table.delete(|r| r.get("email") == Some(&Value::Email("a@example.com".into())));
    assert_eq!(deleted.unwrap(), 1);

    let remaining = table.select_where(|r| r.get("email") == Some(&Value::Email("a@example.com".into())));
    assert!(remaining.is_empty());
}

#[test]
fn last_insert_id_tracks_insert_count_without_intervening_deletes() {
    let table = Table::open(users_schema());
    for i in 0..5 {
        table.insert(row(&format!("u{i}@example.com"), "U"), None).unwrap();
    }
    assert_eq!(table.last_insert_id(), 5);
    assert_eq!(table.row_count(), 5);
}

#[test]
fn auto_increment_basic_scenario_end_to_end() {
    let schema = Schema::new(
        "t",
        vec![
            Column::new("id", ValueType::Integer).auto_increment(),
            Column::new("name", ValueType::Text).not_null(),
        ],
    );
    let table = Table::open(schema);

    let mut a = Row::new();
    a.set("name", Value::Text("A".into()));
    assert_eq!(table.insert(a, None).unwrap().get("id"), Some(&Value::Integer(1)));

    let mut b = Row::new();
    b.set("name", Value::Text("B".into()));
    assert_eq!(table.insert(b, None).unwrap().get("id"), Some(&Value::Integer(2)));

    let mut dup = Row::new();
    dup.set("id", Value::Integer(2));
    dup.set("name", Value::Text("C".into()));
    assert!(table.insert(dup, None).is_err());

    let mut gap = Row::new();
    gap.set("id", Value::Integer(5));
    gap.set("name", Value::Text("D".into()));
    assert_eq!(table.insert(gap, None).unwrap().get("id"), Some(&Value::Integer(5)));
    assert_eq!(table.last_insert_id(), 5);

    let mut e = Row::new();
    e.set("name", Value::Text("E".into()));
    assert_eq!(table.insert(e, None).unwrap().get("id"), Some(&Value::Integer(6)));
}

#[test]
fn delete_reindexes_so_unique_lookup_reflects_shifted_positions() {
    let schema = Schema::new("t", vec![Column::new("id", ValueType::Integer).auto_increment()]);
    let table = Table::open(schema);
    for _ in 0..3 {
        table.insert(Row::new(), None).unwrap();
    }
    table.delete(|r| r.get("id") == Some(&Value::Integer(2))).unwrap();

    let third = table.select_by_unique_index("id", &Value::Integer(3)).unwrap();
    assert_eq!(third.get("id"), Some(&Value::Integer(3)));
    assert_eq!(table.row_count(), 2);
}

#[test]
fn integer_coercion_accepts_whole_float_and_rejects_fractional() {
    let schema = Schema::new("t", vec![Column::new("age", ValueType::Integer)]);
    let table = Table::open(schema);

    let mut whole = Row::new();
    whole.set("age", Value::Float(30.0));
    let stored = table.insert(whole, None).unwrap();
    assert_eq!(stored.get("age"), Some(&Value::Integer(30)));

    let mut fractional = Row::new();
    fractional.set("age", Value::Float(30.5));
    assert!(table.insert(fractional, None).is_err());
}
