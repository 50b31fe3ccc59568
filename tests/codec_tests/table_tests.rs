//! Tests for Table and DynamicValue
//!
//! These tests verify:
//! - Sequence part and hash part bookkeeping
//! - Nil assignment removes keys and splits sequences
//! - Enumeration order
//! - Structural equality and identity
//! - Scalar rendering

use persistbridge::value::{format_number, DynamicValue, Table, TableKey};

// =============================================================================
// Sequence Tests
// =============================================================================

#[test]
fn test_new_table_is_empty() {
    let table = Table::new();
    assert!(table.is_empty());
    assert_eq!(table.len(), 0);
    assert_eq!(table.first_key(), None);
}

#[test]
fn test_push_builds_sequence() {
    let mut table = Table::new();
    table.push(DynamicValue::from("a"));
    table.push(DynamicValue::from("b"));

    assert_eq!(table.len(), 2);
    assert_eq!(table.get_index(2), DynamicValue::from("b"));
    assert_eq!(table.first_key(), Some(TableKey::Number(1.0)));
}

#[test]
fn test_out_of_order_indices_migrate_into_sequence() {
    let mut table = Table::new();
    table.set_index(3, DynamicValue::from(3));
    table.set_index(2, DynamicValue::from(2));
    assert_eq!(table.len(), 0);

    table.set_index(1, DynamicValue::from(1));
    assert_eq!(table.len(), 3);
    assert_eq!(table.entry_count(), 3);
}

#[test]
fn test_nil_in_middle_splits_sequence() {
    let mut table = Table::from_array((1..=4).map(|i: i32| DynamicValue::from(i)));
    table.set_index(2, DynamicValue::Nil);

    assert_eq!(table.len(), 1);
    assert_eq!(table.entry_count(), 3);
    assert_eq!(table.get_index(3), DynamicValue::from(3));
    assert_eq!(table.get_index(2), DynamicValue::Nil);
}

#[test]
fn test_from_array_with_nil_leaves_hole() {
    let table = Table::from_array([
        DynamicValue::from("a"),
        DynamicValue::Nil,
        DynamicValue::from("c"),
    ]);

    assert_eq!(table.len(), 1);
    assert_eq!(table.get_index(3), DynamicValue::from("c"));
}

// =============================================================================
// Hash Part Tests
// =============================================================================

#[test]
fn test_fields_set_get_and_remove() {
    let mut table = Table::new();
    table.set_field("a", DynamicValue::from(1));
    table.set_field("b", DynamicValue::from(2));
    table.set_field("a", DynamicValue::from(10));

    assert_eq!(table.get_field("a"), DynamicValue::from(10));
    assert_eq!(table.entry_count(), 2);

    table.set_field("a", DynamicValue::Nil);
    assert_eq!(table.get_field("a"), DynamicValue::Nil);
    assert_eq!(table.entry_count(), 1);
    assert_eq!(table.get_field("b"), DynamicValue::from(2));
}

#[test]
fn test_enumeration_sequence_first_then_insertion_order() {
    let mut table = Table::new();
    table.set_field("z", DynamicValue::from(1));
    table.set_index(1, DynamicValue::from("one"));
    table.set_field("a", DynamicValue::from(2));

    let keys: Vec<TableKey> = table.iter().map(|(key, _)| key).collect();
    assert_eq!(
        keys,
        vec![TableKey::Number(1.0), TableKey::from("z"), TableKey::from("a")]
    );
}

#[test]
fn test_table_keys_compare_by_identity() {
    let key_table = Table::new().into_ref();
    let mut table = Table::new();
    table.set(TableKey::Table(key_table.clone()), DynamicValue::from("hit"));

    assert_eq!(
        table.get(&TableKey::Table(key_table)),
        DynamicValue::from("hit")
    );
    assert_eq!(
        table.get(&TableKey::Table(Table::new().into_ref())),
        DynamicValue::Nil
    );
}

#[test]
fn test_nil_and_nan_are_not_keys() {
    assert!(TableKey::from_value(&DynamicValue::Nil).is_none());
    assert!(TableKey::from_value(&DynamicValue::Number(f64::NAN)).is_none());
    assert!(TableKey::from_value(&DynamicValue::from("k")).is_some());
}

// =============================================================================
// Equality and Rendering Tests
// =============================================================================

#[test]
fn test_structural_equality_ignores_insertion_order() {
    let a = DynamicValue::object([("x", DynamicValue::from(1)), ("y", DynamicValue::from(2))]);
    let b = DynamicValue::object([("y", DynamicValue::from(2)), ("x", DynamicValue::from(1))]);
    let c = DynamicValue::object([("x", DynamicValue::from(1))]);

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_type_names() {
    assert_eq!(DynamicValue::Nil.type_name(), "nil");
    assert_eq!(DynamicValue::from(true).type_name(), "boolean");
    assert_eq!(DynamicValue::from(1.5).type_name(), "number");
    assert_eq!(DynamicValue::from("s").type_name(), "string");
    assert_eq!(DynamicValue::table(Table::new()).type_name(), "table");
}

#[test]
fn test_format_number() {
    assert_eq!(format_number(3.0), "3");
    assert_eq!(format_number(-0.5), "-0.5");
    assert_eq!(format_number(f64::INFINITY), "inf");
    assert_eq!(format_number(f64::NEG_INFINITY), "-inf");
    assert_eq!(format_number(f64::NAN), "nan");
}

#[test]
fn test_scalar_string() {
    assert_eq!(DynamicValue::from(12).to_scalar_string().as_deref(), Some("12"));
    assert_eq!(DynamicValue::from("x").to_scalar_string().as_deref(), Some("x"));
    assert_eq!(DynamicValue::Bool(true).to_scalar_string(), None);
}
