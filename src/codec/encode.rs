//! Encoding: DynamicValue -> JSON text

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use serde_json::{Map, Number, Value as JsonValue};

use crate::error::EncodeError;
use crate::value::{DynamicValue, Table, TableKey, TableRef};

/// Largest magnitude at which every integer is exactly representable in an f64
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Encode a value to JSON bytes
pub fn encode(value: &DynamicValue) -> Result<Vec<u8>, EncodeError> {
    Ok(encode_to_string(value)?.into_bytes())
}

/// Encode a value to JSON text
pub fn encode_to_string(value: &DynamicValue) -> Result<String, EncodeError> {
    Ok(to_json(value)?.to_string())
}

/// Convert a value to a `serde_json::Value` tree
pub fn to_json(value: &DynamicValue) -> Result<JsonValue, EncodeError> {
    Encoder::default().value(value)
}

/// One encode call. `visiting` holds the tables on the current path from the
/// root; a table is removed again once its subtree is done, so a table shared
/// by two siblings is fine and only a true cycle is rejected.
#[derive(Default)]
struct Encoder {
    visiting: HashSet<*const RefCell<Table>>,
}

impl Encoder {
    fn value(&mut self, value: &DynamicValue) -> Result<JsonValue, EncodeError> {
        match value {
            DynamicValue::Nil => Ok(JsonValue::Null),
            DynamicValue::Bool(b) => Ok(JsonValue::Bool(*b)),
            DynamicValue::Number(n) => number(*n),
            DynamicValue::String(s) => Ok(JsonValue::String(s.clone())),
            DynamicValue::Table(t) => self.table(t),
            DynamicValue::Handle(_) | DynamicValue::Function(_) => {
                Err(EncodeError::UnsupportedType(value.type_name()))
            }
        }
    }

    fn table(&mut self, table: &TableRef) -> Result<JsonValue, EncodeError> {
        let id = Rc::as_ptr(table);
        if !self.visiting.insert(id) {
            return Err(EncodeError::Cycle);
        }
        let result = self.table_entries(&table.borrow());
        self.visiting.remove(&id);
        result
    }

    fn table_entries(&mut self, table: &Table) -> Result<JsonValue, EncodeError> {
        let first = match table.first_key() {
            Some(key) => key,
            None => return Ok(JsonValue::Array(Vec::new())),
        };

        // Keys are validated for the whole table before any value is encoded
        match first {
            TableKey::Number(_) => {
                let mut expected = 1.0;
                for (key, _) in table.iter() {
                    match key {
                        TableKey::Number(found) if found == expected => expected += 1.0,
                        TableKey::Number(found) => {
                            return Err(EncodeError::SparseArray { expected, found })
                        }
                        other => return Err(EncodeError::InvalidKeyType(other.type_name())),
                    }
                }

                let mut items = Vec::with_capacity(table.entry_count());
                for (_, value) in table.iter() {
                    items.push(self.value(value)?);
                }
                Ok(JsonValue::Array(items))
            }
            TableKey::String(_) => {
                if let Some((key, _)) = table.iter().find(|(key, _)| !matches!(key, TableKey::String(_))) {
                    return Err(EncodeError::InvalidKeyType(key.type_name()));
                }

                let mut object = Map::new();
                for (key, value) in table.iter() {
                    if let TableKey::String(name) = key {
                        object.insert(name, self.value(value)?);
                    }
                }
                Ok(JsonValue::Object(object))
            }
            other => Err(EncodeError::InvalidKeyType(other.type_name())),
        }
    }
}

/// Integral numbers are written as integers (`1`, not `1.0`)
fn number(n: f64) -> Result<JsonValue, EncodeError> {
    if !n.is_finite() {
        return Err(EncodeError::NonFiniteNumber(n));
    }
    if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        return Ok(JsonValue::Number(Number::from(n as i64)));
    }
    Number::from_f64(n)
        .map(JsonValue::Number)
        .ok_or(EncodeError::NonFiniteNumber(n))
}
