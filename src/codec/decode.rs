//! Decoding: JSON text -> DynamicValue

use serde_json::Value as JsonValue;

use crate::error::DecodeError;
use crate::value::{DynamicValue, Table};

/// Decode JSON bytes into a value
pub fn decode(bytes: &[u8]) -> Result<DynamicValue, DecodeError> {
    let json: JsonValue = serde_json::from_slice(bytes)?;
    Ok(from_json(json))
}

/// Decode JSON text into a value
pub fn decode_str(text: &str) -> Result<DynamicValue, DecodeError> {
    decode(text.as_bytes())
}

/// Convert a `serde_json::Value` tree into a value.
///
/// Arrays become 1-based tables and objects string-keyed tables. A `null`
/// element leaves its key absent.
pub fn from_json(json: JsonValue) -> DynamicValue {
    match json {
        JsonValue::Null => DynamicValue::Nil,
        JsonValue::Bool(b) => DynamicValue::Bool(b),
        JsonValue::Number(n) => n.as_f64().map(DynamicValue::Number).unwrap_or_default(),
        JsonValue::String(s) => DynamicValue::String(s),
        JsonValue::Array(items) => {
            let mut table = Table::new();
            for (i, item) in items.into_iter().enumerate() {
                table.set_index(i + 1, from_json(item));
            }
            DynamicValue::table(table)
        }
        JsonValue::Object(entries) => {
            let mut table = Table::new();
            for (key, item) in entries {
                table.set_field(&key, from_json(item));
            }
            DynamicValue::table(table)
        }
    }
}
