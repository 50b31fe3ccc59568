//! Value Codec Module
//!
//! Canonical JSON mapping between [`DynamicValue`]s and bytes. Pure, no I/O.
//!
//! ## Table Classification
//! ```text
//!   first key    ──►  wire shape
//!   ─────────────────────────────────────────────
//!   (none)            []
//!   number            [v1, v2, ... vN]   keys must be exactly 1..N
//!   string            {"k": v, ...}      every key must be a string
//!   anything else     InvalidKeyType
//! ```
//!
//! Objects are written with their keys in sorted order, so equal tables
//! always encode to equal bytes and can be used as store keys.

mod decode;
mod encode;

pub use decode::{decode, decode_str, from_json};
pub use encode::{encode, encode_to_string, to_json};

use crate::value::DynamicValue;

/// Encode then decode; the result is structurally equal to the input for
/// every encodable value.
pub fn round_trip(value: &DynamicValue) -> crate::Result<DynamicValue> {
    let bytes = encode(value)?;
    Ok(decode(&bytes)?)
}
