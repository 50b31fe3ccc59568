//! `json` library
//!
//! Codec failures are returned as `nil, message` rather than raised.

use super::{fail, ok, Args, Returns};
use crate::codec;
use crate::error::Result;

/// `json.encode(v)`: JSON text or `nil, message`
pub(super) fn encode(args: &Args<'_>) -> Result<Returns> {
    let value = args.check_any(1)?;
    match codec::encode_to_string(value) {
        Ok(text) => Ok(ok(text)),
        Err(e) => Ok(fail(e)),
    }
}

/// `json.decode(s)`: a value or `nil, message`
pub(super) fn decode(args: &Args<'_>) -> Result<Returns> {
    let text = args.check_string(1)?;
    match codec::decode_str(&text) {
        Ok(value) => Ok(ok(value)),
        Err(e) => Ok(fail(e)),
    }
}
