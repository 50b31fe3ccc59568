//! Calling script globals from the embedder

use tracing::trace;

use super::ScriptContext;
use crate::codec;
use crate::error::{BridgeError, Result};
use crate::value::DynamicValue;

pub(super) fn perform_global(ctx: &ScriptContext, name: &str, args: &[&str]) -> Result<String> {
    let function = match ctx.global(name) {
        DynamicValue::Function(function) => function,
        value => return Ok(codec::encode_to_string(&value)?),
    };

    let params: Vec<DynamicValue> = args.iter().map(|arg| DynamicValue::from(*arg)).collect();
    let returns = function.call(&params).map_err(BridgeError::Script)?;
    trace!(global = name, returns = returns.len(), "performed global");

    let encoded = returns
        .iter()
        .map(codec::encode_to_string)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(encoded.join(","))
}
