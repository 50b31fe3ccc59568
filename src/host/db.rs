//! `db` library and store, batch, iterator methods

use super::{fail, ok, Args, Handle, Returns, ScriptContext};
use crate::error::{BridgeError, Result, StoreError};
use crate::value::DynamicValue;

/// `db.open(path)`: a store handle. Repeat opens share the backend.
pub(super) fn open(ctx: &mut ScriptContext, args: &Args<'_>) -> Result<Returns> {
    let path = args.check_string(1)?;
    let store = ctx.stores.open(&path)?;
    Ok(ok(Handle::store(store)))
}

fn unknown(method: &str) -> BridgeError {
    BridgeError::Script(format!("attempt to call a nil value (method '{}')", method))
}

/// Optional iterator bound: Nil or absent means unbounded
fn bound<'a>(args: &'a Args<'_>, pos: usize) -> Option<&'a DynamicValue> {
    match args.get(pos) {
        DynamicValue::Nil => None,
        value => Some(value),
    }
}

// =============================================================================
// Store
// =============================================================================

pub(super) fn store_method(method: &str, args: &Args<'_>) -> Result<Returns> {
    let store = args.check_store(1)?;
    match method {
        "get" => {
            let key = args.check_any(2).map_err(|_| args.error(2, "miss key"))?;
            match store.get(key) {
                Ok(value) => Ok(ok(value)),
                Err(e @ StoreError::NotFound) => Ok(fail(e)),
                Err(e) => Err(e.into()),
            }
        }
        "put" => {
            if args.len() < 3 {
                return Err(args.error(2, "miss key or value"));
            }
            store.put(args.get(2), args.get(3))?;
            Ok(ok(true))
        }
        "has" => {
            let key = args.check_any(2).map_err(|_| args.error(2, "miss key"))?;
            Ok(ok(store.has(key)?))
        }
        "delete" => {
            let key = args.check_any(2).map_err(|_| args.error(2, "miss key"))?;
            store.delete(key)?;
            Ok(ok(true))
        }
        "write" => {
            let batch = args.check_batch(2)?;
            store.write(&batch.borrow())?;
            Ok(ok(true))
        }
        "close" => match store.close() {
            Ok(()) => Ok(ok(true)),
            Err(StoreError::Closed) => Ok(ok(false)),
            Err(e) => Err(e.into()),
        },
        "newBatch" => Ok(ok(Handle::batch(store.new_batch()?))),
        "newIterator" => {
            let iterator = store.new_iterator(bound(args, 2), bound(args, 3))?;
            Ok(ok(Handle::iterator(iterator)))
        }
        other => Err(unknown(other)),
    }
}

// =============================================================================
// Batch
// =============================================================================

pub(super) fn batch_method(method: &str, args: &Args<'_>) -> Result<Returns> {
    let batch = args.check_batch(1)?;
    match method {
        "put" => {
            if args.len() < 3 {
                return Err(args.error(2, "miss key or value"));
            }
            batch.borrow_mut().put(args.get(2), args.get(3))?;
            Ok(ok(true))
        }
        "delete" => {
            let key = args.check_any(2).map_err(|_| args.error(2, "miss key"))?;
            batch.borrow_mut().delete(key)?;
            Ok(ok(true))
        }
        "len" => Ok(ok(batch.borrow().len())),
        "reset" => {
            batch.borrow_mut().reset();
            Ok(ok(true))
        }
        "write" => {
            batch.borrow().write()?;
            Ok(ok(true))
        }
        other => Err(unknown(other)),
    }
}

// =============================================================================
// Iterator
// =============================================================================

pub(super) fn iterator_method(method: &str, args: &Args<'_>) -> Result<Returns> {
    let iterator = args.check_iterator(1)?;
    match method {
        "valid" => Ok(ok(iterator.borrow().valid())),
        "first" => Ok(ok(iterator.borrow_mut().first())),
        "last" => Ok(ok(iterator.borrow_mut().last())),
        "next" => Ok(ok(iterator.borrow_mut().next())),
        "prev" => Ok(ok(iterator.borrow_mut().prev())),
        "seek" => {
            let key = args.check_any(2)?;
            Ok(ok(iterator.borrow_mut().seek(key)?))
        }
        "key" => Ok(ok(iterator.borrow().key()?)),
        "value" => Ok(ok(iterator.borrow().value()?)),
        "error" => {
            let error = iterator.borrow().error().map(|e| e.to_string());
            Ok(ok(error.map(DynamicValue::from).unwrap_or_default()))
        }
        "release" => {
            iterator.borrow_mut().release();
            Ok(Vec::new())
        }
        other => Err(unknown(other)),
    }
}
