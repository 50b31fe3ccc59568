//! Host Surface Module
//!
//! The call interface a scripting engine binds to: the `json`, `io` and `db`
//! libraries and the methods of the four handle kinds.
//!
//! ## Error policy
//! ```text
//!   contract violation (bad argument, wrong handle kind)  ──► Err(Argument)
//!   backend failure, closed handle, store codec failure   ──► Err(..)
//!   not found, EOF, permission mismatch, failed open,
//!   json.encode / json.decode failure                     ──► Ok([nil, msg(, 1)])
//! ```
//!
//! All state a script observes across calls (default input and output files,
//! open stores, globals) lives in one [`ScriptContext`].

mod db;
mod handle;
mod io;
mod json;
mod perform;

pub use handle::{Handle, HandleKind};

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use tracing::trace;

use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::store::{Batch, Store, StoreIterator, StoreRegistry};
use crate::tree::{FileTree, MemoryTree};
use crate::value::{format_number, DynamicValue};
use crate::vfile::VirtualFile;

/// Results of one host call
pub type Returns = Vec<DynamicValue>;

/// Per-script state threaded through every host call
pub struct ScriptContext {
    config: Config,
    tree: Arc<dyn FileTree>,
    stores: StoreRegistry,
    default_input: Option<Rc<RefCell<VirtualFile>>>,
    default_output: Option<Rc<RefCell<VirtualFile>>>,
    globals: HashMap<String, DynamicValue>,
}

impl ScriptContext {
    /// Create a context over `tree`. The namespace root directory is created
    /// if it does not exist yet.
    pub fn new(tree: Arc<dyn FileTree>, config: Config) -> Result<Self> {
        tree.ensure_dir(&config.namespace_root)?;
        Ok(Self {
            stores: StoreRegistry::new(Arc::clone(&tree), config.clone()),
            config,
            tree,
            default_input: None,
            default_output: None,
            globals: HashMap::new(),
        })
    }

    /// A context over a fresh in-memory tree with default configuration
    pub fn in_memory() -> Result<Self> {
        Self::new(Arc::new(MemoryTree::new()), Config::default())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tree(&self) -> &Arc<dyn FileTree> {
        &self.tree
    }

    // =========================================================================
    // Globals
    // =========================================================================

    pub fn set_global(&mut self, name: &str, value: impl Into<DynamicValue>) {
        self.globals.insert(name.to_string(), value.into());
    }

    /// A global's value; unset globals are Nil
    pub fn global(&self, name: &str) -> DynamicValue {
        self.globals.get(name).cloned().unwrap_or_default()
    }

    /// Call the global function `name` with string arguments and return the
    /// JSON of its results joined by `,`. A global that is not a function
    /// yields the JSON of its value.
    pub fn perform_global(&self, name: &str, args: &[&str]) -> Result<String> {
        perform::perform_global(self, name, args)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Call a library function, e.g. `call("io", "open", ...)`
    pub fn call(&mut self, library: &str, function: &str, args: &[DynamicValue]) -> Result<Returns> {
        let name = format!("{}.{}", library, function);
        trace!(function = %name, args = args.len(), "host call");
        let args = Args::new(&name, args);

        match (library, function) {
            ("json", "encode") => json::encode(&args),
            ("json", "decode") => json::decode(&args),

            ("io", "open") => io::open(self, &args),
            ("io", "close") => io::close(self, &args),
            ("io", "read") => io::read(self, &args),
            ("io", "write") => io::write(self, &args),
            ("io", "lines") => io::lines(self, &args),
            ("io", "input") => io::input(self, &args),
            ("io", "output") => io::output(self, &args),
            ("io", "type") => io::io_type(&args),

            ("db", "open") => db::open(self, &args),

            _ => Err(BridgeError::Script(format!(
                "attempt to call a nil value (field '{}')",
                name
            ))),
        }
    }

    /// Call a method on a handle, e.g. `call_method(&file, "read", ...)`.
    /// The receiver is argument #1.
    pub fn call_method(
        &mut self,
        receiver: &DynamicValue,
        method: &str,
        args: &[DynamicValue],
    ) -> Result<Returns> {
        let kind = match receiver {
            DynamicValue::Handle(handle) => handle.kind(),
            other => {
                return Err(BridgeError::argument(
                    method,
                    1,
                    format!("userdata expected, got {}", other.type_name()),
                ))
            }
        };
        if !kind.methods().contains(&method) {
            return Err(BridgeError::Script(format!(
                "attempt to call a nil value (method '{}' of {})",
                method, kind
            )));
        }

        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(receiver.clone());
        all.extend_from_slice(args);

        let name = format!("{}:{}", kind, method);
        trace!(function = %name, args = args.len(), "host method call");
        let args = Args::new(&name, &all);

        match kind {
            HandleKind::File => io::file_method(method, &args),
            HandleKind::Store => db::store_method(method, &args),
            HandleKind::Batch => db::batch_method(method, &args),
            HandleKind::Iterator => db::iterator_method(method, &args),
        }
    }

    /// Close every store still open
    pub fn shutdown(&mut self) {
        self.stores.close_all();
        self.default_input = None;
        self.default_output = None;
    }
}

// =============================================================================
// Argument checking
// =============================================================================

/// Positional arguments of one call. Positions are 1-based.
pub(crate) struct Args<'a> {
    function: &'a str,
    values: &'a [DynamicValue],
}

impl<'a> Args<'a> {
    fn new(function: &'a str, values: &'a [DynamicValue]) -> Self {
        Self { function, values }
    }

    pub fn function(&self) -> &str {
        self.function
    }

    /// Number of arguments passed
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Argument at `pos`, Nil when absent
    pub fn get(&self, pos: usize) -> &DynamicValue {
        const NIL: &DynamicValue = &DynamicValue::Nil;
        self.values.get(pos - 1).unwrap_or(NIL)
    }

    pub fn error(&self, pos: usize, message: impl Into<String>) -> BridgeError {
        BridgeError::argument(self.function, pos, message)
    }

    fn type_error(&self, pos: usize, expected: &str) -> BridgeError {
        self.error(pos, format!("{} expected, got {}", expected, self.get(pos).type_name()))
    }

    /// Any value, as long as the argument was passed
    pub fn check_any(&self, pos: usize) -> Result<&DynamicValue> {
        if pos > self.values.len() {
            return Err(self.error(pos, "value expected"));
        }
        Ok(self.get(pos))
    }

    /// A string; numbers are accepted and converted
    pub fn check_string(&self, pos: usize) -> Result<String> {
        self.get(pos)
            .to_scalar_string()
            .ok_or_else(|| self.type_error(pos, "string"))
    }

    pub fn opt_string(&self, pos: usize) -> Result<Option<String>> {
        match self.get(pos) {
            DynamicValue::Nil => Ok(None),
            _ => self.check_string(pos).map(Some),
        }
    }

    pub fn check_number(&self, pos: usize) -> Result<f64> {
        match self.get(pos) {
            DynamicValue::Number(n) => Ok(*n),
            DynamicValue::String(s) => s.trim().parse().map_err(|_| self.type_error(pos, "number")),
            _ => Err(self.type_error(pos, "number")),
        }
    }

    pub fn opt_integer(&self, pos: usize, default: i64) -> Result<i64> {
        match self.get(pos) {
            DynamicValue::Nil => Ok(default),
            _ => {
                let n = self.check_number(pos)?;
                if n.fract() != 0.0 {
                    return Err(self.error(pos, "number has no integer representation"));
                }
                Ok(n as i64)
            }
        }
    }

    fn check_handle(&self, pos: usize, kind: HandleKind) -> Result<&Handle> {
        match self.get(pos) {
            DynamicValue::Handle(handle) if handle.kind() == kind => Ok(handle),
            DynamicValue::Handle(handle) => {
                Err(self.error(pos, format!("{} expected, got {}", kind, handle.kind())))
            }
            _ => Err(self.type_error(pos, kind.name())),
        }
    }

    pub fn check_file(&self, pos: usize) -> Result<Rc<RefCell<VirtualFile>>> {
        match self.check_handle(pos, HandleKind::File)? {
            Handle::File(file) => Ok(Rc::clone(file)),
            _ => Err(self.type_error(pos, "file")),
        }
    }

    pub fn check_store(&self, pos: usize) -> Result<Rc<Store>> {
        match self.check_handle(pos, HandleKind::Store)? {
            Handle::Store(store) => Ok(Rc::clone(store)),
            _ => Err(self.type_error(pos, "store")),
        }
    }

    pub fn check_batch(&self, pos: usize) -> Result<Rc<RefCell<Batch>>> {
        match self.check_handle(pos, HandleKind::Batch)? {
            Handle::Batch(batch) => Ok(Rc::clone(batch)),
            _ => Err(self.type_error(pos, "batch")),
        }
    }

    pub fn check_iterator(&self, pos: usize) -> Result<Rc<RefCell<StoreIterator>>> {
        match self.check_handle(pos, HandleKind::Iterator)? {
            Handle::Iterator(iterator) => Ok(Rc::clone(iterator)),
            _ => Err(self.type_error(pos, "iterator")),
        }
    }
}

// =============================================================================
// Sentinel results
// =============================================================================

/// `nil, message`
pub(crate) fn fail(message: impl ToString) -> Returns {
    vec![DynamicValue::Nil, DynamicValue::String(message.to_string())]
}

/// `nil, message, 1`: the errno-style triple file operations return
pub(crate) fn fail_errno(message: impl ToString) -> Returns {
    vec![
        DynamicValue::Nil,
        DynamicValue::String(message.to_string()),
        DynamicValue::Number(1.0),
    ]
}

pub(crate) fn ok(value: impl Into<DynamicValue>) -> Returns {
    vec![value.into()]
}

/// Text of a scalar written by `write`
pub(crate) fn scalar_text(value: &DynamicValue) -> Option<String> {
    match value {
        DynamicValue::Number(n) => Some(format_number(*n)),
        DynamicValue::String(s) => Some(s.clone()),
        _ => None,
    }
}
