//! Dynamic Value Module
//!
//! The runtime values a script hands to the bridge and gets back from it.
//!
//! ## Representation
//! - Scalars (`Nil`, `Bool`, `Number`, `String`) are plain data
//! - `Table` is shared by reference: two values holding the same `Rc` are the
//!   same table, which is what cycle detection keys on
//! - `Handle` and `Function` exist so scripts can hold capabilities and
//!   callables; neither has a wire representation

mod table;

pub use table::{Table, TableKey, TableRef};

use std::fmt;
use std::rc::Rc;

use crate::codec;
use crate::host::Handle;

/// Signature of a host-callable function: arguments in, return values out
pub type FunctionBody = dyn Fn(&[DynamicValue]) -> Result<Vec<DynamicValue>, String>;

/// A named callable stored in a script value
#[derive(Clone)]
pub struct NativeFunction {
    name: String,
    body: Rc<FunctionBody>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&[DynamicValue]) -> Result<Vec<DynamicValue>, String> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            body: Rc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke in protected mode: a failure comes back as `Err(message)`
    pub fn call(&self, args: &[DynamicValue]) -> Result<Vec<DynamicValue>, String> {
        (self.body)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function: {}", self.name)
    }
}

/// Tagged-union runtime value
#[derive(Clone, Default)]
pub enum DynamicValue {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Table(TableRef),
    Handle(Handle),
    Function(NativeFunction),
}

impl DynamicValue {
    /// Wrap a table into a value
    pub fn table(table: Table) -> Self {
        DynamicValue::Table(table.into_ref())
    }

    /// Build a sequence value from its elements
    pub fn array(values: impl IntoIterator<Item = DynamicValue>) -> Self {
        Self::table(Table::from_array(values))
    }

    /// Build a string-keyed value from its entries
    pub fn object<K: Into<String>>(pairs: impl IntoIterator<Item = (K, DynamicValue)>) -> Self {
        Self::table(Table::from_pairs(pairs))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, DynamicValue::Nil)
    }

    /// Name of the value's type, as a script would see it
    pub fn type_name(&self) -> &'static str {
        match self {
            DynamicValue::Nil => "nil",
            DynamicValue::Bool(_) => "boolean",
            DynamicValue::Number(_) => "number",
            DynamicValue::String(_) => "string",
            DynamicValue::Table(_) => "table",
            DynamicValue::Handle(_) => "userdata",
            DynamicValue::Function(_) => "function",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            DynamicValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            DynamicValue::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            DynamicValue::Handle(h) => Some(h),
            _ => None,
        }
    }

    /// String form of a scalar the way `write`/`tostring` render it.
    /// Returns `None` for values that are not strings or numbers.
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            DynamicValue::String(s) => Some(s.clone()),
            DynamicValue::Number(n) => Some(format_number(*n)),
            _ => None,
        }
    }
}

/// Render a number: integral values without a fractional part
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}inf", sign)
    } else {
        format!("{}", n)
    }
}

impl PartialEq for DynamicValue {
    /// Structural equality. Tables compare by content: the sequence part in
    /// order, the rest regardless of insertion order. Cyclic tables that are
    /// not the same `Rc` recurse without bound.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DynamicValue::Nil, DynamicValue::Nil) => true,
            (DynamicValue::Bool(a), DynamicValue::Bool(b)) => a == b,
            (DynamicValue::Number(a), DynamicValue::Number(b)) => a == b,
            (DynamicValue::String(a), DynamicValue::String(b)) => a == b,
            (DynamicValue::Table(a), DynamicValue::Table(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.entry_count() == b.entry_count() && a.iter().all(|(key, value)| b.get(&key) == *value)
            }
            (DynamicValue::Handle(a), DynamicValue::Handle(b)) => a.same(b),
            (DynamicValue::Function(a), DynamicValue::Function(b)) => Rc::ptr_eq(&a.body, &b.body),
            _ => false,
        }
    }
}

impl fmt::Debug for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicValue::Nil => write!(f, "Nil"),
            DynamicValue::Bool(b) => write!(f, "Bool({})", b),
            DynamicValue::Number(n) => write!(f, "Number({})", n),
            DynamicValue::String(s) => write!(f, "String({:?})", s),
            // Render through the codec so cyclic tables cannot recurse forever
            DynamicValue::Table(t) => match codec::encode_to_string(self) {
                Ok(text) => write!(f, "Table({})", text),
                Err(_) => write!(f, "Table({:p})", Rc::as_ptr(t)),
            },
            DynamicValue::Handle(h) => write!(f, "Handle({})", h),
            DynamicValue::Function(func) => write!(f, "{:?}", func),
        }
    }
}

impl From<bool> for DynamicValue {
    fn from(b: bool) -> Self {
        DynamicValue::Bool(b)
    }
}

impl From<f64> for DynamicValue {
    fn from(n: f64) -> Self {
        DynamicValue::Number(n)
    }
}

impl From<i64> for DynamicValue {
    fn from(n: i64) -> Self {
        DynamicValue::Number(n as f64)
    }
}

impl From<i32> for DynamicValue {
    fn from(n: i32) -> Self {
        DynamicValue::Number(n as f64)
    }
}

impl From<usize> for DynamicValue {
    fn from(n: usize) -> Self {
        DynamicValue::Number(n as f64)
    }
}

impl From<&str> for DynamicValue {
    fn from(s: &str) -> Self {
        DynamicValue::String(s.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(s: String) -> Self {
        DynamicValue::String(s)
    }
}

impl From<Table> for DynamicValue {
    fn from(t: Table) -> Self {
        DynamicValue::table(t)
    }
}

impl From<Handle> for DynamicValue {
    fn from(h: Handle) -> Self {
        DynamicValue::Handle(h)
    }
}

impl From<NativeFunction> for DynamicValue {
    fn from(f: NativeFunction) -> Self {
        DynamicValue::Function(f)
    }
}
