//! Table implementation
//!
//! Array part for the contiguous keys `1..=N`, insertion-ordered hash part for
//! everything else. Enumeration walks the array part first, so a table built
//! as `t[2] = b; t[1] = a` still enumerates `1, 2`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::DynamicValue;

/// Shared, mutable table reference. Identity is the `Rc` allocation.
pub type TableRef = Rc<RefCell<Table>>;

/// A valid table key. Nil and NaN cannot be keys.
#[derive(Clone)]
pub enum TableKey {
    Number(f64),
    String(String),
    Bool(bool),
    Table(TableRef),
}

impl TableKey {
    /// Convert a value into a key, or `None` if the value cannot index a table
    pub fn from_value(value: &DynamicValue) -> Option<Self> {
        match value {
            DynamicValue::Number(n) if !n.is_nan() => Some(TableKey::Number(*n)),
            DynamicValue::String(s) => Some(TableKey::String(s.clone())),
            DynamicValue::Bool(b) => Some(TableKey::Bool(*b)),
            DynamicValue::Table(t) => Some(TableKey::Table(Rc::clone(t))),
            _ => None,
        }
    }

    pub fn to_value(&self) -> DynamicValue {
        match self {
            TableKey::Number(n) => DynamicValue::Number(*n),
            TableKey::String(s) => DynamicValue::String(s.clone()),
            TableKey::Bool(b) => DynamicValue::Bool(*b),
            TableKey::Table(t) => DynamicValue::Table(Rc::clone(t)),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            TableKey::Number(_) => "number",
            TableKey::String(_) => "string",
            TableKey::Bool(_) => "boolean",
            TableKey::Table(_) => "table",
        }
    }

    /// The array slot this key addresses, if it is a positive integer
    fn array_index(&self) -> Option<usize> {
        match self {
            TableKey::Number(n) if n.fract() == 0.0 && *n >= 1.0 && *n <= usize::MAX as f64 => {
                Some(*n as usize)
            }
            _ => None,
        }
    }
}

impl PartialEq for TableKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TableKey::Number(a), TableKey::Number(b)) => a == b,
            (TableKey::String(a), TableKey::String(b)) => a == b,
            (TableKey::Bool(a), TableKey::Bool(b)) => a == b,
            (TableKey::Table(a), TableKey::Table(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// NaN is rejected by `from_value`, so equality is reflexive.
impl Eq for TableKey {}

impl Hash for TableKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            // -0.0 == 0.0, so they must hash alike
            TableKey::Number(n) => {
                let n = if *n == 0.0 { 0.0 } else { *n };
                n.to_bits().hash(state);
            }
            TableKey::String(s) => s.hash(state),
            TableKey::Bool(b) => b.hash(state),
            TableKey::Table(t) => (Rc::as_ptr(t) as usize).hash(state),
        }
    }
}

impl fmt::Debug for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKey::Number(n) => write!(f, "{}", n),
            TableKey::String(s) => write!(f, "{:?}", s),
            TableKey::Bool(b) => write!(f, "{}", b),
            TableKey::Table(t) => write!(f, "table: {:p}", Rc::as_ptr(t)),
        }
    }
}

impl From<&str> for TableKey {
    fn from(s: &str) -> Self {
        TableKey::String(s.to_string())
    }
}

impl From<String> for TableKey {
    fn from(s: String) -> Self {
        TableKey::String(s)
    }
}

impl From<usize> for TableKey {
    fn from(i: usize) -> Self {
        TableKey::Number(i as f64)
    }
}

/// Ordered associative container
#[derive(Default)]
pub struct Table {
    /// Values for keys `1..=array.len()`; never holds Nil
    array: Vec<DynamicValue>,

    /// Remaining entries in insertion order; never holds key `array.len() + 1`
    entries: Vec<(TableKey, DynamicValue)>,

    /// key -> position in `entries`
    index: HashMap<TableKey, usize>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sequence table: element `i` lands at key `i + 1`.
    /// Nil elements leave a hole at their index.
    pub fn from_array(values: impl IntoIterator<Item = DynamicValue>) -> Self {
        let mut table = Self::new();
        for (i, value) in values.into_iter().enumerate() {
            table.set_index(i + 1, value);
        }
        table
    }

    /// Build a string-keyed table
    pub fn from_pairs<K: Into<String>>(
        pairs: impl IntoIterator<Item = (K, DynamicValue)>,
    ) -> Self {
        let mut table = Self::new();
        for (key, value) in pairs {
            table.set(TableKey::String(key.into()), value);
        }
        table
    }

    /// Wrap into a shared reference
    pub fn into_ref(self) -> TableRef {
        Rc::new(RefCell::new(self))
    }

    /// Look up a key; absent keys read as Nil
    pub fn get(&self, key: &TableKey) -> DynamicValue {
        if let Some(i) = key.array_index() {
            if i <= self.array.len() {
                return self.array[i - 1].clone();
            }
        }
        self.index
            .get(key)
            .map(|&pos| self.entries[pos].1.clone())
            .unwrap_or_default()
    }

    pub fn get_index(&self, i: usize) -> DynamicValue {
        self.get(&TableKey::from(i))
    }

    pub fn get_field(&self, name: &str) -> DynamicValue {
        self.get(&TableKey::from(name))
    }

    /// Assign a key. Assigning Nil removes the key.
    pub fn set(&mut self, key: TableKey, value: DynamicValue) {
        if let Some(i) = key.array_index() {
            let len = self.array.len();
            if i <= len {
                if value.is_nil() {
                    // Keys after the hole no longer form a sequence
                    let tail = self.array.split_off(i);
                    self.array.pop();
                    for (offset, moved) in tail.into_iter().enumerate() {
                        self.hash_set(TableKey::from(i + 1 + offset), moved);
                    }
                } else {
                    self.array[i - 1] = value;
                }
                return;
            }
            if i == len + 1 {
                if !value.is_nil() {
                    self.array.push(value);
                    self.migrate_into_array();
                }
                return;
            }
        }
        self.hash_set(key, value);
    }

    pub fn set_index(&mut self, i: usize, value: DynamicValue) {
        self.set(TableKey::from(i), value);
    }

    pub fn set_field(&mut self, name: &str, value: DynamicValue) {
        self.set(TableKey::from(name), value);
    }

    /// Append at the end of the sequence part
    pub fn push(&mut self, value: DynamicValue) {
        let next = self.array.len() + 1;
        self.set_index(next, value);
    }

    /// Length of the sequence part (the border)
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Total number of keys
    pub fn entry_count(&self) -> usize {
        self.array.len() + self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty() && self.entries.is_empty()
    }

    /// The first key in enumeration order
    pub fn first_key(&self) -> Option<TableKey> {
        if !self.array.is_empty() {
            return Some(TableKey::Number(1.0));
        }
        self.entries.first().map(|(key, _)| key.clone())
    }

    /// Enumerate all entries: sequence part ascending, then insertion order
    pub fn iter(&self) -> impl Iterator<Item = (TableKey, &DynamicValue)> + '_ {
        self.array
            .iter()
            .enumerate()
            .map(|(i, value)| (TableKey::from(i + 1), value))
            .chain(self.entries.iter().map(|(key, value)| (key.clone(), value)))
    }

    fn hash_set(&mut self, key: TableKey, value: DynamicValue) {
        if value.is_nil() {
            if let Some(pos) = self.index.remove(&key) {
                self.entries.remove(pos);
                for slot in self.index.values_mut() {
                    if *slot > pos {
                        *slot -= 1;
                    }
                }
            }
            return;
        }
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Pull `len + 1, len + 2, ...` out of the hash part after a push
    fn migrate_into_array(&mut self) {
        loop {
            let next = TableKey::from(self.array.len() + 1);
            if !self.index.contains_key(&next) {
                break;
            }
            let moved = self.get(&next);
            self.hash_set(next, DynamicValue::Nil);
            self.array.push(moved);
        }
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("len", &self.array.len())
            .field("entries", &self.entry_count())
            .finish()
    }
}
