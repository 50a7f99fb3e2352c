//! Dynamic value graph recorded by once-setup
//!
//! Setup code hands back arbitrary state: scalars, lists, maps and objects
//! (typically rows loaded from the database). Heap nodes are shared through
//! [`Handle`]s, so two values may reference the same object, lists may contain
//! themselves, and mutation through one reference is visible through all.

mod handle;

use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;

pub use handle::{Handle, ObjectId};

use crate::diff::Comparator;

/// A value in a recorded fixture graph
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Handle<Vec<Value>>),
    /// Insertion-ordered map; keys may be any value
    Map(Handle<Vec<(Value, Value)>>),
    Object(Handle<Object>),
    /// In-memory state with no encoding (closures, sockets, anonymous types)
    Opaque(Opaque),
}

/// A named bag of fields, e.g. a database row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    pub class: String,
    pub fields: BTreeMap<String, Value>,
}

impl Object {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }
}

/// Wrapper around state the codec cannot encode
#[derive(Clone)]
pub struct Opaque {
    type_name: String,
    inner: Rc<dyn Any>,
}

impl Opaque {
    pub fn new<T: Any>(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            inner: Rc::new(value),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Handle::new(items.into_iter().collect()))
    }

    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Map(Handle::new(entries.into_iter().collect()))
    }

    pub fn object(object: Object) -> Self {
        Value::Object(Handle::new(object))
    }

    pub fn opaque<T: Any>(type_name: impl Into<String>, value: T) -> Self {
        Value::Opaque(Opaque::new(type_name, value))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Handle<Vec<Value>>> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Handle<Vec<(Value, Value)>>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Handle<Object>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Read a field of an object value
    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.as_object()
            .and_then(|object| object.borrow().get(name).cloned())
    }

    /// Write a field of an object value; returns false for non-objects
    pub fn set_field(&self, name: &str, value: impl Into<Value>) -> bool {
        match self.as_object() {
            Some(object) => {
                object.borrow_mut().set(name, value);
                true
            }
            None => false,
        }
    }

    /// Look up a map entry by (deep-equal) key
    pub fn map_get(&self, key: &Value) -> Option<Value> {
        let map = self.as_map()?;
        let entries = map.borrow();
        entries
            .iter()
            .find(|(k, _)| Comparator::new().equal(k, key))
            .map(|(_, v)| v.clone())
    }

    /// Element at `index` of a list value
    pub fn at(&self, index: usize) -> Option<Value> {
        self.as_list()
            .and_then(|list| list.borrow().get(index).cloned())
    }

    /// Identity of the heap node behind this value, if any
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Value::List(h) => Some(h.id()),
            Value::Map(h) => Some(h.id()),
            Value::Object(h) => Some(h.id()),
            _ => None,
        }
    }

    /// Reference identity: the same heap node, the same opaque allocation, or
    /// equal scalars.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }

    /// Short type tag used in diagnostics, e.g. `#<List>` or `#<User>`
    pub fn type_label(&self) -> String {
        match self {
            Value::Nil => "#<Nil>".to_string(),
            Value::Bool(_) => "#<Bool>".to_string(),
            Value::Int(_) => "#<Int>".to_string(),
            Value::Float(_) => "#<Float>".to_string(),
            Value::Str(_) => "#<Str>".to_string(),
            Value::List(_) => "#<List>".to_string(),
            Value::Map(_) => "#<Map>".to_string(),
            Value::Object(object) => format!("#<{}>", object.borrow().class),
            Value::Opaque(opaque) => format!("#<Opaque {}>", opaque.type_name()),
        }
    }

    /// Human-readable rendering that terminates on cyclic graphs
    pub fn inspect(&self) -> String {
        format!("{self:?}")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        Comparator::new().equal(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, &mut HashSet::new())
    }
}

fn write_value(
    f: &mut fmt::Formatter<'_>,
    value: &Value,
    path: &mut HashSet<ObjectId>,
) -> fmt::Result {
    if let Some(id) = value.object_id() {
        if !path.insert(id) {
            return match value {
                Value::List(_) => write!(f, "[...]"),
                Value::Map(_) => write!(f, "{{...}}"),
                _ => write!(f, "{} ...", value.type_label()),
            };
        }
    }
    let result = match value {
        Value::Nil => write!(f, "nil"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Int(n) => write!(f, "{n}"),
        Value::Float(n) => write!(f, "{n:?}"),
        Value::Str(s) => write!(f, "{s:?}"),
        Value::List(list) => {
            write!(f, "[")?;
            for (i, item) in list.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_value(f, item, path)?;
            }
            write!(f, "]")
        }
        Value::Map(map) => {
            write!(f, "{{")?;
            for (i, (k, v)) in map.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_value(f, k, path)?;
                write!(f, " => ")?;
                write_value(f, v, path)?;
            }
            write!(f, "}}")
        }
        Value::Object(object) => {
            let object = object.borrow();
            write!(f, "#<{}", object.class)?;
            for (i, (name, field)) in object.fields.iter().enumerate() {
                write!(f, "{}{name}: ", if i == 0 { " " } else { ", " })?;
                write_value(f, field, path)?;
            }
            write!(f, ">")
        }
        Value::Opaque(opaque) => write!(f, "#<Opaque {}>", opaque.type_name()),
    };
    if let Some(id) = value.object_id() {
        path.remove(&id);
    }
    result
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::object(object)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Nil, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}
