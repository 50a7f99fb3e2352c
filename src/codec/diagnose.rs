//! Locating the value that broke encoding
//!
//! The encoder only knows *that* something could not be dumped. When a key
//! fails, this module walks the key's value graph depth-first, descending into
//! whichever child still fails to encode on its own, until it reaches a value
//! none of whose children are at fault. Objects of a class with a custom codec
//! are walked through their `dump` payload, since that is what actually gets
//! encoded.

use std::collections::HashSet;

use thiserror::Error;

use super::classes::ClassRegistry;
use super::snapshot::{EncodeFailure, Encoder};
use crate::value::{ObjectId, Value};

/// A once value or field that could not be serialized
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unable to dump {path}: {message}")]
pub struct SerializationError {
    /// Field or named value the walk started from
    pub key: String,
    /// `key (#<Type>) => segment (#<Type>) => ...`
    pub path: String,
    /// Text of the underlying encoding failure
    pub message: String,
}

struct Segment {
    label: String,
    type_label: String,
}

struct Probe<'a> {
    classes: &'a ClassRegistry,
    visited: HashSet<ObjectId>,
}

impl Probe<'_> {
    fn failure(&self, value: &Value) -> Option<EncodeFailure> {
        Encoder::new(self.classes).encode(value).err()
    }

    fn walk(&mut self, value: &Value, trail: &mut Vec<Segment>) -> Option<String> {
        let failure = self.failure(value)?;
        if let Some(id) = value.object_id() {
            if !self.visited.insert(id) {
                return None;
            }
        }
        for (label, child) in self.children(value) {
            trail.push(Segment {
                label,
                type_label: child.type_label(),
            });
            if let Some(message) = self.walk(&child, trail) {
                return Some(message);
            }
            trail.pop();
        }
        Some(failure.message)
    }

    fn children(&self, value: &Value) -> Vec<(String, Value)> {
        match value {
            Value::List(list) => list
                .borrow()
                .iter()
                .enumerate()
                .map(|(i, item)| (format!("[{i}]"), item.clone()))
                .collect(),
            Value::Map(map) => map
                .borrow()
                .iter()
                .flat_map(|(k, v)| {
                    let key = k.inspect();
                    [
                        (format!("hash key {key}"), k.clone()),
                        (format!("[{key}]"), v.clone()),
                    ]
                })
                .collect(),
            Value::Object(object) => {
                let object = object.borrow();
                match self.classes.get(&object.class) {
                    Some(codec) => vec![("dump".to_string(), codec.dump(&object))],
                    None => object
                        .fields
                        .iter()
                        .map(|(name, field)| (format!(".{name}"), field.clone()))
                        .collect(),
                }
            }
            _ => Vec::new(),
        }
    }
}

/// Build the diagnostic for `key`, whose value failed with `failure`
pub(crate) fn diagnose(
    key: &str,
    value: &Value,
    classes: &ClassRegistry,
    failure: EncodeFailure,
) -> SerializationError {
    let mut probe = Probe {
        classes,
        visited: HashSet::new(),
    };
    let mut trail = vec![Segment {
        label: key.to_string(),
        type_label: value.type_label(),
    }];
    let message = probe.walk(value, &mut trail).unwrap_or(failure.message);
    let path = trail
        .iter()
        .map(|segment| format!("{} ({})", segment.label, segment.type_label))
        .collect::<Vec<_>>()
        .join(" => ");
    tracing::debug!(key, %path, "located unencodable value");
    SerializationError {
        key: key.to_string(),
        path,
        message,
    }
}

/// Encode `value` alone and explain the failure, if any
pub fn find_dump_error(
    key: &str,
    value: &Value,
    classes: &ClassRegistry,
) -> Option<SerializationError> {
    let failure = Encoder::new(classes).encode(value).err()?;
    Some(diagnose(key, value, classes, failure))
}
