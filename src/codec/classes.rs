//! Per-class custom encoding hooks

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::value::{Object, Value};

/// Custom encoding for objects of one class.
///
/// `dump` replaces the object's fields with whatever payload it returns (the
/// payload is encoded like any other value, so it may reference other objects
/// in the graph). `load` rebuilds the object from the restored payload.
pub trait ClassCodec: Send + Sync {
    fn dump(&self, object: &Object) -> Value;
    fn load(&self, class: &str, payload: Value) -> anyhow::Result<Object>;
}

/// Registry of [`ClassCodec`]s keyed by class name
#[derive(Clone, Default)]
pub struct ClassRegistry {
    codecs: HashMap<String, Arc<dyn ClassCodec>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: impl Into<String>, codec: Arc<dyn ClassCodec>) {
        self.codecs.insert(class.into(), codec);
    }

    pub fn get(&self, class: &str) -> Option<&Arc<dyn ClassCodec>> {
        self.codecs.get(class)
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<&String> = self.codecs.keys().collect();
        classes.sort();
        f.debug_struct("ClassRegistry")
            .field("classes", &classes)
            .finish()
    }
}
