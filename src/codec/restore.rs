//! Identity-preserving restore of snapshots into live values

use std::collections::{BTreeMap, HashMap, HashSet};

use super::classes::ClassRegistry;
use super::snapshot::{Body, Lineage, Node, Snapshot};
use crate::error::OnceError;
use crate::value::{Handle, Object, Value};

/// Fields and named results rebuilt from a chain of snapshots
#[derive(Debug, Clone, Default)]
pub struct Restored {
    pub fields: BTreeMap<String, Value>,
    pub named_results: BTreeMap<String, Value>,
    /// Which table entry each restored heap node was built from
    pub(crate) lineage: Lineage,
}

/// Rebuild the merged state of `snapshots`, given root first.
///
/// A later snapshot's key overrides an earlier one's. All snapshots share one
/// identity map, and the leaf is materialized first: if a descendant scope
/// re-serialized an object because it mutated it, that version is the single
/// instance every reference to the object resolves to.
///
/// Restored nodes get fresh ids; they never alias the objects they were
/// recorded from.
pub fn restore(snapshots: &[&Snapshot], classes: &ClassRegistry) -> Result<Restored, OnceError> {
    let mut materializer = Materializer {
        classes,
        identity: HashMap::new(),
        loading: HashSet::new(),
        lineage: Lineage::new(),
    };
    let mut restored = Restored::default();
    for snapshot in snapshots.iter().rev() {
        for (name, node) in &snapshot.fields {
            if !restored.fields.contains_key(name) {
                let value = materializer.materialize(node, &snapshot.objects)?;
                restored.fields.insert(name.clone(), value);
            }
        }
        for (name, node) in &snapshot.named_results {
            if !restored.named_results.contains_key(name) {
                let value = materializer.materialize(node, &snapshot.objects)?;
                restored.named_results.insert(name.clone(), value);
            }
        }
    }
    restored.lineage = materializer.lineage;
    Ok(restored)
}

struct Materializer<'a> {
    classes: &'a ClassRegistry,
    identity: HashMap<u64, Value>,
    loading: HashSet<u64>,
    lineage: Lineage,
}

impl Materializer<'_> {
    fn materialize(
        &mut self,
        node: &Node,
        objects: &BTreeMap<u64, Body>,
    ) -> Result<Value, OnceError> {
        let raw = match node {
            Node::Nil => return Ok(Value::Nil),
            Node::Bool(b) => return Ok(Value::Bool(*b)),
            Node::Int(n) => return Ok(Value::Int(*n)),
            Node::Float(n) => return Ok(Value::Float(*n)),
            Node::Str(s) => return Ok(Value::Str(s.clone())),
            Node::Ref(raw) => *raw,
        };
        if let Some(existing) = self.identity.get(&raw) {
            return Ok(existing.clone());
        }
        let body = objects
            .get(&raw)
            .ok_or_else(|| OnceError::Decode(format!("dangling reference to object #{raw}")))?;

        // Containers are registered before their children are filled so
        // cyclic references resolve to the instance under construction.
        match body {
            Body::List { items } => {
                let handle = Handle::new(Vec::with_capacity(items.len()));
                self.identity.insert(raw, Value::List(handle.clone()));
                self.lineage.insert(handle.id(), raw);
                for item in items {
                    let value = self.materialize(item, objects)?;
                    handle.borrow_mut().push(value);
                }
                Ok(Value::List(handle))
            }
            Body::Map { entries } => {
                let handle = Handle::new(Vec::with_capacity(entries.len()));
                self.identity.insert(raw, Value::Map(handle.clone()));
                self.lineage.insert(handle.id(), raw);
                for (k, v) in entries {
                    let key = self.materialize(k, objects)?;
                    let value = self.materialize(v, objects)?;
                    handle.borrow_mut().push((key, value));
                }
                Ok(Value::Map(handle))
            }
            Body::Object { class, fields } => {
                let handle = Handle::new(Object::new(class.clone()));
                self.identity.insert(raw, Value::Object(handle.clone()));
                self.lineage.insert(handle.id(), raw);
                for (name, field) in fields {
                    let value = self.materialize(field, objects)?;
                    handle.borrow_mut().fields.insert(name.clone(), value);
                }
                Ok(Value::Object(handle))
            }
            Body::Custom { class, payload } => {
                if !self.loading.insert(raw) {
                    return Err(OnceError::Decode(format!(
                        "object #{raw} of class {class} refers to itself through its custom encoding"
                    )));
                }
                let codec = self.classes.get(class).cloned().ok_or_else(|| {
                    OnceError::Decode(format!("no codec registered for class {class}"))
                })?;
                let payload = self.materialize(payload, objects)?;
                let object = codec
                    .load(class, payload)
                    .map_err(|err| OnceError::Decode(format!("loading {class}: {err:#}")))?;
                self.loading.remove(&raw);
                let handle = Handle::new(object);
                self.lineage.insert(handle.id(), raw);
                let value = Value::Object(handle);
                self.identity.insert(raw, value.clone());
                Ok(value)
            }
        }
    }
}
