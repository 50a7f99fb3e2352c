use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::classes::ClassRegistry;
use super::diagnose::{diagnose, SerializationError};
use crate::value::{ObjectId, Value};

/// Encoded scalar or reference into the snapshot's object table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Node {
    Nil,
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "float_repr")] f64),
    Str(String),
    Ref(u64),
}

/// Encoded heap node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Body {
    List { items: Vec<Node> },
    Map { entries: Vec<(Node, Node)> },
    Object { class: String, fields: BTreeMap<String, Node> },
    Custom { class: String, payload: Node },
}

/// Serialized, diff-reduced result of one scope's once-setup pass.
///
/// Every heap node reachable from `fields` or `named_results` appears exactly
/// once in `objects`; repeated and cyclic references are `Node::Ref`s into
/// that table. A node restored from an ancestor's snapshot keeps the key it
/// had there, so a re-serialized version replaces it across the chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub(crate) fields: BTreeMap<String, Node>,
    pub(crate) named_results: BTreeMap<String, Node>,
    pub(crate) objects: BTreeMap<u64, Body>,
}

impl Snapshot {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn has_named_result(&self, name: &str) -> bool {
        self.named_results.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn named_result_names(&self) -> impl Iterator<Item = &str> {
        self.named_results.keys().map(String::as_str)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.named_results.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Finite floats as JSON numbers, the rest as `"NaN"`, `"inf"` or `"-inf"`
mod float_repr {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(FloatVisitor)
    }

    struct FloatVisitor;

    impl Visitor<'_> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number, \"NaN\", \"inf\" or \"-inf\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}

/// Restored copies mapped to the object-table key they were built from
pub(crate) type Lineage = HashMap<ObjectId, u64>;

/// Low-level refusal to encode a value, before any path is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EncodeFailure {
    pub(crate) message: String,
}

/// Identity-tracking encoder shared by all keys of one snapshot.
///
/// Nodes are deduplicated by address. A restored copy is keyed by the entry
/// it came from; any other node by its own id, unless that key already
/// belongs to a different node, in which case it gets a fresh one.
pub(crate) struct Encoder<'a> {
    classes: &'a ClassRegistry,
    lineage: Option<&'a Lineage>,
    inherited: HashSet<u64>,
    keys: HashMap<usize, u64>,
    taken: HashSet<u64>,
    dumping: HashSet<usize>,
    /// Custom dump payloads, held so their addresses stay unique
    payloads: Vec<Value>,
    objects: BTreeMap<u64, Body>,
}

impl<'a> Encoder<'a> {
    pub(crate) fn new(classes: &'a ClassRegistry) -> Self {
        Self {
            classes,
            lineage: None,
            inherited: HashSet::new(),
            keys: HashMap::new(),
            taken: HashSet::new(),
            dumping: HashSet::new(),
            payloads: Vec::new(),
            objects: BTreeMap::new(),
        }
    }

    pub(crate) fn with_lineage(classes: &'a ClassRegistry, lineage: &'a Lineage) -> Self {
        Self {
            lineage: Some(lineage),
            inherited: lineage.values().copied().collect(),
            ..Self::new(classes)
        }
    }

    /// Table key for the node at `addr`, and whether it still has to be encoded
    fn key_for(&mut self, id: ObjectId, addr: usize) -> (u64, bool) {
        if let Some(&key) = self.keys.get(&addr) {
            return (key, false);
        }
        let copied_from = self.lineage.and_then(|lineage| lineage.get(&id)).copied();
        let preferred = match copied_from {
            Some(key) => Some(key),
            None if self.inherited.contains(&id.get()) => None,
            None => Some(id.get()),
        };
        let key = match preferred {
            Some(key) if !self.taken.contains(&key) => key,
            _ => ObjectId::next().get(),
        };
        self.keys.insert(addr, key);
        self.taken.insert(key);
        (key, true)
    }

    pub(crate) fn encode(&mut self, value: &Value) -> Result<Node, EncodeFailure> {
        match value {
            Value::Nil => Ok(Node::Nil),
            Value::Bool(b) => Ok(Node::Bool(*b)),
            Value::Int(n) => Ok(Node::Int(*n)),
            Value::Float(n) => Ok(Node::Float(*n)),
            Value::Str(s) => Ok(Node::Str(s.clone())),
            Value::List(list) => {
                let (key, fresh) = self.key_for(list.id(), list.addr());
                if fresh {
                    let items = list
                        .borrow()
                        .iter()
                        .map(|item| self.encode(item))
                        .collect::<Result<_, _>>()?;
                    self.objects.insert(key, Body::List { items });
                }
                Ok(Node::Ref(key))
            }
            Value::Map(map) => {
                let (key, fresh) = self.key_for(map.id(), map.addr());
                if fresh {
                    let entries = map
                        .borrow()
                        .iter()
                        .map(|(k, v)| Ok::<_, EncodeFailure>((self.encode(k)?, self.encode(v)?)))
                        .collect::<Result<_, _>>()?;
                    self.objects.insert(key, Body::Map { entries });
                }
                Ok(Node::Ref(key))
            }
            Value::Object(object) => {
                let addr = object.addr();
                if self.dumping.contains(&addr) {
                    return Err(EncodeFailure {
                        message: format!(
                            "object of class {} refers to itself through its custom encoding",
                            object.borrow().class
                        ),
                    });
                }
                let (key, fresh) = self.key_for(object.id(), addr);
                if fresh {
                    let class = object.borrow().class.clone();
                    let body = match self.classes.get(&class).cloned() {
                        Some(codec) => {
                            let payload = codec.dump(&object.borrow());
                            self.dumping.insert(addr);
                            let node = self.encode(&payload);
                            self.dumping.remove(&addr);
                            self.payloads.push(payload);
                            Body::Custom {
                                class,
                                payload: node?,
                            }
                        }
                        None => {
                            let fields = object
                                .borrow()
                                .fields
                                .iter()
                                .map(|(name, field)| {
                                    Ok::<_, EncodeFailure>((name.clone(), self.encode(field)?))
                                })
                                .collect::<Result<_, _>>()?;
                            Body::Object { class, fields }
                        }
                    };
                    self.objects.insert(key, body);
                }
                Ok(Node::Ref(key))
            }
            Value::Opaque(opaque) => Err(EncodeFailure {
                message: format!("can't dump opaque value of type {}", opaque.type_name()),
            }),
        }
    }

    fn into_objects(self) -> BTreeMap<u64, Body> {
        self.objects
    }
}

/// Accumulates the keys one scope decided to keep
pub(crate) struct SnapshotBuilder<'a> {
    classes: &'a ClassRegistry,
    encoder: Encoder<'a>,
    fields: BTreeMap<String, Node>,
    named_results: BTreeMap<String, Node>,
}

impl<'a> SnapshotBuilder<'a> {
    pub(crate) fn new(classes: &'a ClassRegistry) -> Self {
        Self {
            classes,
            encoder: Encoder::new(classes),
            fields: BTreeMap::new(),
            named_results: BTreeMap::new(),
        }
    }

    /// Builder for a Tape whose inherited values were restored with `lineage`
    pub(crate) fn with_lineage(classes: &'a ClassRegistry, lineage: &'a Lineage) -> Self {
        Self {
            encoder: Encoder::with_lineage(classes, lineage),
            ..Self::new(classes)
        }
    }

    pub(crate) fn field(&mut self, name: &str, value: &Value) -> Result<(), SerializationError> {
        let node = self.encode(name, value)?;
        self.fields.insert(name.to_string(), node);
        Ok(())
    }

    pub(crate) fn named_result(
        &mut self,
        name: &str,
        value: &Value,
    ) -> Result<(), SerializationError> {
        let node = self.encode(name, value)?;
        self.named_results.insert(name.to_string(), node);
        Ok(())
    }

    fn encode(&mut self, name: &str, value: &Value) -> Result<Node, SerializationError> {
        self.encoder
            .encode(value)
            .map_err(|failure| diagnose(name, value, self.classes, failure))
    }

    pub(crate) fn finish(self) -> Snapshot {
        Snapshot {
            fields: self.fields,
            named_results: self.named_results,
            objects: self.encoder.into_objects(),
        }
    }
}
