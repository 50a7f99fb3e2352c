use std::collections::BTreeMap;
use std::rc::Rc;

use super::recording::{Action, Recording};
use super::Fixture;
use crate::codec::{restore, ClassRegistry, Restored, Snapshot, SnapshotBuilder};
use crate::diff::{mutated, Comparator};
use crate::error::OnceError;
use crate::value::Value;

enum Slot {
    Pending(Action),
    Evaluating,
    Ready(Value),
}

/// What the Tape started from: the inherited live values (for identity) and
/// an independent copy of them (for equality).
struct Baseline {
    identity: Restored,
    pristine: Restored,
}

/// Snapshot surface for one record pass.
///
/// Starts blank, or from the restored state of the ancestor scopes, executes
/// the scope's recordings and serializes only what they changed.
pub struct Tape {
    label: String,
    fields: BTreeMap<String, Value>,
    slots: BTreeMap<String, Slot>,
    inherited_results: BTreeMap<String, Value>,
    baseline: Option<Baseline>,
}

impl Tape {
    pub fn blank(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            fields: BTreeMap::new(),
            slots: BTreeMap::new(),
            inherited_results: BTreeMap::new(),
            baseline: None,
        }
    }

    /// Tape seeded from ancestor snapshots, given root first
    pub fn inheriting(
        label: impl Into<String>,
        snapshots: &[Rc<Snapshot>],
        classes: &ClassRegistry,
    ) -> Result<Self, OnceError> {
        if snapshots.is_empty() {
            return Ok(Self::blank(label));
        }
        let chain: Vec<&Snapshot> = snapshots.iter().map(Rc::as_ref).collect();
        let identity = restore(&chain, classes)?;
        let pristine = restore(&chain, classes)?;
        Ok(Self {
            label: label.into(),
            fields: identity.fields.clone(),
            slots: BTreeMap::new(),
            inherited_results: identity.named_results.clone(),
            baseline: Some(Baseline { identity, pristine }),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Install lazy slots for every named recording, then run all
    /// recordings once in declaration order.
    pub fn execute(&mut self, recordings: &[Recording]) -> Result<(), OnceError> {
        for recording in recordings {
            if let Some(name) = recording.name() {
                self.slots
                    .insert(name.to_string(), Slot::Pending(recording.action().clone()));
            }
        }
        for recording in recordings {
            match recording.name() {
                Some(name) => {
                    self.value(name)?;
                }
                None => {
                    let action = recording.action().clone();
                    action(self).map_err(|err| OnceError::setup_failure(&self.label, None, err))?;
                }
            }
        }
        Ok(())
    }

    /// Result of a named recording, evaluated on first access; falls back to
    /// values inherited from ancestor scopes.
    pub fn value(&mut self, name: &str) -> Result<Value, OnceError> {
        let action = match self.slots.get_mut(name) {
            Some(slot) => match std::mem::replace(slot, Slot::Evaluating) {
                Slot::Pending(action) => action,
                Slot::Ready(value) => {
                    *slot = Slot::Ready(value.clone());
                    return Ok(value);
                }
                Slot::Evaluating => return Err(OnceError::CyclicValue(name.to_string())),
            },
            None => {
                return self
                    .inherited_results
                    .get(name)
                    .cloned()
                    .ok_or_else(|| OnceError::UnknownValue(name.to_string()))
            }
        };

        match action(self) {
            Ok(value) => {
                tracing::debug!(scope = %self.label, name, "evaluated once value");
                self.slots.insert(name.to_string(), Slot::Ready(value.clone()));
                Ok(value)
            }
            Err(err) => {
                self.slots.insert(name.to_string(), Slot::Pending(action));
                let context = format!("once value `{name}`");
                Err(OnceError::setup_failure(&self.label, Some(&context), err))
            }
        }
    }

    /// Named results visible from this Tape: inherited ones overlaid with
    /// those evaluated here.
    fn named_results(&self) -> BTreeMap<&str, &Value> {
        let mut results: BTreeMap<&str, &Value> = self
            .inherited_results
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        for (name, slot) in &self.slots {
            if let Slot::Ready(value) = slot {
                results.insert(name.as_str(), value);
            }
        }
        results
    }

    /// Serialize every key that is new here or was changed relative to the
    /// inherited baseline.
    pub fn snapshot(&self, classes: &ClassRegistry) -> Result<Snapshot, OnceError> {
        let baseline = self.baseline.as_ref();
        let mut builder = match baseline {
            Some(baseline) => SnapshotBuilder::with_lineage(classes, &baseline.identity.lineage),
            None => SnapshotBuilder::new(classes),
        };
        let mut probe = Comparator::new();

        for (name, live) in &self.fields {
            let pristine = baseline.and_then(|b| b.pristine.fields.get(name));
            let identity = baseline.and_then(|b| b.identity.fields.get(name));
            if mutated(live, pristine, identity, &mut probe) {
                builder.field(name, live)?;
            } else {
                tracing::trace!(
                    scope = %self.label,
                    field = %name,
                    "field unchanged, not re-recorded"
                );
            }
        }
        for (name, live) in self.named_results() {
            let pristine = baseline.and_then(|b| b.pristine.named_results.get(name));
            let identity = baseline.and_then(|b| b.identity.named_results.get(name));
            if mutated(live, pristine, identity, &mut probe) {
                builder.named_result(name, live)?;
            }
        }
        Ok(builder.finish())
    }
}

impl Fixture for Tape {
    fn value(&mut self, name: &str) -> Result<Value, OnceError> {
        Tape::value(self, name)
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}
