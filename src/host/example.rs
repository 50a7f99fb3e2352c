use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use super::scope::{ScopeId, ScopeTree};
use crate::codec::Restored;
use crate::error::OnceError;
use crate::record::{Action, Fixture};
use crate::value::Value;

/// The per-test instance that once-setup is replayed into
pub struct Example {
    tree: Rc<ScopeTree>,
    scope: ScopeId,
    description: String,
    fields: BTreeMap<String, Value>,
    once_values: BTreeMap<String, Value>,
    each_values: BTreeMap<String, Value>,
    evaluating: BTreeSet<String>,
}

impl Example {
    pub fn new(tree: Rc<ScopeTree>, scope: ScopeId, description: impl Into<String>) -> Self {
        Self {
            tree,
            scope,
            description: description.into(),
            fields: BTreeMap::new(),
            once_values: BTreeMap::new(),
            each_values: BTreeMap::new(),
            evaluating: BTreeSet::new(),
        }
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn tree(&self) -> &Rc<ScopeTree> {
        &self.tree
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// "<scope full description> <example description>"
    pub fn full_description(&self) -> String {
        format!(
            "{} {}",
            self.tree.scope(self.scope).full_description(),
            self.description
        )
    }

    /// Replayed once value, ignoring per-example shadowing
    pub fn once_value(&self, name: &str) -> Result<Value, OnceError> {
        self.once_values
            .get(name)
            .cloned()
            .ok_or_else(|| OnceError::UnknownValue(name.to_string()))
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Take over the fields and once values restored for this example
    pub fn inject(&mut self, restored: Restored) {
        self.fields.extend(restored.fields);
        self.once_values.extend(restored.named_results);
    }

    fn resolve(&mut self, name: &str) -> Result<Value, OnceError> {
        if let Some(value) = self.each_values.get(name) {
            return Ok(value.clone());
        }
        let tree = self.tree.clone();
        for id in tree.ancestry(self.scope).into_iter().rev() {
            let scope = tree.scope(id);
            if let Some(action) = scope.each_action(name) {
                return self.evaluate_each(name, action.clone());
            }
            if scope.recorder().is_some_and(|r| r.declares(name)) {
                return self.once_value(name);
            }
        }
        self.once_value(name)
    }

    fn evaluate_each(&mut self, name: &str, action: Action) -> Result<Value, OnceError> {
        if !self.evaluating.insert(name.to_string()) {
            return Err(OnceError::CyclicValue(name.to_string()));
        }
        let result = action(self);
        self.evaluating.remove(name);
        let value = result.map_err(|err| {
            let scope = self.tree.scope(self.scope).full_description().to_string();
            OnceError::setup_failure(&scope, Some(&format!("let_each `{name}`")), err)
        })?;
        self.each_values.insert(name.to_string(), value.clone());
        Ok(value)
    }
}

impl Fixture for Example {
    /// Nearest declaration wins: a `let_each` in a deeper scope shadows a
    /// once value above it, and the other way round.
    fn value(&mut self, name: &str) -> Result<Value, OnceError> {
        self.resolve(name)
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

impl std::fmt::Debug for Example {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Example")
            .field("scope", &self.scope)
            .field("description", &self.description)
            .field("fields", &self.fields)
            .field("once_values", &self.once_values)
            .finish()
    }
}
