use std::fmt;
use std::rc::Rc;

use crate::error::OnceError;
use crate::record::{Action, Fixture, RecordHooks, Recorder, Recording, ScopeHook};
use crate::value::Value;

use super::example::Example;

/// Index of a scope inside its [`ScopeTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0
    }
}

pub(crate) type ExampleBody = Rc<dyn Fn(&mut Example) -> anyhow::Result<()>>;

pub(crate) struct ExampleDef {
    pub(crate) description: String,
    pub(crate) body: ExampleBody,
}

/// One node of the test hierarchy
pub struct Scope {
    description: String,
    full_description: String,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    ambitious: bool,
    recorder: Option<Recorder>,
    record_hooks: RecordHooks,
    each_values: Vec<(String, Action)>,
    before_each: Vec<ScopeHook>,
    examples: Vec<ExampleDef>,
}

fn value_action<F>(action: F) -> Action
where
    F: Fn(&mut dyn Fixture) -> anyhow::Result<Value> + 'static,
{
    Rc::new(action)
}

fn setup_action<F>(action: F) -> Action
where
    F: Fn(&mut dyn Fixture) -> anyhow::Result<()> + 'static,
{
    Rc::new(move |fx: &mut dyn Fixture| {
        action(fx)?;
        Ok(Value::Nil)
    })
}

impl Scope {
    fn new(
        description: String,
        full_description: String,
        parent: Option<ScopeId>,
        ambitious: bool,
    ) -> Self {
        Self {
            description,
            full_description,
            parent,
            children: Vec::new(),
            ambitious,
            recorder: None,
            record_hooks: RecordHooks::default(),
            each_values: Vec::new(),
            before_each: Vec::new(),
            examples: Vec::new(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Descriptions of every scope from the root down to this one
    pub fn full_description(&self) -> &str {
        &self.full_description
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }

    pub fn recorder(&self) -> Option<&Recorder> {
        self.recorder.as_ref()
    }

    pub fn record_hooks(&self) -> &RecordHooks {
        &self.record_hooks
    }

    pub fn is_ambitious(&self) -> bool {
        self.ambitious
    }

    fn recorder_mut(&mut self) -> &mut Recorder {
        let label = &self.full_description;
        self.recorder.get_or_insert_with(|| Recorder::new(label.as_str()))
    }

    /// Named setup run once for the whole scope (`let_once`)
    pub fn declare_once_value<F>(&mut self, name: &str, action: F) -> Result<(), OnceError>
    where
        F: Fn(&mut dyn Fixture) -> anyhow::Result<Value> + 'static,
    {
        let recording = Recording::named(name, Some(value_action(action)))?;
        self.recorder_mut().declare(recording)
    }

    /// Anonymous setup run once for the whole scope (`before_once`)
    pub fn declare_once_setup<F>(&mut self, action: F) -> Result<(), OnceError>
    where
        F: Fn(&mut dyn Fixture) -> anyhow::Result<()> + 'static,
    {
        self.recorder_mut().declare(Recording::anonymous(setup_action(action)))
    }

    /// Once value that examples can also read as `subject`
    pub fn declare_subject_once<F>(
        &mut self,
        name: Option<&str>,
        action: F,
    ) -> Result<(), OnceError>
    where
        F: Fn(&mut dyn Fixture) -> anyhow::Result<Value> + 'static,
    {
        match name {
            Some(name) if name.trim() != "subject" => {
                self.declare_once_value(name, action)?;
                let target = name.trim().to_string();
                self.declare_once_value("subject", move |fx| Ok(fx.value(&target)?))
            }
            _ => self.declare_once_value("subject", action),
        }
    }

    /// Value memoized per example (`let`)
    pub fn let_each<F>(&mut self, name: &str, action: F) -> Result<(), OnceError>
    where
        F: Fn(&mut dyn Fixture) -> anyhow::Result<Value> + 'static,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(OnceError::Configuration("let_each declared without a name".to_string()));
        }
        if self.defines_each(name) {
            return Err(OnceError::Configuration(format!(
                "let_each `{name}` is already declared in `{}`",
                self.full_description
            )));
        }
        self.each_values.push((name.to_string(), value_action(action)));
        Ok(())
    }

    /// Setup run before every example of this scope and its descendants
    pub fn before_each<F>(&mut self, action: F) -> &mut Self
    where
        F: Fn(&mut dyn Fixture) -> anyhow::Result<()> + 'static,
    {
        self.before_each.push(Rc::new(action));
        self
    }

    /// `let_each`, or `declare_once_value` when the scope is ambitious
    pub fn let_value<F>(&mut self, name: &str, action: F) -> Result<(), OnceError>
    where
        F: Fn(&mut dyn Fixture) -> anyhow::Result<Value> + 'static,
    {
        if self.ambitious {
            self.declare_once_value(name, action)
        } else {
            self.let_each(name, action)
        }
    }

    /// `before_each`, or `declare_once_setup` when the scope is ambitious
    pub fn before<F>(&mut self, action: F) -> Result<(), OnceError>
    where
        F: Fn(&mut dyn Fixture) -> anyhow::Result<()> + 'static,
    {
        if self.ambitious {
            self.declare_once_setup(action)
        } else {
            self.before_each(action);
            Ok(())
        }
    }

    /// Route later `before`/`let_value` declarations here and in scopes
    /// added below afterwards to once-setup.
    pub fn ambitious(&mut self) -> &mut Self {
        self.set_ambitious(true)
    }

    pub fn set_ambitious(&mut self, ambitious: bool) -> &mut Self {
        self.ambitious = ambitious;
        self
    }

    pub fn before_record<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut dyn Fixture) -> anyhow::Result<()> + 'static,
    {
        self.record_hooks.before.push(Rc::new(hook));
        self
    }

    pub fn after_record<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut dyn Fixture) -> anyhow::Result<()> + 'static,
    {
        self.record_hooks.after.push(Rc::new(hook));
        self
    }

    /// Wrap the recordings of this scope's and its descendants' record
    /// passes. The hook gets a continuation it must call exactly once.
    pub fn around_record<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut dyn FnMut() -> anyhow::Result<()>) -> anyhow::Result<()> + 'static,
    {
        self.record_hooks.around.push(Rc::new(hook));
        self
    }

    pub fn example<F>(&mut self, description: impl Into<String>, body: F) -> &mut Self
    where
        F: Fn(&mut Example) -> anyhow::Result<()> + 'static,
    {
        self.examples.push(ExampleDef {
            description: description.into(),
            body: Rc::new(body),
        });
        self
    }

    pub fn example_count(&self) -> usize {
        self.examples.len()
    }

    pub(crate) fn examples(&self) -> &[ExampleDef] {
        &self.examples
    }

    pub(crate) fn defines_each(&self, name: &str) -> bool {
        self.each_values.iter().any(|(n, _)| n == name)
    }

    pub(crate) fn each_action(&self, name: &str) -> Option<&Action> {
        self.each_values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, action)| action)
    }

    pub(crate) fn before_each_hooks(&self) -> &[ScopeHook] {
        &self.before_each
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("description", &self.description)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("ambitious", &self.ambitious)
            .field("recorder", &self.recorder)
            .field("examples", &self.examples.len())
            .finish()
    }
}

/// Arena of scopes; the root is created with the tree
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub fn new(description: impl Into<String>, ambitious: bool) -> Self {
        let description = description.into();
        Self {
            scopes: vec![Scope::new(description.clone(), description, None, ambitious)],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Add a child scope; it starts out ambitious if its parent is.
    ///
    /// Panics if `parent` does not belong to this tree.
    pub fn add_scope(&mut self, parent: ScopeId, description: impl Into<String>) -> ScopeId {
        let description = description.into();
        let parent_scope = &self.scopes[parent.0];
        let full_description = format!("{} {}", parent_scope.full_description, description);
        let ambitious = parent_scope.ambitious;
        let id = ScopeId(self.scopes.len());
        self.scopes
            .push(Scope::new(description, full_description, Some(parent), ambitious));
        self.scopes[parent.0].children.push(id);
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    /// `id` and its ancestors, root first
    pub fn ancestry(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut chain = vec![id];
        let mut current = self.scope(id).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.scope(parent).parent;
        }
        chain.reverse();
        chain
    }

    /// Deepest scope at or above `id` that owns a recorder
    pub fn nearest_recorder(&self, id: ScopeId) -> Option<ScopeId> {
        self.ancestry(id)
            .into_iter()
            .rev()
            .find(|&scope| self.scope(scope).recorder.is_some())
    }

    /// Snapshots of every recorder strictly above `id`, root first
    pub fn inherited_snapshots(
        &self,
        id: ScopeId,
    ) -> Result<Vec<Rc<crate::codec::Snapshot>>, OnceError> {
        let mut ancestry = self.ancestry(id);
        ancestry.pop();
        ancestry
            .into_iter()
            .filter_map(|scope| self.scope(scope).recorder())
            .map(Recorder::snapshot)
            .collect()
    }

    /// Record hooks of `id` and its ancestors, root first
    pub fn record_hooks(&self, id: ScopeId) -> Vec<&RecordHooks> {
        self.ancestry(id)
            .into_iter()
            .map(|scope| &self.scope(scope).record_hooks)
            .collect()
    }

    /// Every scope in `id`'s subtree, `id` first, depth first
    pub fn subtree(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(scope) = stack.pop() {
            out.push(scope);
            stack.extend(self.scope(scope).children.iter().rev().copied());
        }
        out
    }
}
