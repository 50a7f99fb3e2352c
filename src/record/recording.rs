use std::fmt;
use std::rc::Rc;

use super::Fixture;
use crate::error::OnceError;
use crate::value::Value;

/// Deferred setup code. Anonymous recordings return `Value::Nil`.
pub type Action = Rc<dyn Fn(&mut dyn Fixture) -> anyhow::Result<Value>>;

/// One unit of once-per-scope setup
#[derive(Clone)]
pub struct Recording {
    name: Option<String>,
    action: Action,
}

impl Recording {
    /// Setup run for its side effects only
    pub fn anonymous(action: Action) -> Self {
        Self { name: None, action }
    }

    /// Setup whose result is cached under `name`
    pub fn named(name: &str, action: Option<Action>) -> Result<Self, OnceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OnceError::Configuration(
                "once value declared without a name".to_string(),
            ));
        }
        let action = action.ok_or_else(|| {
            OnceError::Configuration(format!("once value `{name}` declared without a block"))
        })?;
        Ok(Self {
            name: Some(name.to_string()),
            action,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn action(&self) -> &Action {
        &self.action
    }
}

impl fmt::Debug for Recording {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recording").field("name", &self.name).finish()
    }
}
