use std::fmt;
use std::rc::Rc;

use super::Fixture;

/// Scope-level hook run with the Tape (or example) as context
pub type ScopeHook = Rc<dyn Fn(&mut dyn Fixture) -> anyhow::Result<()>>;

/// Hook wrapped around the recordings of a record pass. It must call the
/// continuation exactly once.
pub type AroundHook = Rc<dyn Fn(&mut dyn FnMut() -> anyhow::Result<()>) -> anyhow::Result<()>>;

/// Record hooks declared on one scope; they also apply to every record pass
/// below it.
#[derive(Clone, Default)]
pub struct RecordHooks {
    pub(crate) before: Vec<ScopeHook>,
    pub(crate) after: Vec<ScopeHook>,
    pub(crate) around: Vec<AroundHook>,
}

impl RecordHooks {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty() && self.around.is_empty()
    }
}

impl fmt::Debug for RecordHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordHooks")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("around", &self.around.len())
            .finish()
    }
}

/// Run `body` inside `hooks`, first hook outermost
pub(crate) fn run_around(
    hooks: &[AroundHook],
    body: &mut dyn FnMut() -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let Some((outer, rest)) = hooks.split_first() else {
        return body();
    };
    let mut ran = false;
    outer(&mut || {
        if ran {
            anyhow::bail!("around_record hook ran the recordings twice");
        }
        ran = true;
        run_around(rest, &mut *body)
    })?;
    if !ran {
        anyhow::bail!("around_record hook never ran the recordings");
    }
    Ok(())
}
