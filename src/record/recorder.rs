use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use super::hooks::{run_around, AroundHook, RecordHooks};
use super::recording::Recording;
use super::tape::Tape;
use crate::codec::{restore, Restored, Snapshot};
use crate::config::Configuration;
use crate::data::{TransactionGuard, TransactionalResource};
use crate::error::OnceError;

/// Shared by every Recorder of one suite run
#[derive(Clone)]
pub struct RecordEnv {
    pub config: Arc<Configuration>,
    pub resource: Arc<dyn TransactionalResource>,
}

impl RecordEnv {
    pub fn new(config: Arc<Configuration>, resource: Arc<dyn TransactionalResource>) -> Self {
        Self { config, resource }
    }
}

impl fmt::Debug for RecordEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordEnv").field("config", &self.config).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderPhase {
    #[default]
    Idle,
    Recording,
    Ready,
    Resetting,
    Closed,
}

impl fmt::Display for RecorderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecorderPhase::Idle => "idle",
            RecorderPhase::Recording => "recording",
            RecorderPhase::Ready => "ready",
            RecorderPhase::Resetting => "resetting",
            RecorderPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Default)]
struct Runtime {
    phase: RecorderPhase,
    snapshot: Option<Rc<Snapshot>>,
    guard: Option<TransactionGuard>,
    failure: Option<String>,
}

/// Once-setup of a single scope: its recordings plus the state of its one
/// record pass.
pub struct Recorder {
    scope: String,
    recordings: Vec<Recording>,
    runtime: RefCell<Runtime>,
}

impl Recorder {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            recordings: Vec::new(),
            runtime: RefCell::new(Runtime::default()),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Append a recording. Named recordings must be unique within a scope.
    pub fn declare(&mut self, recording: Recording) -> Result<(), OnceError> {
        if let Some(name) = recording.name() {
            if self.declares(name) {
                return Err(OnceError::Configuration(format!(
                    "once value `{name}` is already declared in `{}`",
                    self.scope
                )));
            }
        }
        self.recordings.push(recording);
        Ok(())
    }

    /// Whether this scope declares a once value called `name`
    pub fn declares(&self, name: &str) -> bool {
        self.recordings.iter().any(|r| r.name() == Some(name))
    }

    pub fn recordings(&self) -> &[Recording] {
        &self.recordings
    }

    pub fn phase(&self) -> RecorderPhase {
        self.runtime.borrow().phase
    }

    /// Message of the failure that closed this recorder, if any
    pub fn failure(&self) -> Option<String> {
        self.runtime.borrow().failure.clone()
    }

    /// Snapshot produced by the record pass
    pub fn snapshot(&self) -> Result<Rc<Snapshot>, OnceError> {
        let runtime = self.runtime.borrow();
        match (&runtime.snapshot, runtime.phase) {
            (Some(snapshot), RecorderPhase::Ready) => Ok(snapshot.clone()),
            (_, actual) => Err(self.invalid_state(actual, RecorderPhase::Ready)),
        }
    }

    /// Run the record pass.
    ///
    /// `inherited` are the snapshots of the ancestor recorders, root first;
    /// `hooks` the record hooks of every scope from the root down to this one.
    /// On failure the transaction is rolled back and the recorder is closed.
    pub fn record(
        &self,
        inherited: &[Rc<Snapshot>],
        hooks: &[&RecordHooks],
        env: &RecordEnv,
    ) -> Result<(), OnceError> {
        let actual = self.phase();
        if actual != RecorderPhase::Idle {
            return Err(self.invalid_state(actual, RecorderPhase::Idle));
        }
        self.runtime.borrow_mut().phase = RecorderPhase::Recording;
        tracing::debug!(scope = %self.scope, inherited = inherited.len(), "recording once setup");

        let guard = match TransactionGuard::begin(env.resource.clone()) {
            Ok(guard) => guard,
            Err(err) => return Err(self.close_with(OnceError::from(err))),
        };

        match self.run_pass(inherited, hooks, env) {
            Ok(snapshot) => {
                tracing::debug!(
                    scope = %self.scope,
                    objects = snapshot.object_count(),
                    "recorded once setup"
                );
                let mut runtime = self.runtime.borrow_mut();
                runtime.snapshot = Some(Rc::new(snapshot));
                runtime.guard = Some(guard);
                runtime.phase = RecorderPhase::Ready;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = guard.rollback() {
                    tracing::warn!(
                        scope = %self.scope,
                        error = %rollback_err,
                        "rollback after failed record pass failed"
                    );
                }
                Err(self.close_with(err))
            }
        }
    }

    fn run_pass(
        &self,
        inherited: &[Rc<Snapshot>],
        hooks: &[&RecordHooks],
        env: &RecordEnv,
    ) -> Result<Snapshot, OnceError> {
        let classes = env.config.classes();
        let mut tape = Tape::inheriting(self.scope.as_str(), inherited, classes)?;
        let hook_failure = |stage: &str, err: anyhow::Error| {
            OnceError::setup_failure(&self.scope, Some(stage), err)
        };

        for hook in env.config.before_record_hooks() {
            hook(&mut tape).map_err(|err| hook_failure("before_record hook", err))?;
        }
        for scope_hooks in hooks {
            for hook in &scope_hooks.before {
                hook(&mut tape).map_err(|err| hook_failure("before_record hook", err))?;
            }
        }

        let around: Vec<AroundHook> = hooks
            .iter()
            .flat_map(|scope_hooks| scope_hooks.around.iter().cloned())
            .collect();
        let recordings = &self.recordings;
        run_around(&around, &mut || {
            tape.execute(recordings).map_err(anyhow::Error::from)
        })
        .map_err(|err| hook_failure("around_record hook", err))?;

        for scope_hooks in hooks.iter().rev() {
            for hook in &scope_hooks.after {
                hook(&mut tape).map_err(|err| hook_failure("after_record hook", err))?;
            }
        }
        for hook in env.config.after_record_hooks() {
            hook(&mut tape).map_err(|err| hook_failure("after_record hook", err))?;
        }

        tape.snapshot(classes)
    }

    /// Rebuild this scope's state for one test: the ancestors' snapshots
    /// (root first) overlaid with this recorder's own.
    pub fn replay(
        &self,
        inherited: &[Rc<Snapshot>],
        env: &RecordEnv,
    ) -> Result<Restored, OnceError> {
        let own = self.snapshot()?;
        let mut chain: Vec<&Snapshot> = inherited.iter().map(Rc::as_ref).collect();
        chain.push(&own);
        let restored = restore(&chain, env.config.classes())?;
        tracing::trace!(
            scope = %self.scope,
            fields = restored.fields.len(),
            named_results = restored.named_results.len(),
            "replayed once setup"
        );
        Ok(restored)
    }

    /// Roll the scope back once its tests are done.
    ///
    /// Reset hooks that fail are logged; the first failure is returned after
    /// the rollback has happened regardless.
    pub fn reset(&self, env: &RecordEnv) -> Result<(), OnceError> {
        let guard = {
            let mut runtime = self.runtime.borrow_mut();
            match runtime.phase {
                RecorderPhase::Ready => {}
                RecorderPhase::Idle | RecorderPhase::Closed => {
                    runtime.phase = RecorderPhase::Closed;
                    return Ok(());
                }
                actual => return Err(self.invalid_state(actual, RecorderPhase::Ready)),
            }
            runtime.phase = RecorderPhase::Resetting;
            runtime.snapshot = None;
            runtime.guard.take()
        };
        tracing::debug!(scope = %self.scope, "resetting once setup");

        let mut first_error = None;
        for hook in env.config.before_reset_hooks() {
            if let Err(err) = hook() {
                tracing::warn!(scope = %self.scope, error = %err, "before_reset hook failed");
                first_error.get_or_insert_with(|| {
                    OnceError::setup_failure(&self.scope, Some("before_reset hook"), err)
                });
            }
        }
        if let Some(guard) = guard {
            if let Err(err) = guard.rollback() {
                tracing::warn!(scope = %self.scope, error = %err, "rollback failed");
                first_error.get_or_insert(OnceError::from(err));
            }
        }
        for hook in env.config.after_reset_hooks() {
            if let Err(err) = hook() {
                tracing::warn!(scope = %self.scope, error = %err, "after_reset hook failed");
                first_error.get_or_insert_with(|| {
                    OnceError::setup_failure(&self.scope, Some("after_reset hook"), err)
                });
            }
        }

        self.runtime.borrow_mut().phase = RecorderPhase::Closed;
        first_error.map_or(Ok(()), Err)
    }

    fn close_with(&self, err: OnceError) -> OnceError {
        tracing::debug!(scope = %self.scope, error = %err, "once setup failed");
        let mut runtime = self.runtime.borrow_mut();
        runtime.phase = RecorderPhase::Closed;
        runtime.failure = Some(err.to_string());
        err
    }

    fn invalid_state(&self, actual: RecorderPhase, expected: RecorderPhase) -> OnceError {
        OnceError::InvalidState {
            scope: self.scope.clone(),
            actual: actual.to_string(),
            expected: expected.to_string(),
        }
    }
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("scope", &self.scope)
            .field("recordings", &self.recordings)
            .field("phase", &self.phase())
            .finish()
    }
}
