//! Binds record / replay / reset to a host's scope and test phases
//!
//! Each scope with once-setup gets one suspended future, `{ record; wait;
//! reset }`. Entering the scope polls it up to the wait; leaving the scope
//! resumes it. A future still waiting when the adapter goes away is resumed
//! then, innermost scope first, so transactions are always released.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use futures::task::noop_waker;
use futures::FutureExt;

use crate::data::TransactionGuard;
use crate::error::OnceError;
use crate::host::{HookContext, Host, Phase, ScopeId, ScopeTree};
use crate::record::RecordEnv;

struct Suspended {
    resume: oneshot::Sender<()>,
    future: ScopeFuture,
}

struct AdapterState {
    env: RecordEnv,
    /// Scopes in the order they were entered
    outstanding: Vec<(ScopeId, Suspended)>,
    /// Savepoints of running examples when examples are transactional
    example_guards: HashMap<ScopeId, TransactionGuard>,
}

/// Handle to the adapter installed on a host
pub struct LifecycleAdapter {
    state: Rc<RefCell<AdapterState>>,
}

type ScopeFuture = LocalBoxFuture<'static, Result<(), OnceError>>;

fn poll_once(future: &mut ScopeFuture) -> Poll<Result<(), OnceError>> {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    future.poll_unpin(&mut cx)
}

impl LifecycleAdapter {
    /// Register scope-enter, test-enter, test-exit and scope-exit handlers
    pub fn install(host: &mut dyn Host, env: RecordEnv) -> Self {
        let state = Rc::new(RefCell::new(AdapterState {
            env,
            outstanding: Vec::new(),
            example_guards: HashMap::new(),
        }));
        let adapter = Self { state };

        let handle = adapter.share();
        host.register(
            Phase::ScopeEnter,
            Box::new(move |ctx: &mut HookContext<'_>| handle.enter(ctx.tree, ctx.scope)),
        );
        let handle = adapter.share();
        host.register(
            Phase::TestEnter,
            Box::new(move |ctx: &mut HookContext<'_>| handle.test_enter(ctx)),
        );
        let handle = adapter.share();
        host.register(
            Phase::TestExit,
            Box::new(move |ctx: &mut HookContext<'_>| handle.test_exit(ctx.scope)),
        );
        let handle = adapter.share();
        host.register(
            Phase::ScopeExit,
            Box::new(move |ctx: &mut HookContext<'_>| handle.exit(ctx.scope)),
        );
        adapter
    }

    fn share(&self) -> Handle {
        Handle {
            state: self.state.clone(),
        }
    }

    /// Record `scope` and leave it suspended until [`exit`](Self::exit)
    pub fn enter(&self, tree: &Rc<ScopeTree>, scope: ScopeId) -> Result<(), OnceError> {
        self.share().enter(tree, scope)
    }

    /// Resume the scope's suspended future so it resets
    pub fn exit(&self, scope: ScopeId) -> Result<(), OnceError> {
        self.share().exit(scope)
    }

    /// Scopes recorded but not yet reset, outermost first
    pub fn outstanding(&self) -> Vec<ScopeId> {
        self.state.borrow().outstanding.iter().map(|(id, _)| *id).collect()
    }

    /// Reset every scope still suspended, innermost first. All of them are
    /// resumed even if one fails; the first failure is returned.
    pub fn resume_outstanding(&self) -> Result<(), OnceError> {
        let handle = self.share();
        let mut first_error = None;
        loop {
            let Some(scope) = self.state.borrow().outstanding.last().map(|(id, _)| *id) else {
                break;
            };
            tracing::debug!(scope = scope.index(), "resuming abandoned scope");
            if let Err(err) = handle.exit(scope) {
                tracing::warn!(
                    scope = scope.index(),
                    error = %err,
                    "failed to reset abandoned scope"
                );
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for LifecycleAdapter {
    fn drop(&mut self) {
        if let Err(err) = self.resume_outstanding() {
            tracing::warn!(error = %err, "scope reset failed during adapter shutdown");
        }
    }
}

/// Shared view handed to the host's handlers
struct Handle {
    state: Rc<RefCell<AdapterState>>,
}

impl Handle {
    fn enter(&self, tree: &Rc<ScopeTree>, scope: ScopeId) -> Result<(), OnceError> {
        if tree.scope(scope).recorder().is_none() {
            return Ok(());
        }
        if self.state.borrow().outstanding.iter().any(|(id, _)| *id == scope) {
            return Err(OnceError::InvalidState {
                scope: tree.scope(scope).full_description().to_string(),
                actual: "suspended".to_string(),
                expected: "idle".to_string(),
            });
        }

        let (resume, resumed) = oneshot::channel::<()>();
        let env = self.state.borrow().env.clone();
        let tree = tree.clone();
        let mut future = async move {
            record_scope(&tree, scope, &env)?;
            // A dropped sender resumes as well.
            let _ = resumed.await;
            reset_scope(&tree, scope, &env)
        }
        .boxed_local();

        match poll_once(&mut future) {
            Poll::Pending => {
                self.state
                    .borrow_mut()
                    .outstanding
                    .push((scope, Suspended { resume, future }));
                Ok(())
            }
            Poll::Ready(result) => result,
        }
    }

    fn exit(&self, scope: ScopeId) -> Result<(), OnceError> {
        let suspended = {
            let mut state = self.state.borrow_mut();
            match state.outstanding.iter().rposition(|(id, _)| *id == scope) {
                Some(index) => state.outstanding.remove(index).1,
                None => return Ok(()),
            }
        };
        let Suspended { resume, mut future } = suspended;
        let _ = resume.send(());
        match poll_once(&mut future) {
            Poll::Ready(result) => result,
            Poll::Pending => Err(OnceError::InvalidState {
                scope: format!("scope #{}", scope.index()),
                actual: "suspended".to_string(),
                expected: "closed".to_string(),
            }),
        }
    }

    fn test_enter(&self, ctx: &mut HookContext<'_>) -> Result<(), OnceError> {
        let env = self.state.borrow().env.clone();
        if env.config.settings().transactional_examples {
            let guard = TransactionGuard::begin(env.resource.clone())?;
            self.state.borrow_mut().example_guards.insert(ctx.scope, guard);
        }

        let tree = ctx.tree;
        let Some(owner) = tree.nearest_recorder(ctx.scope) else {
            return Ok(());
        };
        let Some(recorder) = tree.scope(owner).recorder() else {
            return Ok(());
        };
        let inherited = tree.inherited_snapshots(owner)?;
        let restored = recorder.replay(&inherited, &env)?;
        if let Some(example) = ctx.example.as_deref_mut() {
            example.inject(restored);
        }
        Ok(())
    }

    fn test_exit(&self, scope: ScopeId) -> Result<(), OnceError> {
        let guard = self.state.borrow_mut().example_guards.remove(&scope);
        match guard {
            Some(guard) => Ok(guard.rollback()?),
            None => Ok(()),
        }
    }
}

fn record_scope(tree: &ScopeTree, scope: ScopeId, env: &RecordEnv) -> Result<(), OnceError> {
    let Some(recorder) = tree.scope(scope).recorder() else {
        return Ok(());
    };
    let inherited = tree.inherited_snapshots(scope)?;
    let hooks = tree.record_hooks(scope);
    recorder.record(&inherited, &hooks, env)
}

fn reset_scope(tree: &ScopeTree, scope: ScopeId, env: &RecordEnv) -> Result<(), OnceError> {
    match tree.scope(scope).recorder() {
        Some(recorder) => recorder.reset(env),
        None => Ok(()),
    }
}
