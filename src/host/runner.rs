use std::fmt;
use std::rc::Rc;

use super::example::Example;
use super::scope::{ExampleBody, ScopeId, ScopeTree};
use crate::error::OnceError;

/// Extension points a host exposes to the lifecycle adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ScopeEnter,
    TestEnter,
    TestExit,
    ScopeExit,
}

/// What a handler gets to see when its phase fires
pub struct HookContext<'a> {
    pub tree: &'a Rc<ScopeTree>,
    pub scope: ScopeId,
    pub example: Option<&'a mut Example>,
}

pub type Handler = Box<dyn FnMut(&mut HookContext<'_>) -> Result<(), OnceError>>;

/// A test runner the adapter can hook into. Handlers registered for the same
/// phase run in registration order.
pub trait Host {
    fn register(&mut self, phase: Phase, handler: Handler);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
    NotRun(String),
}

#[derive(Debug, Clone)]
pub struct ExampleReport {
    pub scope: ScopeId,
    pub description: String,
    pub outcome: Outcome,
}

/// Result of running a scope tree
#[derive(Debug, Default)]
pub struct Report {
    pub examples: Vec<ExampleReport>,
    pub errors: Vec<OnceError>,
    pub aborted: bool,
}

impl Report {
    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn not_run(&self) -> usize {
        self.count(|o| matches!(o, Outcome::NotRun(_)))
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.examples.iter().all(|e| e.outcome == Outcome::Passed)
    }

    /// Outcome of the first example with this description
    pub fn outcome(&self, description: &str) -> Option<&Outcome> {
        self.examples
            .iter()
            .find(|e| e.description == description)
            .map(|e| &e.outcome)
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.examples.iter().filter(|e| pred(&e.outcome)).count()
    }
}

/// Single-threaded runner: scopes depth first, a scope's own examples before
/// its children.
pub struct Runner {
    tree: Rc<ScopeTree>,
    handlers: Vec<(Phase, Handler)>,
    fail_fast: bool,
}

impl Runner {
    pub fn new(tree: Rc<ScopeTree>) -> Self {
        Self {
            tree,
            handlers: Vec::new(),
            fail_fast: false,
        }
    }

    /// Stop running examples after the first failure
    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    pub fn tree(&self) -> &Rc<ScopeTree> {
        &self.tree
    }

    pub fn run(&mut self) -> Report {
        let mut report = Report::default();
        let root = self.tree.root();
        self.run_scope(root, &mut report);
        tracing::debug!(
            passed = report.passed(),
            failed = report.failed(),
            not_run = report.not_run(),
            "suite finished"
        );
        report
    }

    fn fire(
        &mut self,
        phase: Phase,
        scope: ScopeId,
        example: Option<&mut Example>,
    ) -> Result<(), OnceError> {
        let tree = self.tree.clone();
        let mut ctx = HookContext {
            tree: &tree,
            scope,
            example,
        };
        for (registered, handler) in self.handlers.iter_mut() {
            if *registered == phase {
                handler(&mut ctx)?;
            }
        }
        Ok(())
    }

    fn run_scope(&mut self, id: ScopeId, report: &mut Report) {
        if report.aborted {
            self.skip_subtree(id, "run aborted", report);
            return;
        }
        let tree = self.tree.clone();
        let scope = tree.scope(id);
        tracing::debug!(scope = %scope.full_description(), "entering scope");

        match self.fire(Phase::ScopeEnter, id, None) {
            Ok(()) => {
                for def in scope.examples() {
                    if report.aborted {
                        report.examples.push(ExampleReport {
                            scope: id,
                            description: def.description.clone(),
                            outcome: Outcome::NotRun("run aborted".to_string()),
                        });
                        continue;
                    }
                    let outcome = self.run_example(id, &def.description, &def.body);
                    if self.fail_fast && matches!(outcome, Outcome::Failed(_)) {
                        report.aborted = true;
                    }
                    report.examples.push(ExampleReport {
                        scope: id,
                        description: def.description.clone(),
                        outcome,
                    });
                }
                for &child in scope.children() {
                    self.run_scope(child, report);
                }
            }
            Err(err) => {
                tracing::debug!(
                    scope = %scope.full_description(),
                    error = %err,
                    "scope setup failed"
                );
                self.skip_subtree(id, &err.to_string(), report);
                report.errors.push(err);
                if self.fail_fast {
                    report.aborted = true;
                }
            }
        }

        if let Err(err) = self.fire(Phase::ScopeExit, id, None) {
            tracing::warn!(
                scope = %scope.full_description(),
                error = %err,
                "scope teardown failed"
            );
            report.errors.push(err);
        }
    }

    fn run_example(&mut self, id: ScopeId, description: &str, body: &ExampleBody) -> Outcome {
        let tree = self.tree.clone();
        let mut example = Example::new(tree.clone(), id, description);

        let mut outcome = match self.fire(Phase::TestEnter, id, Some(&mut example)) {
            Ok(()) => Self::run_body(&tree, id, &mut example, body),
            Err(err) => Outcome::Failed(err.to_string()),
        };
        if let Err(err) = self.fire(Phase::TestExit, id, Some(&mut example)) {
            if outcome == Outcome::Passed {
                outcome = Outcome::Failed(err.to_string());
            }
        }
        outcome
    }

    fn run_body(
        tree: &ScopeTree,
        id: ScopeId,
        example: &mut Example,
        body: &ExampleBody,
    ) -> Outcome {
        for scope in tree.ancestry(id) {
            for hook in tree.scope(scope).before_each_hooks() {
                if let Err(err) = hook(example) {
                    return Outcome::Failed(format!("before_each: {err:#}"));
                }
            }
        }
        match body(example) {
            Ok(()) => Outcome::Passed,
            Err(err) => Outcome::Failed(format!("{err:#}")),
        }
    }

    fn skip_subtree(&self, id: ScopeId, reason: &str, report: &mut Report) {
        for scope in self.tree.subtree(id) {
            for def in self.tree.scope(scope).examples() {
                report.examples.push(ExampleReport {
                    scope,
                    description: def.description.clone(),
                    outcome: Outcome::NotRun(reason.to_string()),
                });
            }
        }
    }
}

impl Host for Runner {
    fn register(&mut self, phase: Phase, handler: Handler) {
        self.handlers.push((phase, handler));
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("handlers", &self.handlers.len())
            .field("fail_fast", &self.fail_fast)
            .finish()
    }
}
