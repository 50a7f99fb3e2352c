//! A scope tree wired to the lifecycle adapter and ready to run

use std::rc::Rc;
use std::sync::Arc;

use crate::config::{self, Configuration};
use crate::data::{NullResource, TransactionalResource};
use crate::host::{Report, Runner, Scope, ScopeId, ScopeTree};
use crate::lifecycle::LifecycleAdapter;
use crate::record::RecordEnv;

/// Builder for a tree of scopes plus everything needed to run it
pub struct Suite {
    tree: ScopeTree,
    config: Arc<Configuration>,
    resource: Arc<dyn TransactionalResource>,
    fail_fast: bool,
}

impl Suite {
    /// New suite using the current global configuration and no database
    pub fn new(description: impl Into<String>) -> Self {
        let config = config::configuration();
        let ambitious = config.settings().ambitious;
        Self {
            tree: ScopeTree::new(description, ambitious),
            config,
            resource: Arc::new(NullResource::new()),
            fail_fast: false,
        }
    }

    /// Use `config` instead of the global configuration.
    ///
    /// Its `ambitious` setting applies to the root and to scopes added
    /// afterwards.
    pub fn with_config(mut self, config: Arc<Configuration>) -> Self {
        let root = self.tree.root();
        self.tree
            .scope_mut(root)
            .set_ambitious(config.settings().ambitious);
        self.config = config;
        self
    }

    pub fn with_resource(mut self, resource: Arc<dyn TransactionalResource>) -> Self {
        self.resource = resource;
        self
    }

    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    pub fn root(&self) -> ScopeId {
        self.tree.root()
    }

    pub fn scope(&mut self, id: ScopeId) -> &mut Scope {
        self.tree.scope_mut(id)
    }

    pub fn add_scope(&mut self, parent: ScopeId, description: impl Into<String>) -> ScopeId {
        self.tree.add_scope(parent, description)
    }

    pub fn tree(&self) -> &ScopeTree {
        &self.tree
    }

    pub fn config(&self) -> &Arc<Configuration> {
        &self.config
    }

    /// Run every example. Scopes left suspended (a scope-exit that never
    /// fired) are reset before this returns.
    pub fn run(self) -> Report {
        let tree = Rc::new(self.tree);
        let mut runner = Runner::new(tree.clone()).fail_fast(self.fail_fast);
        let env = RecordEnv::new(self.config, self.resource);
        let adapter = LifecycleAdapter::install(&mut runner, env);

        tracing::debug!(scopes = tree.len(), "running suite");
        let mut report = runner.run();
        if let Err(err) = adapter.resume_outstanding() {
            report.errors.push(err);
        }
        report
    }
}

impl std::fmt::Debug for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suite")
            .field("tree", &self.tree)
            .field("config", &self.config)
            .field("fail_fast", &self.fail_fast)
            .finish()
    }
}
