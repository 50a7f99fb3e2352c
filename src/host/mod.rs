//! Minimal single-threaded test host
//!
//! A tree of scopes with examples, per-example values and hooks, plus a
//! runner that fires the phases the lifecycle adapter binds to.

mod example;
mod runner;
mod scope;

pub use example::Example;
pub use runner::{ExampleReport, Handler, HookContext, Host, Outcome, Phase, Report, Runner};
pub use scope::{Scope, ScopeId, ScopeTree};
