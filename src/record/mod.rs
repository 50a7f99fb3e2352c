//! Record/replay engine for once-per-scope setup
//!
//! A [`Recorder`] runs a scope's [`Recording`]s once against a [`Tape`],
//! keeps the resulting [`Snapshot`](crate::codec::Snapshot) and rebuilds a
//! fresh copy of that state for every test in the scope.

mod hooks;
mod recorder;
mod recording;
mod tape;

pub use hooks::{AroundHook, RecordHooks, ScopeHook};
pub use recorder::{RecordEnv, Recorder, RecorderPhase};
pub use recording::{Action, Recording};
pub use tape::Tape;

use crate::error::OnceError;
use crate::value::Value;

/// State that setup code reads and writes: a Tape while recording, an
/// example while a test runs.
pub trait Fixture {
    /// Value declared under `name`, evaluating it first if needed
    fn value(&mut self, name: &str) -> Result<Value, OnceError>;

    /// Plain field set by setup code
    fn field(&self, name: &str) -> Option<Value>;

    fn set_field(&mut self, name: &str, value: Value);
}
