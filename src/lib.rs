//! Once-per-scope fixture setup with record/replay.
//!
//! Expensive setup declared on a scope runs once, inside a nested
//! transaction. Its outcome is recorded as a [`Snapshot`] and replayed into a
//! fresh, identity-preserving copy for every test in the scope.

pub mod codec;
pub mod config;
pub mod data;
pub mod diff;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod logging;
pub mod record;
pub mod suite;
pub mod value;

pub use codec::{find_dump_error, ClassCodec, SerializationError, Snapshot};
pub use config::{configuration, configure, reset_configuration, Configuration, Settings};
pub use data::{
    NullResource, SqliteResource, TransactionError, TransactionGuard, TransactionalResource,
};
pub use error::OnceError;
pub use host::{Example, Outcome, Report, Scope, ScopeId};
pub use lifecycle::LifecycleAdapter;
pub use record::{Fixture, RecordEnv, Recorder, RecorderPhase, Recording, Tape};
pub use suite::Suite;
pub use value::{Object, ObjectId, Value};
