//! Snapshot encoding, restore and serialization diagnostics
//!
//! Snapshots are plain serde data (JSON on the wire) describing a value graph
//! with an explicit object table, so shared references and cycles survive the
//! round trip.

mod classes;
mod diagnose;
mod restore;
mod snapshot;

pub use classes::{ClassCodec, ClassRegistry};
pub use diagnose::{find_dump_error, SerializationError};
pub use restore::{restore, Restored};
pub use snapshot::{Body, Node, Snapshot};

pub(crate) use snapshot::SnapshotBuilder;
