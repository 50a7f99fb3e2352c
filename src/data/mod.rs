//! Transactional resources wrapped around once-setup
//!
//! Each recording scope opens one nested transaction (a savepoint) before it
//! records and rolls it back once its tests are done.

mod sqlite;
mod transaction;

pub use sqlite::SqliteResource;
pub use transaction::{
    NullResource, TransactionError, TransactionGuard, TransactionToken, TransactionalResource,
};
