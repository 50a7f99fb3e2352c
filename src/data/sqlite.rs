//! SQLite as the transactional resource

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::transaction::{TransactionError, TransactionToken, TransactionalResource};

const SAVEPOINT_PREFIX: &str = "scope_once";

/// SQLite connection whose once-setup runs inside savepoints.
///
/// The outermost savepoint implicitly opens the database transaction; every
/// nested scope adds one more. Rolling back to a savepoint and releasing it
/// discards everything written since it was taken.
#[derive(Clone)]
pub struct SqliteResource {
    conn: Arc<Mutex<Connection>>,
    open: Arc<parking_lot::Mutex<Vec<String>>>,
    /// Path to the database file, `None` for in-memory databases
    pub path: Option<PathBuf>,
}

impl SqliteResource {
    /// Open or create a database file
    pub fn open(path: &Path) -> Result<Self, TransactionError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, TransactionError> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    pub fn from_connection(
        conn: Connection,
        path: Option<PathBuf>,
    ) -> Result<Self, TransactionError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            open: Arc::new(parking_lot::Mutex::new(Vec::new())),
            path,
        })
    }

    /// Get a reference to the connection (for fixture stores)
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    /// Execute a closure with the connection
    pub fn with_connection<F, T>(&self, f: F) -> Result<T, TransactionError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| TransactionError::LockPoisoned)?;
        f(&conn).map_err(TransactionError::Sqlite)
    }

    /// Number of savepoints currently open
    pub fn depth(&self) -> usize {
        self.open.lock().len()
    }
}

impl TransactionalResource for SqliteResource {
    fn begin_nested(&self) -> Result<TransactionToken, TransactionError> {
        let mut open = self.open.lock();
        let depth = open.len() + 1;
        let name = format!("{SAVEPOINT_PREFIX}_{depth}");
        self.with_connection(|conn| conn.execute_batch(&format!("SAVEPOINT {name};")))?;
        open.push(name.clone());
        Ok(TransactionToken::new(depth, name))
    }

    fn rollback(&self, token: TransactionToken) -> Result<(), TransactionError> {
        let mut open = self.open.lock();
        match open.last() {
            Some(innermost) if innermost == token.name() => {}
            Some(innermost) => {
                return Err(TransactionError::OutOfOrder {
                    requested: token.name().to_string(),
                    innermost: innermost.clone(),
                })
            }
            None => return Err(TransactionError::NotOpen),
        }
        let name = token.name();
        self.with_connection(|conn| {
            conn.execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};"
            ))
        })?;
        open.pop();
        Ok(())
    }
}

impl std::fmt::Debug for SqliteResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteResource")
            .field("path", &self.path)
            .field("depth", &self.depth())
            .finish()
    }
}
