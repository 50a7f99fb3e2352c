//! Nested transactions around once-setup

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Lock poisoned")]
    LockPoisoned,
    #[error("Rollback of `{requested}` while `{innermost}` is still open")]
    OutOfOrder { requested: String, innermost: String },
    #[error("No transaction is open")]
    NotOpen,
}

/// Handle for one open nested transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionToken {
    depth: usize,
    name: String,
}

impl TransactionToken {
    pub fn new(depth: usize, name: impl Into<String>) -> Self {
        Self {
            depth,
            name: name.into(),
        }
    }

    /// 1 for the outermost transaction
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Something that can open and undo nested transactions (savepoints).
///
/// Tokens must be rolled back innermost first.
pub trait TransactionalResource {
    fn begin_nested(&self) -> Result<TransactionToken, TransactionError>;
    fn rollback(&self, token: TransactionToken) -> Result<(), TransactionError>;
}

/// Resource for suites whose setup touches no database.
///
/// Still tracks nesting so misuse shows up the same way it would against a
/// real database.
#[derive(Debug, Default)]
pub struct NullResource {
    open: RefCell<Vec<TransactionToken>>,
}

impl NullResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.open.borrow().len()
    }
}

impl TransactionalResource for NullResource {
    fn begin_nested(&self) -> Result<TransactionToken, TransactionError> {
        let mut open = self.open.borrow_mut();
        let depth = open.len() + 1;
        let token = TransactionToken::new(depth, format!("null_{depth}"));
        open.push(token.clone());
        Ok(token)
    }

    fn rollback(&self, token: TransactionToken) -> Result<(), TransactionError> {
        let mut open = self.open.borrow_mut();
        match open.last() {
            Some(innermost) if *innermost == token => {
                open.pop();
                Ok(())
            }
            Some(innermost) => Err(TransactionError::OutOfOrder {
                requested: token.name,
                innermost: innermost.name.clone(),
            }),
            None => Err(TransactionError::NotOpen),
        }
    }
}

/// Open nested transaction that is rolled back exactly once.
///
/// Rollback normally happens through [`TransactionGuard::rollback`]; a guard
/// dropped while still open rolls back as well and logs any failure.
pub struct TransactionGuard {
    resource: Arc<dyn TransactionalResource>,
    token: Option<TransactionToken>,
}

impl TransactionGuard {
    pub fn begin(resource: Arc<dyn TransactionalResource>) -> Result<Self, TransactionError> {
        let token = resource.begin_nested()?;
        tracing::debug!(
            savepoint = token.name(),
            depth = token.depth(),
            "began nested transaction"
        );
        Ok(Self {
            resource,
            token: Some(token),
        })
    }

    pub fn depth(&self) -> usize {
        self.token.as_ref().map_or(0, TransactionToken::depth)
    }

    pub fn rollback(mut self) -> Result<(), TransactionError> {
        let token = self.token.take().ok_or(TransactionError::NotOpen)?;
        tracing::debug!(
            savepoint = token.name(),
            depth = token.depth(),
            "rolling back nested transaction"
        );
        self.resource.rollback(token)
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            let name = token.name().to_string();
            if let Err(err) = self.resource.rollback(token) {
                tracing::warn!(
                    savepoint = %name,
                    error = %err,
                    "failed to roll back abandoned transaction"
                );
            }
        }
    }
}

impl fmt::Debug for TransactionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionGuard")
            .field("token", &self.token)
            .finish()
    }
}
