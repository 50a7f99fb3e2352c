//! Error type for once-setup declaration, recording and replay

use thiserror::Error;

use crate::codec::SerializationError;
use crate::data::TransactionError;

#[derive(Error, Debug)]
pub enum OnceError {
    /// A declaration was missing its name or action, or clashed with another
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A recording or record hook failed; every test in the scope is skipped
    #[error("Once setup failed in `{scope}`: {message}")]
    SetupFailure { scope: String, message: String },
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error("Snapshot could not be restored: {0}")]
    Decode(String),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error("No once value named `{0}` is visible from this scope")]
    UnknownValue(String),
    #[error("Once value `{0}` depends on itself")]
    CyclicValue(String),
    #[error("Recorder for `{scope}` is {actual}, expected {expected}")]
    InvalidState {
        scope: String,
        actual: String,
        expected: String,
    },
}

impl OnceError {
    /// Wrap an error raised by user setup code.
    ///
    /// Errors that already are `OnceError`s (raised by a nested once value)
    /// pass through untouched so the innermost failure is the one reported.
    pub(crate) fn setup_failure(scope: &str, context: Option<&str>, err: anyhow::Error) -> Self {
        match err.downcast::<OnceError>() {
            Ok(inner) => inner,
            Err(err) => OnceError::SetupFailure {
                scope: scope.to_string(),
                message: match context {
                    Some(context) => format!("{context}: {err:#}"),
                    None => format!("{err:#}"),
                },
            },
        }
    }

    /// True for failures that abort a whole scope
    pub fn is_fatal_for_scope(&self) -> bool {
        matches!(
            self,
            OnceError::SetupFailure { .. }
                | OnceError::Serialization(_)
                | OnceError::Transaction(_)
                | OnceError::Decode(_)
        )
    }
}
