//! Error types for relmap core.

use crate::field::Kind;
use relmap_store::{Engine, Executor, StoreError};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in relmap core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A record type's schema definition is malformed or incomplete.
    #[error("schema error: {message}")]
    Schema {
        /// Description of the problem.
        message: String,
    },

    /// UPDATE or DELETE requested on a table with neither a primary key
    /// nor a unique key.
    #[error("table {table} has no primary or unique key; refusing to build an unkeyed statement")]
    NoKey {
        /// Table name.
        table: String,
    },

    /// A dialect rule was requested for an engine that lacks it.
    #[error("unsupported engine {engine}: {feature}")]
    UnsupportedEngine {
        /// The engine.
        engine: Engine,
        /// What was requested.
        feature: String,
    },

    /// A statement violated a primary or unique key.
    #[error("duplicate key in table {table}: {source}")]
    DuplicateKey {
        /// Table name.
        table: String,
        /// The classified store error.
        source: StoreError,
    },

    /// A statement that had to touch exactly one row touched none.
    #[error("no row found in table {table}")]
    NotFound {
        /// Table name.
        table: String,
    },

    /// A value did not fit the kind of the column it was meant for.
    #[error("column {column} expects {expected}, got {found}")]
    KindMismatch {
        /// Column name.
        column: String,
        /// Kind of the column.
        expected: Kind,
        /// Type of the offered value.
        found: &'static str,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// A lifecycle hook rejected the operation.
    #[error("hook failed: {message}")]
    Hook {
        /// Message from the hook.
        message: String,
    },

    /// Any other store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    /// Creates a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates a no-key error.
    pub fn no_key(table: impl Into<String>) -> Self {
        Self::NoKey {
            table: table.into(),
        }
    }

    /// Creates an unsupported engine error.
    pub fn unsupported_engine(engine: Engine, feature: impl Into<String>) -> Self {
        Self::UnsupportedEngine {
            engine,
            feature: feature.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a hook error.
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook {
            message: message.into(),
        }
    }

    /// Classifies a store error raised by a statement `executor` ran
    /// against `table`.
    ///
    /// Duplicate-key violations, as judged by the executor, become
    /// [`CoreError::DuplicateKey`] and "no rows" becomes
    /// [`CoreError::NotFound`]; everything else is wrapped as
    /// [`CoreError::Store`].
    pub fn from_statement(table: &str, err: StoreError, executor: &dyn Executor) -> Self {
        if executor.is_duplicate_key(&err) {
            Self::DuplicateKey {
                table: table.to_owned(),
                source: err,
            }
        } else if err.is_not_found() {
            Self::NotFound {
                table: table.to_owned(),
            }
        } else {
            Self::Store(err)
        }
    }

    /// Whether this error is a primary-key or unique-key violation.
    ///
    /// Independent of the engine that raised it.
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            Self::DuplicateKey { .. } => true,
            Self::Store(err) => err.is_duplicate_key(),
            _ => false,
        }
    }

    /// Whether this error means an expected row was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Store(err) => err.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_store::{ErrorCode, SqliteStore};

    fn unique_violation() -> StoreError {
        StoreError::Database {
            code: ErrorCode::SqlState("23505".into()),
            message: "duplicate".into(),
        }
    }

    #[test]
    fn statement_errors_are_classified() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            CoreError::from_statement("users", unique_violation(), &store),
            CoreError::DuplicateKey { .. }
        ));
        assert!(matches!(
            CoreError::from_statement("users", StoreError::NotFound, &store),
            CoreError::NotFound { .. }
        ));
        assert!(matches!(
            CoreError::from_statement("users", StoreError::Cancelled, &store),
            CoreError::Store(StoreError::Cancelled)
        ));
    }

    #[test]
    fn duplicate_predicate_sees_through_store_wrapper() {
        assert!(CoreError::Store(unique_violation()).is_duplicate_key());
        assert!(!CoreError::no_key("users").is_duplicate_key());
    }

    #[test]
    fn messages_name_the_table() {
        let msg = CoreError::no_key("users").to_string();
        assert!(msg.contains("users"));
    }
}
