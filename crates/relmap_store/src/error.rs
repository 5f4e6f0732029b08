//! Error types for statement execution.

use std::fmt;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// SQLite primary result code for constraint violations.
const SQLITE_CONSTRAINT: i32 = 19;
/// SQLite extended code for a PRIMARY KEY violation.
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
/// SQLite extended code for a UNIQUE violation.
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;
/// SQLSTATE for `unique_violation` in the Postgres family.
const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";

/// Native error code reported by a backing engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    /// SQLite result code pair.
    Sqlite {
        /// Primary result code (low byte of the extended code).
        primary: i32,
        /// Extended result code.
        extended: i32,
    },
    /// Five character SQLSTATE (Postgres, CockroachDB).
    SqlState(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite { primary, extended } => write!(f, "sqlite:{primary}/{extended}"),
            Self::SqlState(state) => write!(f, "sqlstate:{state}"),
        }
    }
}

/// Errors reported by an [`crate::Executor`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The engine rejected the statement.
    #[error("database error ({code}): {message}")]
    Database {
        /// Engine specific code.
        code: ErrorCode,
        /// Message reported by the engine.
        message: String,
    },

    /// A single-row query produced no rows.
    #[error("no rows returned")]
    NotFound,

    /// The call's context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The call's context deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A value could not be converted between the engine and [`crate::Value`].
    #[error("conversion error: {message}")]
    Conversion {
        /// Description of the failed conversion.
        message: String,
    },

    /// Any other driver failure.
    #[error("driver error: {message}")]
    Driver {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a conversion error.
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    /// Creates a driver error.
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Returns the engine error code, if the engine reported one.
    #[must_use]
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            Self::Database { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether this error is a primary-key or unique-key violation.
    ///
    /// Recognizes SQLSTATE `23505` and SQLite's constraint code with the
    /// PRIMARY KEY or UNIQUE extended code. The answer does not depend on
    /// which engine produced the error.
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        match self.code() {
            Some(ErrorCode::Sqlite { primary, extended }) => {
                *primary == SQLITE_CONSTRAINT
                    && (*extended == SQLITE_CONSTRAINT_PRIMARYKEY
                        || *extended == SQLITE_CONSTRAINT_UNIQUE)
            }
            Some(ErrorCode::SqlState(state)) => state == SQLSTATE_UNIQUE_VIOLATION,
            None => false,
        }
    }

    /// Whether this error means "no row".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                let extended = failure.extended_code;
                Self::Database {
                    code: ErrorCode::Sqlite {
                        primary: extended & 0xff,
                        extended,
                    },
                    message: message.unwrap_or_else(|| failure.to_string()),
                }
            }
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound,
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::Utf8Error(..) => Self::conversion(err.to_string()),
            other => Self::driver(other.to_string()),
        }
    }
}
