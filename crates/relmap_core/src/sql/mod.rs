//! SQL generation.
//!
//! [`dialect`] holds the per-engine rules: identifier quoting,
//! placeholders, column types, default expressions and transaction
//! control. [`builder`] turns a table description plus a record's
//! fields into DDL and DML statements using those rules. Nothing here
//! talks to a database.

pub mod builder;
pub mod dialect;

pub use builder::{create_table, delete, insert, update};

use relmap_store::Value;

/// A generated statement ready to be sent to an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Positional arguments, in placeholder order.
    pub args: Vec<Value>,
    /// Indices (into the table's columns) of the values the statement
    /// returns, in `RETURNING` order. Empty when nothing is returned.
    pub returning: Vec<usize>,
}

impl Statement {
    /// Whether executing the statement yields a row to scan.
    #[must_use]
    pub fn has_returning(&self) -> bool {
        !self.returning.is_empty()
    }
}

/// Options for table creation.
///
/// # Example
///
/// ```rust
/// use relmap_core::CreateTableOptions;
///
/// let opts = CreateTableOptions::new().drop_if_exists(true);
/// assert!(opts.if_not_exists);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTableOptions {
    /// Emit `CREATE TABLE IF NOT EXISTS`.
    pub if_not_exists: bool,
    /// Drop the table first.
    pub drop_if_exists: bool,
}

impl Default for CreateTableOptions {
    fn default() -> Self {
        Self {
            if_not_exists: true,
            drop_if_exists: false,
        }
    }
}

impl CreateTableOptions {
    /// `IF NOT EXISTS`, no drop.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `if_not_exists`.
    #[must_use]
    pub const fn if_not_exists(mut self, value: bool) -> Self {
        self.if_not_exists = value;
        self
    }

    /// Sets `drop_if_exists`.
    #[must_use]
    pub const fn drop_if_exists(mut self, value: bool) -> Self {
        self.drop_if_exists = value;
        self
    }
}
