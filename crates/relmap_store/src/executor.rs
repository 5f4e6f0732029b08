//! Executor trait definition.

use crate::context::Context;
use crate::engine::Engine;
use crate::error::{StoreError, StoreResult};
use crate::row::Row;
use crate::value::Value;

/// Anything able to run parameterized SQL against a database.
///
/// Executors are **dumb pipes**. They run the text they are handed with
/// the positional arguments in order, and report engine failures with
/// the engine's native code. Transactions are driven from above by
/// issuing control statements through [`Executor::execute_batch`].
///
/// # Invariants
///
/// - `args[i]` binds placeholder number `i + 1`
/// - Every call honours `ctx` (cancellation and deadline) before running
/// - `query_row` fails with [`StoreError::NotFound`] when no row comes back
/// - Executors must be `Send + Sync`
///
/// # Implementors
///
/// - [`super::SqliteStore`] - SQLite
/// - [`super::RecordingStore`] - Statement-recording wrapper
pub trait Executor: Send + Sync {
    /// Returns the engine family of this executor.
    fn engine(&self) -> Engine;

    /// Executes a statement that returns no rows.
    ///
    /// Returns the number of rows affected.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is done or the engine rejects the
    /// statement.
    fn execute(&self, ctx: &Context, sql: &str, args: &[Value]) -> StoreResult<u64>;

    /// Runs a statement and collects every row it returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is done, the engine rejects the
    /// statement, or a column value cannot be converted.
    fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> StoreResult<Vec<Row>>;

    /// Runs a statement and returns its first row.
    ///
    /// # Errors
    ///
    /// Same as [`Executor::query`], plus [`StoreError::NotFound`] when the
    /// statement produced no rows.
    fn query_row(&self, ctx: &Context, sql: &str, args: &[Value]) -> StoreResult<Row> {
        self.query(ctx, sql, args)?
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound)
    }

    /// Executes one or more argument-free statements.
    ///
    /// Used for DDL and transaction control.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is done or the engine rejects the
    /// statements.
    fn execute_batch(&self, ctx: &Context, sql: &str) -> StoreResult<()>;

    /// Classifies `err` as a duplicate-key violation.
    fn is_duplicate_key(&self, err: &StoreError) -> bool {
        err.is_duplicate_key()
    }
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn engine(&self) -> Engine {
        (**self).engine()
    }

    fn execute(&self, ctx: &Context, sql: &str, args: &[Value]) -> StoreResult<u64> {
        (**self).execute(ctx, sql, args)
    }

    fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> StoreResult<Vec<Row>> {
        (**self).query(ctx, sql, args)
    }

    fn query_row(&self, ctx: &Context, sql: &str, args: &[Value]) -> StoreResult<Row> {
        (**self).query_row(ctx, sql, args)
    }

    fn execute_batch(&self, ctx: &Context, sql: &str) -> StoreResult<()> {
        (**self).execute_batch(ctx, sql)
    }

    fn is_duplicate_key(&self, err: &StoreError) -> bool {
        (**self).is_duplicate_key(err)
    }
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    fn engine(&self) -> Engine {
        (**self).engine()
    }

    fn execute(&self, ctx: &Context, sql: &str, args: &[Value]) -> StoreResult<u64> {
        (**self).execute(ctx, sql, args)
    }

    fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> StoreResult<Vec<Row>> {
        (**self).query(ctx, sql, args)
    }

    fn query_row(&self, ctx: &Context, sql: &str, args: &[Value]) -> StoreResult<Row> {
        (**self).query_row(ctx, sql, args)
    }

    fn execute_batch(&self, ctx: &Context, sql: &str) -> StoreResult<()> {
        (**self).execute_batch(ctx, sql)
    }

    fn is_duplicate_key(&self, err: &StoreError) -> bool {
        (**self).is_duplicate_key(err)
    }
}
