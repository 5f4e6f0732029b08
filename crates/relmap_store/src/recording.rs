//! Statement-recording executor for tests.

use crate::context::Context;
use crate::engine::Engine;
use crate::error::{StoreError, StoreResult};
use crate::executor::Executor;
use crate::row::Row;
use crate::value::Value;
use parking_lot::Mutex;

/// A statement seen by a [`RecordingStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    /// SQL text as sent.
    pub sql: String,
    /// Positional arguments in binding order.
    pub args: Vec<Value>,
}

/// An executor wrapper that records every statement before forwarding it.
///
/// Statements are recorded even when the inner executor rejects them, so
/// tests can assert on exactly what was sent.
///
/// # Example
///
/// ```rust
/// use relmap_store::{Context, Executor, RecordingStore, SqliteStore};
///
/// let store = RecordingStore::new(SqliteStore::open_in_memory().unwrap());
/// store.execute_batch(&Context::background(), "SELECT 1").unwrap();
/// assert_eq!(store.sql_log(), vec!["SELECT 1".to_string()]);
/// ```
#[derive(Debug)]
pub struct RecordingStore<E> {
    inner: E,
    log: Mutex<Vec<RecordedStatement>>,
}

impl<E: Executor> RecordingStore<E> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Returns a copy of every recorded statement, oldest first.
    #[must_use]
    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.log.lock().clone()
    }

    /// Returns only the SQL text of every recorded statement.
    #[must_use]
    pub fn sql_log(&self) -> Vec<String> {
        self.log.lock().iter().map(|s| s.sql.clone()).collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.log.lock().clear();
    }

    /// Returns the wrapped executor.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    fn record(&self, sql: &str, args: &[Value]) {
        self.log.lock().push(RecordedStatement {
            sql: sql.to_owned(),
            args: args.to_vec(),
        });
    }
}

impl<E: Executor> Executor for RecordingStore<E> {
    fn engine(&self) -> Engine {
        self.inner.engine()
    }

    fn execute(&self, ctx: &Context, sql: &str, args: &[Value]) -> StoreResult<u64> {
        self.record(sql, args);
        self.inner.execute(ctx, sql, args)
    }

    fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> StoreResult<Vec<Row>> {
        self.record(sql, args);
        self.inner.query(ctx, sql, args)
    }

    fn query_row(&self, ctx: &Context, sql: &str, args: &[Value]) -> StoreResult<Row> {
        self.record(sql, args);
        self.inner.query_row(ctx, sql, args)
    }

    fn execute_batch(&self, ctx: &Context, sql: &str) -> StoreResult<()> {
        self.record(sql, &[]);
        self.inner.execute_batch(ctx, sql)
    }

    fn is_duplicate_key(&self, err: &StoreError) -> bool {
        self.inner.is_duplicate_key(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;

    #[test]
    fn records_in_order_with_arguments() {
        let store = RecordingStore::new(SqliteStore::open_in_memory().unwrap());
        let ctx = Context::background();

        store.execute_batch(&ctx, "CREATE TABLE t (v INTEGER)").unwrap();
        store
            .execute(&ctx, "INSERT INTO t (v) VALUES (?1)", &[Value::Integer(3)])
            .unwrap();

        let log = store.statements();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].args, vec![Value::Integer(3)]);
    }

    #[test]
    fn failed_statements_are_still_recorded() {
        let store = RecordingStore::new(SqliteStore::open_in_memory().unwrap());
        let ctx = Context::background();

        assert!(store.execute_batch(&ctx, "NOT SQL").is_err());
        assert_eq!(store.sql_log(), vec!["NOT SQL".to_string()]);

        store.clear();
        assert!(store.statements().is_empty());
    }
}
