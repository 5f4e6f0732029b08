//! SQLite executor.

use crate::context::Context;
use crate::engine::Engine;
use crate::error::StoreResult;
use crate::executor::Executor;
use crate::row::Row;
use crate::value::Value;
use parking_lot::Mutex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;
use uuid::Uuid;

/// An executor backed by a single SQLite connection.
///
/// The connection is guarded by a mutex, so a store can be shared across
/// threads; statements from different threads are serialized.
///
/// On open the store registers a `gen_random_uuid()` SQL function that
/// returns a random v4 UUID as text. SQLite has no built-in equivalent
/// and the mapper's UUID column default relies on it.
///
/// Booleans are stored as `0`/`1` and timestamps as RFC 3339 text.
///
/// # Example
///
/// ```rust
/// use relmap_store::{Context, Executor, SqliteStore};
///
/// let store = SqliteStore::open_in_memory().unwrap();
/// let row = store
///     .query_row(&Context::background(), "SELECT gen_random_uuid()", &[])
///     .unwrap();
/// assert_eq!(row.get(0).and_then(|v| v.as_text()).map(str::len), Some(36));
/// ```
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or configured.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(busy_timeout)?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wraps an already opened connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the helper functions cannot be registered.
    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        register_functions(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "gen_random_uuid",
        0,
        FunctionFlags::SQLITE_UTF8,
        |_ctx: &rusqlite::functions::Context<'_>| Ok(Uuid::new_v4().to_string()),
    )
}

impl Executor for SqliteStore {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    fn execute(&self, ctx: &Context, sql: &str, args: &[Value]) -> StoreResult<u64> {
        ctx.check()?;
        trace!(sql, args = args.len(), "sqlite execute");
        let conn = self.conn.lock();
        let affected = conn.execute(sql, params_from_iter(args.iter()))?;
        Ok(affected as u64)
    }

    fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> StoreResult<Vec<Row>> {
        ctx.check()?;
        trace!(sql, args = args.len(), "sqlite query");
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
            .into();

        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(Value::from_sqlite(row.get_ref(i)?)?);
            }
            result.push(Row::new(Arc::clone(&columns), values));
        }

        Ok(result)
    }

    fn execute_batch(&self, ctx: &Context, sql: &str) -> StoreResult<()> {
        ctx.check()?;
        trace!(sql, "sqlite batch");
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                &Context::background(),
                "CREATE TABLE t (k TEXT PRIMARY KEY, n INTEGER, f REAL, b INTEGER, ts TEXT)",
            )
            .unwrap();
        store
    }

    #[test]
    fn insert_and_read_back() {
        let store = store();
        let ctx = Context::background();
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let affected = store
            .execute(
                &ctx,
                "INSERT INTO t (k, n, f, b, ts) VALUES (?1, ?2, ?3, ?4, ?5)",
                &[
                    Value::from("a"),
                    Value::Integer(42),
                    Value::Double(2.5),
                    Value::Bool(true),
                    Value::Timestamp(ts),
                ],
            )
            .unwrap();
        assert_eq!(affected, 1);

        let row = store
            .query_row(&ctx, "SELECT k, n, f, b, ts FROM t WHERE k = ?1", &[Value::from("a")])
            .unwrap();
        assert_eq!(row.get_by_name("n"), Some(&Value::Integer(42)));
        assert_eq!(row.get_by_name("f"), Some(&Value::Double(2.5)));
        // booleans come back in storage form
        assert_eq!(row.get_by_name("b"), Some(&Value::Integer(1)));
        let stored = row.get_by_name("ts").and_then(Value::as_text).unwrap();
        assert_eq!(crate::parse_timestamp(stored).unwrap(), ts);
    }

    #[test]
    fn query_row_on_empty_result_is_not_found() {
        let store = store();
        let err = store
            .query_row(&Context::background(), "SELECT k FROM t", &[])
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn duplicate_primary_key_is_classified() {
        let store = store();
        let ctx = Context::background();
        let sql = "INSERT INTO t (k) VALUES (?1)";
        store.execute(&ctx, sql, &[Value::from("dup")]).unwrap();

        let err = store.execute(&ctx, sql, &[Value::from("dup")]).unwrap_err();
        assert!(err.is_duplicate_key());
        assert!(store.is_duplicate_key(&err));
    }

    #[test]
    fn returning_clause_yields_rows() {
        let store = store();
        let row = store
            .query_row(
                &Context::background(),
                "INSERT INTO t (k, n) VALUES (?1, ?2) RETURNING n",
                &[Value::from("r"), Value::Integer(7)],
            )
            .unwrap();
        assert_eq!(row.get(0), Some(&Value::Integer(7)));
    }

    #[test]
    fn cancelled_context_is_honoured() {
        let store = store();
        let ctx = Context::background();
        ctx.cancel();
        let err = store.execute_batch(&ctx, "SELECT 1").unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
    }

    #[test]
    fn gen_random_uuid_is_unique() {
        let store = store();
        let ctx = Context::background();
        let a = store.query_row(&ctx, "SELECT gen_random_uuid()", &[]).unwrap();
        let b = store.query_row(&ctx, "SELECT gen_random_uuid()", &[]).unwrap();
        assert_ne!(a.get(0), b.get(0));
    }

    #[test]
    fn file_database_persists_between_opens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        let ctx = Context::background();

        {
            let store = SqliteStore::open(&path, Duration::from_secs(1)).unwrap();
            store.execute_batch(&ctx, "CREATE TABLE p (v TEXT)").unwrap();
            store
                .execute(&ctx, "INSERT INTO p (v) VALUES (?1)", &[Value::from("kept")])
                .unwrap();
        }

        let store = SqliteStore::open(&path, Duration::from_secs(1)).unwrap();
        let rows = store.query(&ctx, "SELECT v FROM p", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(0), Some(&Value::from("kept")));
    }
}
