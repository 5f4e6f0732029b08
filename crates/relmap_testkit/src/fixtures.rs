//! Test fixtures and connection helpers.
//!
//! Provides ready-to-use connections with the sample tables created.

use crate::logging::init_tracing;
use crate::records::{Entry, Sample, Tag, User};
use relmap_core::{Config, Connection, Record, Registry, Workarea};
use relmap_store::{Context, RecordedStatement, RecordingStore, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A connection, a registry and a context, with every sample table
/// created.
pub struct TestConnection {
    /// Context for every call.
    pub ctx: Context,
    /// The connection.
    pub conn: Connection,
    /// Registry holding the sample record types.
    pub registry: Registry,
    recorder: Option<Arc<RecordingStore<SqliteStore>>>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestConnection {
    /// Creates a connection to a private in-memory database.
    pub fn memory() -> Self {
        let conn = Connection::open(Config::new()).expect("Failed to open in-memory database");
        Self::setup(conn, None, None)
    }

    /// Creates a connection to a database file in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("relmap.db");
        let conn = Connection::open(Config::new().url(path.to_string_lossy()))
            .expect("Failed to open file database");
        Self::setup(conn, None, Some(temp_dir))
    }

    /// Creates an in-memory connection that records every statement.
    ///
    /// Table creation is not part of the record.
    pub fn recording() -> Self {
        let store = Arc::new(RecordingStore::new(
            SqliteStore::open_in_memory().expect("Failed to open in-memory database"),
        ));
        let conn = Connection::new(Arc::clone(&store));
        let test = Self::setup(conn, Some(Arc::clone(&store)), None);
        store.clear();
        test
    }

    fn setup(
        conn: Connection,
        recorder: Option<Arc<RecordingStore<SqliteStore>>>,
        temp_dir: Option<TempDir>,
    ) -> Self {
        init_tracing();
        let registry = Registry::new();
        registry.register::<User>().expect("Invalid User schema");
        registry.register::<Tag>().expect("Invalid Tag schema");
        registry.register::<Sample>().expect("Invalid Sample schema");
        registry.register::<Entry>().expect("Invalid Entry schema");

        let ctx = Context::background();
        conn.create_tables(&ctx, &registry)
            .expect("Failed to create sample tables");

        Self {
            ctx,
            conn,
            registry,
            recorder,
            _temp_dir: temp_dir,
        }
    }

    /// A fresh workarea for `R`.
    pub fn workarea<R: Record>(&self) -> Workarea<R> {
        Workarea::new(&self.registry).expect("Failed to build workarea")
    }

    /// Statements recorded so far; empty unless built with
    /// [`TestConnection::recording`].
    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.recorder
            .as_ref()
            .map(|r| r.statements())
            .unwrap_or_default()
    }

    /// SQL text of the statements recorded so far.
    pub fn sql_log(&self) -> Vec<String> {
        self.statements().into_iter().map(|s| s.sql).collect()
    }

    /// Forgets the recorded statements.
    pub fn clear_log(&self) {
        if let Some(recorder) = &self.recorder {
            recorder.clear();
        }
    }

    /// Path of the database file, if file-based.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("relmap.db"))
    }
}

impl std::ops::Deref for TestConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

/// Runs a test with an in-memory connection.
pub fn with_test_conn<F, T>(f: F) -> T
where
    F: FnOnce(&TestConnection) -> T,
{
    let test = TestConnection::memory();
    f(&test)
}

/// Runs a test with a file-backed connection.
pub fn with_file_conn<F, T>(f: F) -> T
where
    F: FnOnce(&TestConnection) -> T,
{
    let test = TestConnection::file();
    f(&test)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_core::Database;

    #[test]
    fn memory_connection_has_sample_tables() {
        with_test_conn(|t| {
            assert_eq!(t.registry.tables().len(), 4);
            assert!(t.path().is_none());
        });
    }

    #[test]
    fn file_connection_creates_the_file() {
        with_file_conn(|t| {
            assert!(t.path().unwrap().exists());
        });
    }

    #[test]
    fn recording_starts_empty() {
        let t = TestConnection::recording();
        assert!(t.sql_log().is_empty());
        t.conn
            .executor()
            .execute_batch(&t.ctx, "SELECT 1")
            .unwrap();
        assert_eq!(t.sql_log(), vec!["SELECT 1".to_string()]);
        t.clear_log();
        assert!(t.statements().is_empty());
    }
}
