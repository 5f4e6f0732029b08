//! Connection handle.

use super::{Database, PendingFreeze, Transaction};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::registry::Registry;
use relmap_store::{Context, Engine, Executor, SqliteStore};
use std::fmt;
use tracing::debug;

/// A database connection.
///
/// Statements run directly against a connection are not part of any
/// transaction, and records written through it are frozen as soon as
/// the statement succeeds.
///
/// # Example
///
/// ```rust
/// use relmap_core::{Config, Connection};
/// use relmap_store::Context;
///
/// let conn = Connection::open(Config::new()).unwrap();
/// let tx = conn.begin(&Context::background()).unwrap();
/// tx.commit(&Context::background()).unwrap();
/// ```
pub struct Connection {
    executor: Box<dyn Executor>,
    config: Config,
}

impl Connection {
    /// Opens a connection as described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedEngine`] for engines without a
    /// linked driver (anything but SQLite); wrap an external executor with
    /// [`Connection::new`] for those. Returns a store error if the
    /// database cannot be opened.
    pub fn open(config: Config) -> CoreResult<Self> {
        let store = match config.engine {
            Engine::Sqlite if config.is_in_memory() => SqliteStore::open_in_memory()?,
            Engine::Sqlite => SqliteStore::open(&config.url, config.busy_timeout)?,
            other => {
                return Err(CoreError::unsupported_engine(
                    other,
                    "no driver linked; wrap an executor with Connection::new",
                ));
            }
        };
        debug!(engine = %config.engine, url = %config.url, "opened connection");
        Ok(Self {
            executor: Box::new(store),
            config,
        })
    }

    /// Wraps an executor with the default configuration.
    ///
    /// The engine is the executor's own.
    pub fn new(executor: impl Executor + 'static) -> Self {
        Self::with_config(executor, Config::default())
    }

    /// Wraps an executor with `config`.
    ///
    /// `config.engine` is overwritten with the executor's engine.
    pub fn with_config(executor: impl Executor + 'static, mut config: Config) -> Self {
        config.engine = executor.engine();
        Self {
            executor: Box::new(executor),
            config,
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Starts a root transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if `BEGIN` fails.
    pub fn begin(&self, ctx: &Context) -> CoreResult<Transaction<'_>> {
        Transaction::root(ctx, self)
    }

    /// Creates every table known to `registry`, honouring
    /// [`Config::create_if_not_exists`](Config#structfield.create_if_not_exists).
    ///
    /// # Errors
    ///
    /// Stops at the first table that cannot be created.
    pub fn create_tables(&self, ctx: &Context, registry: &Registry) -> CoreResult<()> {
        registry.create_tables(ctx, self, &self.config.table_options())
    }
}

impl Database for Connection {
    fn engine(&self) -> Engine {
        self.executor.engine()
    }

    fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    fn within_transaction(&self) -> bool {
        false
    }

    fn defer_freeze(&self, pending: Box<dyn PendingFreeze>) {
        pending.freeze();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("engine", &self.executor.engine())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_store::RecordingStore;
    use tempfile::tempdir;

    #[test]
    fn open_in_memory_sqlite() {
        let conn = Connection::open(Config::new()).unwrap();
        assert_eq!(conn.engine(), Engine::Sqlite);
        assert!(!conn.within_transaction());
    }

    #[test]
    fn open_file_sqlite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.db");
        let config = Config::new().url(path.to_string_lossy());
        let conn = Connection::open(config).unwrap();
        conn.executor()
            .execute_batch(&Context::background(), "CREATE TABLE t (v TEXT)")
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn engines_without_driver_are_unsupported() {
        for engine in [Engine::Cockroach, Engine::SqlServer] {
            let err = Connection::open(Config::new().engine(engine)).unwrap_err();
            assert!(matches!(err, CoreError::UnsupportedEngine { .. }));
        }
    }

    #[test]
    fn wrapped_executor_sets_engine() {
        let store = RecordingStore::new(SqliteStore::open_in_memory().unwrap());
        let conn = Connection::with_config(store, Config::new().engine(Engine::Cockroach));
        assert_eq!(conn.config().engine, Engine::Sqlite);
    }
}
