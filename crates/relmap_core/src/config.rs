//! Connection configuration.

use crate::sql::CreateTableOptions;
use relmap_store::Engine;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for [`Connection::open`](crate::Connection::open).
///
/// Can be built in code or deserialized; missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database engine.
    pub engine: Engine,

    /// Where the database lives. For SQLite a file path, or `:memory:`
    /// for a private in-memory database.
    pub url: String,

    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout: Duration,

    /// Prefix of generated savepoint names.
    pub savepoint_prefix: String,

    /// Whether table creation uses `IF NOT EXISTS`.
    pub create_if_not_exists: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: Engine::Sqlite,
            url: ":memory:".to_owned(),
            busy_timeout: Duration::from_secs(5),
            savepoint_prefix: "sp".to_owned(),
            create_if_not_exists: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the engine.
    #[must_use]
    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    /// Sets the database location.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the busy timeout.
    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets the savepoint name prefix.
    #[must_use]
    pub fn savepoint_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.savepoint_prefix = prefix.into();
        self
    }

    /// Sets whether table creation uses `IF NOT EXISTS`.
    #[must_use]
    pub fn create_if_not_exists(mut self, value: bool) -> Self {
        self.create_if_not_exists = value;
        self
    }

    /// Table creation options implied by this configuration.
    #[must_use]
    pub fn table_options(&self) -> CreateTableOptions {
        CreateTableOptions::new().if_not_exists(self.create_if_not_exists)
    }

    pub(crate) fn is_in_memory(&self) -> bool {
        self.url.is_empty() || self.url == ":memory:"
    }
}
