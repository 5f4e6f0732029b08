//! Backing engine identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL engine family a connection talks to.
///
/// The engine decides quoting, placeholders, column types and default
/// expressions. `SqlServer` is declared so configurations can name it,
/// but no dialect rules exist for it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// SQLite 3.35 or newer (needs `RETURNING`).
    Sqlite,
    /// CockroachDB and other Postgres-compatible engines.
    Cockroach,
    /// Microsoft SQL Server (reserved).
    SqlServer,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sqlite => "sqlite",
            Self::Cockroach => "cockroach",
            Self::SqlServer => "sqlserver",
        };
        f.write_str(name)
    }
}
