//! Per-engine SQL rules.
//!
//! Every function here is a lookup keyed by [`Engine`]. Engines without
//! a rule fail with [`CoreError::UnsupportedEngine`] instead of guessing.

use crate::error::{CoreError, CoreResult};
use crate::field::{Kind, ScalarKind};
use crate::schema::DefaultExpr;
use relmap_store::Engine;

/// Quotes an identifier with the engine's convention.
///
/// Embedded double quotes are doubled.
pub fn quote_identifier(engine: Engine, name: &str) -> CoreResult<String> {
    match engine {
        Engine::Sqlite | Engine::Cockroach => Ok(format!("\"{}\"", name.replace('"', "\"\""))),
        Engine::SqlServer => Err(CoreError::unsupported_engine(engine, "identifier quoting")),
    }
}

/// Returns the text of positional placeholder `index` (1-based).
pub fn placeholder(engine: Engine, index: usize) -> CoreResult<String> {
    match engine {
        Engine::Sqlite => Ok(format!("?{index}")),
        Engine::Cockroach => Ok(format!("${index}")),
        Engine::SqlServer => Err(CoreError::unsupported_engine(engine, "placeholders")),
    }
}

/// Returns the column type used for fields of `kind`.
///
/// Nullability is expressed by the column constraint, not the type.
pub fn sql_type(engine: Engine, kind: Kind) -> CoreResult<&'static str> {
    let ty = match (engine, kind.scalar()) {
        (Engine::Sqlite, ScalarKind::Text) => "TEXT",
        (Engine::Sqlite, ScalarKind::Integer | ScalarKind::BigInt | ScalarKind::Bool) => "INTEGER",
        (Engine::Sqlite, ScalarKind::Double) => "REAL",
        (Engine::Sqlite, ScalarKind::Timestamp) => "TEXT",

        (Engine::Cockroach, ScalarKind::Text) => "TEXT",
        (Engine::Cockroach, ScalarKind::Integer) => "INT4",
        (Engine::Cockroach, ScalarKind::BigInt) => "INT8",
        (Engine::Cockroach, ScalarKind::Bool) => "BOOL",
        (Engine::Cockroach, ScalarKind::Double) => "FLOAT8",
        (Engine::Cockroach, ScalarKind::Timestamp) => "TIMESTAMPTZ",

        (Engine::SqlServer, _) => {
            return Err(CoreError::unsupported_engine(engine, "column types"));
        }
    };
    Ok(ty)
}

/// Returns the `DEFAULT` expression for `expr`, or `None` for no default.
pub fn default_expr(engine: Engine, expr: DefaultExpr) -> CoreResult<Option<&'static str>> {
    let sql = match (engine, expr) {
        (_, DefaultExpr::None) => return Ok(None),
        // SQLite only accepts function calls in DEFAULT when parenthesized.
        (Engine::Sqlite, DefaultExpr::NewUuid) => "(gen_random_uuid())",
        (Engine::Sqlite, DefaultExpr::Now) => "current_timestamp",
        (Engine::Cockroach, DefaultExpr::NewUuid) => "gen_random_uuid()",
        (Engine::Cockroach, DefaultExpr::Now) => "current_timestamp()",
        (Engine::SqlServer, _) => {
            return Err(CoreError::unsupported_engine(engine, "default expressions"));
        }
    };
    Ok(Some(sql))
}

/// Statement that opens a root transaction.
pub fn begin(engine: Engine) -> CoreResult<String> {
    control(engine, "BEGIN")
}

/// Statement that commits the root transaction.
pub fn commit(engine: Engine) -> CoreResult<String> {
    control(engine, "COMMIT")
}

/// Statement that rolls back the root transaction.
pub fn rollback(engine: Engine) -> CoreResult<String> {
    control(engine, "ROLLBACK")
}

/// Statement that opens savepoint `name`.
pub fn savepoint(engine: Engine, name: &str) -> CoreResult<String> {
    Ok(format!("SAVEPOINT {}", quote_identifier(engine, name)?))
}

/// Statement that releases savepoint `name`.
pub fn release_savepoint(engine: Engine, name: &str) -> CoreResult<String> {
    Ok(format!("RELEASE SAVEPOINT {}", quote_identifier(engine, name)?))
}

/// Statement that undoes everything since savepoint `name`.
pub fn rollback_to_savepoint(engine: Engine, name: &str) -> CoreResult<String> {
    Ok(format!("ROLLBACK TO SAVEPOINT {}", quote_identifier(engine, name)?))
}

fn control(engine: Engine, keyword: &str) -> CoreResult<String> {
    match engine {
        Engine::Sqlite | Engine::Cockroach => Ok(keyword.to_owned()),
        Engine::SqlServer => Err(CoreError::unsupported_engine(engine, "transaction control")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote_identifier(Engine::Sqlite, "users").unwrap(), "\"users\"");
        assert_eq!(quote_identifier(Engine::Cockroach, "a\"b").unwrap(), "\"a\"\"b\"");
    }

    #[test]
    fn sqlserver_is_declared_but_unsupported() {
        assert!(matches!(
            quote_identifier(Engine::SqlServer, "t"),
            Err(CoreError::UnsupportedEngine { .. })
        ));
        assert!(default_expr(Engine::SqlServer, DefaultExpr::Now).is_err());
        assert!(sql_type(Engine::SqlServer, Kind::new(ScalarKind::Text)).is_err());
        assert!(begin(Engine::SqlServer).is_err());
        assert!(placeholder(Engine::SqlServer, 1).is_err());
    }

    #[test]
    fn placeholders_per_engine() {
        assert_eq!(placeholder(Engine::Sqlite, 3).unwrap(), "?3");
        assert_eq!(placeholder(Engine::Cockroach, 3).unwrap(), "$3");
    }

    #[test]
    fn sqlite_type_table() {
        let ty = |s| sql_type(Engine::Sqlite, Kind::new(s)).unwrap();
        assert_eq!(ty(ScalarKind::Text), "TEXT");
        assert_eq!(ty(ScalarKind::Integer), "INTEGER");
        assert_eq!(ty(ScalarKind::BigInt), "INTEGER");
        assert_eq!(ty(ScalarKind::Bool), "INTEGER");
        assert_eq!(ty(ScalarKind::Double), "REAL");
        assert_eq!(ty(ScalarKind::Timestamp), "TEXT");
        // nullable kinds map to the same type
        assert_eq!(
            sql_type(Engine::Sqlite, Kind::nullable(ScalarKind::Double)).unwrap(),
            "REAL"
        );
    }

    #[test]
    fn cockroach_type_table() {
        let ty = |s| sql_type(Engine::Cockroach, Kind::new(s)).unwrap();
        assert_eq!(ty(ScalarKind::BigInt), "INT8");
        assert_eq!(ty(ScalarKind::Timestamp), "TIMESTAMPTZ");
    }

    #[test]
    fn default_expressions() {
        assert_eq!(default_expr(Engine::Sqlite, DefaultExpr::None).unwrap(), None);
        assert_eq!(
            default_expr(Engine::Sqlite, DefaultExpr::NewUuid).unwrap(),
            Some("(gen_random_uuid())")
        );
        assert_eq!(
            default_expr(Engine::Cockroach, DefaultExpr::Now).unwrap(),
            Some("current_timestamp()")
        );
    }

    #[test]
    fn savepoint_statements() {
        assert_eq!(savepoint(Engine::Sqlite, "sp_1").unwrap(), "SAVEPOINT \"sp_1\"");
        assert_eq!(
            release_savepoint(Engine::Sqlite, "sp_1").unwrap(),
            "RELEASE SAVEPOINT \"sp_1\""
        );
        assert_eq!(
            rollback_to_savepoint(Engine::Cockroach, "sp_1").unwrap(),
            "ROLLBACK TO SAVEPOINT \"sp_1\""
        );
        assert_eq!(commit(Engine::Sqlite).unwrap(), "COMMIT");
        assert_eq!(rollback(Engine::Sqlite).unwrap(), "ROLLBACK");
    }
}
