//! Per-type schema registry.

use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::schema::{Schema, SchemaBuilder, TableDef};
use crate::sql::{self, CreateTableOptions};
use crate::transaction::Database;
use parking_lot::RwLock;
use relmap_store::Context;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

type AnySchema = Arc<dyn Any + Send + Sync>;

/// Builds and caches the schema of each record type.
///
/// A type's schema is built on first request, exactly once even when
/// several threads ask at the same time, and shared afterwards. The
/// registry also remembers the order in which tables were registered so
/// they can be created in that order.
///
/// # Example
///
/// ```rust
/// use relmap_core::{ColumnAttrs, Field, Record, Registry, SchemaBuilder};
///
/// #[derive(Default)]
/// struct Note {
///     id: Field<i64>,
/// }
///
/// impl Record for Note {
///     fn define(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
///         schema
///             .table("notes")
///             .column("id", |n| &n.id, |n| &mut n.id, ColumnAttrs::new().primary_key())
///     }
/// }
///
/// let registry = Registry::new();
/// let first = registry.schema::<Note>().unwrap();
/// let again = registry.schema::<Note>().unwrap();
/// assert!(std::sync::Arc::ptr_eq(&first, &again));
/// ```
#[derive(Default)]
pub struct Registry {
    schemas: RwLock<HashMap<TypeId, AnySchema>>,
    tables: RwLock<Vec<Arc<TableDef>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the schema of `R`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Schema`] if `R`'s definition is invalid. A
    /// failed build is not cached; the next call tries again.
    pub fn schema<R: Record>(&self) -> CoreResult<Arc<Schema<R>>> {
        let key = TypeId::of::<R>();
        if let Some(found) = self.schemas.read().get(&key) {
            return downcast(Arc::clone(found));
        }

        let mut schemas = self.schemas.write();
        // another thread may have built it while we waited
        if let Some(found) = schemas.get(&key) {
            return downcast(Arc::clone(found));
        }

        let schema = Arc::new(R::define(SchemaBuilder::new()).build()?);
        trace!(
            table = schema.name(),
            columns = schema.table().columns().len(),
            "registered record type"
        );
        schemas.insert(key, Arc::clone(&schema) as AnySchema);
        self.tables.write().push(schema.table_def());
        Ok(schema)
    }

    /// Builds `R`'s schema now instead of on first use.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::schema`].
    pub fn register<R: Record>(&self) -> CoreResult<()> {
        self.schema::<R>().map(|_| ())
    }

    /// Every registered table, in registration order.
    #[must_use]
    pub fn tables(&self) -> Vec<Arc<TableDef>> {
        self.tables.read().clone()
    }

    /// Creates every registered table, in registration order.
    ///
    /// # Errors
    ///
    /// Stops at the first table that cannot be created.
    pub fn create_tables(&self, ctx: &Context, db: &dyn Database, options: &CreateTableOptions) -> CoreResult<()> {
        for table in self.tables() {
            create_table(ctx, db, &table, options)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.tables.read().iter().map(|t| t.name().to_owned()).collect();
        f.debug_struct("Registry").field("tables", &names).finish()
    }
}

fn downcast<R: Record>(schema: AnySchema) -> CoreResult<Arc<Schema<R>>> {
    schema
        .downcast::<Schema<R>>()
        .map_err(|_| CoreError::schema(format!("registry entry for {} has the wrong type", std::any::type_name::<R>())))
}

/// Runs the `CREATE TABLE` script for `table` against `db`.
pub(crate) fn create_table(
    ctx: &Context,
    db: &dyn Database,
    table: &TableDef,
    options: &CreateTableOptions,
) -> CoreResult<()> {
    let script = sql::create_table(db.engine(), table, options)?;
    debug!(table = table.name(), sql = %script, "creating table");
    let executor = db.executor();
    executor
        .execute_batch(ctx, &script)
        .map_err(|e| CoreError::from_statement(table.name(), e, executor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::schema::ColumnAttrs;
    use crate::transaction::Connection;
    use relmap_store::SqliteStore;
    use std::thread;

    #[derive(Default)]
    struct Author {
        id: Field<i64>,
        name: Field<String>,
    }

    impl Record for Author {
        fn define(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
            schema
                .table("authors")
                .column("id", |a| &a.id, |a| &mut a.id, ColumnAttrs::new().primary_key())
                .column("name", |a| &a.name, |a| &mut a.name, ColumnAttrs::new())
        }
    }

    #[derive(Default)]
    struct Book {
        isbn: Field<String>,
    }

    impl Record for Book {
        fn define(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
            schema
                .table("books")
                .column("isbn", |b| &b.isbn, |b| &mut b.isbn, ColumnAttrs::new().unique_key())
        }
    }

    #[derive(Default)]
    struct Nameless {
        x: Field<bool>,
    }

    impl Record for Nameless {
        fn define(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
            schema.column("x", |n| &n.x, |n| &mut n.x, ColumnAttrs::new())
        }
    }

    #[test]
    fn schema_is_built_once_across_threads() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.schema::<Author>().unwrap())
            })
            .collect();
        let schemas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for schema in &schemas[1..] {
            assert!(Arc::ptr_eq(&schemas[0], schema));
        }
        assert_eq!(registry.tables().len(), 1);
    }

    #[test]
    fn tables_keep_registration_order() {
        let registry = Registry::new();
        registry.register::<Book>().unwrap();
        registry.register::<Author>().unwrap();
        registry.register::<Book>().unwrap();
        let names: Vec<_> = registry.tables().iter().map(|t| t.name().to_owned()).collect();
        assert_eq!(names, vec!["books", "authors"]);
    }

    #[test]
    fn invalid_definition_is_reported_and_not_cached() {
        let registry = Registry::new();
        assert!(matches!(registry.schema::<Nameless>(), Err(CoreError::Schema { .. })));
        assert!(registry.schema::<Nameless>().is_err());
        assert!(registry.tables().is_empty());
    }

    #[test]
    fn create_tables_is_idempotent() {
        let registry = Registry::new();
        registry.register::<Author>().unwrap();
        registry.register::<Book>().unwrap();

        let conn = Connection::new(SqliteStore::open_in_memory().unwrap());
        let ctx = Context::background();
        let opts = CreateTableOptions::new();
        registry.create_tables(&ctx, &conn, &opts).unwrap();
        registry.create_tables(&ctx, &conn, &opts).unwrap();

        let rows = conn
            .executor()
            .query(
                &ctx,
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                &[],
            )
            .unwrap();
        assert_eq!(rows.len(), 2);
    }
}
