//! Reading records back from the database.

use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::registry::Registry;
use crate::transaction::Database;
use crate::workarea::{RecordState, Workarea};
use relmap_store::{Context, Value};
use std::sync::Arc;
use tracing::debug;

/// Records of type `R` produced by a query.
///
/// Result columns are matched to fields by name; columns the record does
/// not declare are ignored. Every record comes back frozen and in the
/// [`RecordState::Inserted`] state, ready for `replace` or `delete`.
pub struct ResultSet<R: Record> {
    rows: Vec<Workarea<R>>,
}

impl<R: Record> ResultSet<R> {
    /// Runs `sql` with `args` and maps every row onto a record.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails, or
    /// [`CoreError::KindMismatch`] if a column value does not fit its
    /// field.
    pub fn query(
        ctx: &Context,
        db: &dyn Database,
        registry: &Registry,
        sql: &str,
        args: &[Value],
    ) -> CoreResult<Self> {
        let schema = registry.schema::<R>()?;
        debug!(table = schema.name(), sql, args = args.len(), "running query");
        let rows = db
            .executor()
            .query(ctx, sql, args)
            .map_err(|e| CoreError::from_statement(schema.name(), e, db.executor()))?;

        let table = schema.table();
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = R::default();
            for (name, value) in row.iter() {
                if let Some(index) = table.position(name) {
                    schema.scan(&mut record, index, value.clone())?;
                }
            }
            schema.freeze(&mut record);
            out.push(Workarea::from_parts(Arc::clone(&schema), record, RecordState::Inserted));
        }
        Ok(Self { rows: out })
    }

    /// Runs `sql` and returns the first record.
    ///
    /// # Errors
    ///
    /// Same as [`ResultSet::query`], plus [`CoreError::NotFound`] when the
    /// query returns no rows.
    pub fn first(
        ctx: &Context,
        db: &dyn Database,
        registry: &Registry,
        sql: &str,
        args: &[Value],
    ) -> CoreResult<Workarea<R>> {
        let set = Self::query(ctx, db, registry, sql, args)?;
        match set.rows.into_iter().next() {
            Some(first) => Ok(first),
            None => Err(CoreError::NotFound {
                table: registry.schema::<R>()?.name().to_owned(),
            }),
        }
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the query returned nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Record at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Workarea<R>> {
        self.rows.get(index)
    }

    /// Mutable record at `index`, for writing it back.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Workarea<R>> {
        self.rows.get_mut(index)
    }

    /// Iterates over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, Workarea<R>> {
        self.rows.iter()
    }

    /// Takes the records out.
    #[must_use]
    pub fn into_vec(self) -> Vec<Workarea<R>> {
        self.rows
    }
}

impl<R: Record> std::fmt::Debug for ResultSet<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.rows).finish()
    }
}

impl<R: Record> IntoIterator for ResultSet<R> {
    type Item = Workarea<R>;
    type IntoIter = std::vec::IntoIter<Workarea<R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a, R: Record> IntoIterator for &'a ResultSet<R> {
    type Item = &'a Workarea<R>;
    type IntoIter = std::slice::Iter<'a, Workarea<R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::schema::{ColumnAttrs, SchemaBuilder};
    use crate::sql::CreateTableOptions;
    use crate::transaction::Connection;
    use chrono::{DateTime, Utc};
    use relmap_store::SqliteStore;

    #[derive(Default)]
    struct Reading {
        sensor: Field<String>,
        celsius: Field<f64>,
        valid: Field<bool>,
        taken: Field<Option<DateTime<Utc>>>,
    }

    impl Record for Reading {
        fn define(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
            schema
                .table("readings")
                .column("sensor", |r| &r.sensor, |r| &mut r.sensor, ColumnAttrs::new().primary_key())
                .column("celsius", |r| &r.celsius, |r| &mut r.celsius, ColumnAttrs::new())
                .column("valid", |r| &r.valid, |r| &mut r.valid, ColumnAttrs::new())
                .column("taken", |r| &r.taken, |r| &mut r.taken, ColumnAttrs::new())
        }
    }

    fn setup() -> (Context, Connection, Registry) {
        let ctx = Context::background();
        let conn = Connection::new(SqliteStore::open_in_memory().unwrap());
        let registry = Registry::new();
        registry.register::<Reading>().unwrap();
        registry
            .create_tables(&ctx, &conn, &CreateTableOptions::new())
            .unwrap();
        conn.executor()
            .execute_batch(
                &ctx,
                "INSERT INTO readings (sensor, celsius, valid, taken) VALUES \
                 ('a', 21, 1, '2024-05-01 10:00:00'), ('b', 19.5, 0, NULL);",
            )
            .unwrap();
        (ctx, conn, registry)
    }

    #[test]
    fn rows_map_by_column_name() {
        let (ctx, conn, registry) = setup();
        let set = ResultSet::<Reading>::query(
            &ctx,
            &conn,
            &registry,
            "SELECT valid, sensor, celsius, taken, 42 AS extra FROM readings ORDER BY sensor",
            &[],
        )
        .unwrap();

        assert_eq!(set.len(), 2);
        let a = set.get(0).unwrap().lock();
        assert_eq!(a.sensor.get(), "a");
        // integer storage widened to the double field
        assert_eq!(*a.celsius.get(), 21.0);
        assert!(*a.valid.get());
        assert!(a.taken.get().is_some());
        drop(a);

        let b = set.get(1).unwrap();
        assert_eq!(*b.lock().taken.get(), None);
        assert_eq!(b.state(), RecordState::Inserted);
        assert!(!b.changed());
    }

    #[test]
    fn read_records_can_be_written_back() {
        let (ctx, conn, registry) = setup();
        let mut set = ResultSet::<Reading>::query(
            &ctx,
            &conn,
            &registry,
            "SELECT * FROM readings WHERE sensor = ?1",
            &[Value::from("b")],
        )
        .unwrap();

        let b = set.get_mut(0).unwrap();
        b.lock().valid.set(true);
        b.replace(&ctx, &conn).unwrap();

        let again = ResultSet::<Reading>::first(
            &ctx,
            &conn,
            &registry,
            "SELECT * FROM readings WHERE sensor = ?1",
            &[Value::from("b")],
        )
        .unwrap();
        assert!(*again.lock().valid.get());
    }

    #[test]
    fn first_on_empty_result_is_not_found() {
        let (ctx, conn, registry) = setup();
        let err = ResultSet::<Reading>::first(
            &ctx,
            &conn,
            &registry,
            "SELECT * FROM readings WHERE sensor = 'zzz'",
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { ref table } if table == "readings"));
    }

    #[test]
    fn mismatched_column_type_is_reported() {
        let (ctx, conn, registry) = setup();
        let err = ResultSet::<Reading>::query(
            &ctx,
            &conn,
            &registry,
            "SELECT 'warm' AS celsius",
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::KindMismatch { .. }));
    }
}
