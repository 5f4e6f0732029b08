//! Persistence operations on a single record.
//!
//! A [`Workarea`] wraps one record value together with its schema and
//! drives the insert/update/delete lifecycle:
//!
//! 1. the `Before*` hook runs (an error aborts before any SQL)
//! 2. the statement is built and executed
//! 3. values the database generated are read back into the record
//! 4. the `After*` hook runs
//! 5. the record is frozen, or, inside a transaction, registered with the
//!    transaction to be frozen when it ends
//!
//! # State
//!
//! ```text
//! Unsaved --append--> Inserted --replace--> Updated --replace--> Updated
//!     \                   \                    \
//!      `------------------ `------delete-------- `--> Deleted
//! ```
//!
//! `append` needs an unsaved record and `replace` a stored one; anything
//! else is refused with [`CoreError::InvalidOperation`]. The state follows
//! the database: it changes as soon as the statement succeeds, even if
//! reading back generated values or the `After*` hook then fails.

use crate::error::{CoreError, CoreResult};
use crate::record::{fire, EventType, Operation, Record, Source};
use crate::registry::{self, Registry};
use crate::schema::Schema;
use crate::sql::{self, CreateTableOptions, Statement};
use crate::transaction::{Database, PendingFreeze};
use parking_lot::{Mutex, MutexGuard};
use relmap_store::{Context, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Where a record stands relative to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Never written.
    Unsaved,
    /// Written by `append`, or read from the database.
    Inserted,
    /// Written by `replace`.
    Updated,
    /// Removed by `delete`.
    Deleted,
}

/// A record bound to its schema.
///
/// The record lives behind a shared lock so an open transaction can
/// freeze it once the transaction ends. Use [`Workarea::lock`] to read or
/// change its fields; do not hold the guard across a call that ends a
/// transaction the record was written in, as finalizing locks it too.
///
/// # Example
///
/// ```rust
/// use relmap_core::{ColumnAttrs, Connection, Config, CreateTableOptions, Field, Record,
///     Registry, SchemaBuilder, Workarea};
/// use relmap_store::Context;
///
/// #[derive(Default)]
/// struct Note {
///     id: Field<i64>,
///     body: Field<String>,
/// }
///
/// impl Record for Note {
///     fn define(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
///         schema
///             .table("notes")
///             .column("id", |n| &n.id, |n| &mut n.id, ColumnAttrs::new().primary_key())
///             .column("body", |n| &n.body, |n| &mut n.body, ColumnAttrs::new())
///     }
/// }
///
/// let ctx = Context::background();
/// let conn = Connection::open(Config::new()).unwrap();
/// let registry = Registry::new();
///
/// let mut note = Workarea::<Note>::new(&registry).unwrap();
/// note.create_table(&ctx, &conn, &CreateTableOptions::new()).unwrap();
/// {
///     let mut n = note.lock();
///     n.id.set(1);
///     n.body.set("hello");
/// }
/// note.append(&ctx, &conn).unwrap();
/// assert!(!note.changed());
/// ```
pub struct Workarea<R: Record> {
    record: Arc<Mutex<R>>,
    schema: Arc<Schema<R>>,
    state: RecordState,
    last_op: Option<Operation>,
}

impl<R: Record> Workarea<R> {
    /// Creates a workarea over a zero-valued record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Schema`] if `R`'s definition is invalid.
    pub fn new(registry: &Registry) -> CoreResult<Self> {
        Self::with_record(registry, R::default())
    }

    /// Creates a workarea over `record`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Schema`] if `R`'s definition is invalid.
    pub fn with_record(registry: &Registry, record: R) -> CoreResult<Self> {
        Ok(Self::from_parts(registry.schema::<R>()?, record, RecordState::Unsaved))
    }

    pub(crate) fn from_parts(schema: Arc<Schema<R>>, record: R, state: RecordState) -> Self {
        Self {
            record: Arc::new(Mutex::new(record)),
            schema,
            state,
            last_op: None,
        }
    }

    /// Locks the record for reading or changing its fields.
    pub fn lock(&self) -> MutexGuard<'_, R> {
        self.record.lock()
    }

    /// The record's schema.
    #[must_use]
    pub fn schema(&self) -> &Schema<R> {
        &self.schema
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RecordState {
        self.state
    }

    /// The last operation that succeeded, if any.
    #[must_use]
    pub fn last_operation(&self) -> Option<Operation> {
        self.last_op
    }

    /// Whether any field differs from its baseline.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.schema.changed(&self.record.lock())
    }

    /// Makes every field's current value its baseline.
    pub fn freeze(&self) {
        self.schema.freeze(&mut self.record.lock());
        trace!(table = self.schema.name(), "record frozen");
    }

    /// Returns every field to the zero value and the state to
    /// [`RecordState::Unsaved`].
    pub fn reset(&mut self) {
        self.schema.reset(&mut self.record.lock());
        self.state = RecordState::Unsaved;
        self.last_op = None;
    }

    /// Copies the values of `source` into fields with the same column
    /// name.
    ///
    /// A value is taken only if its type is exactly the field's kind;
    /// others, and names without a column, are skipped. Baselines are not
    /// touched, so loaded values count as changes. Returns the number of
    /// fields set.
    pub fn load<S: Source + ?Sized>(&self, source: &S) -> usize {
        let mut record = self.record.lock();
        let table = self.schema.table();
        let mut loaded = 0;
        for (name, value) in source.fields() {
            let Some(index) = table.position(name) else {
                continue;
            };
            if self.schema.cell_mut(&mut record, index).load(&value) {
                loaded += 1;
            }
        }
        loaded
    }

    /// Creates the record's table.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine lacks a needed rule or rejects the
    /// statement.
    pub fn create_table(&self, ctx: &Context, db: &dyn Database, options: &CreateTableOptions) -> CoreResult<()> {
        registry::create_table(ctx, db, self.schema.table(), options)
    }

    /// Inserts the record.
    ///
    /// Auto-generated columns are filled from the database afterwards.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidOperation`] unless the record is unsaved
    /// - [`CoreError::DuplicateKey`] if a key is already taken
    /// - any hook or store error
    pub fn append(&mut self, ctx: &Context, db: &dyn Database) -> CoreResult<()> {
        if self.state != RecordState::Unsaved {
            return Err(self.refuse(Operation::Append));
        }
        let operation = Operation::Append;
        let mut record = self.record.lock();

        fire(&mut *record, ctx, db, EventType::BeforeAppend, operation)?;
        let stmt = sql::insert(db.engine(), &self.schema.bind(&record))?;
        let returned = run(&self.schema, ctx, db, &stmt, operation)?;
        self.state = RecordState::Inserted;
        self.last_op = Some(operation);
        read_back(&self.schema, &mut record, &stmt.returning, returned)?;
        fire(&mut *record, ctx, db, EventType::AfterAppend, operation)?;

        settle(&self.record, &self.schema, &mut record, db, operation);
        Ok(())
    }

    /// Writes the changed fields of a stored record.
    ///
    /// Nothing is sent when no writable field changed.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidOperation`] unless the record is stored
    /// - [`CoreError::NoKey`] if the table has no key
    /// - [`CoreError::NotFound`] if no row matched the key
    /// - any hook or store error
    pub fn replace(&mut self, ctx: &Context, db: &dyn Database) -> CoreResult<()> {
        if !matches!(self.state, RecordState::Inserted | RecordState::Updated) {
            return Err(self.refuse(Operation::Replace));
        }
        let operation = Operation::Replace;
        let mut record = self.record.lock();

        fire(&mut *record, ctx, db, EventType::BeforeReplace, operation)?;
        let stmt = sql::update(db.engine(), &self.schema.bind(&record))?;
        let returned = match &stmt {
            Some(stmt) => run(&self.schema, ctx, db, stmt, operation)?,
            None => {
                trace!(table = self.schema.name(), "nothing changed, no update sent");
                Vec::new()
            }
        };
        self.state = RecordState::Updated;
        self.last_op = Some(operation);
        if let Some(stmt) = &stmt {
            read_back(&self.schema, &mut record, &stmt.returning, returned)?;
        }
        fire(&mut *record, ctx, db, EventType::AfterReplace, operation)?;

        settle(&self.record, &self.schema, &mut record, db, operation);
        Ok(())
    }

    /// Deletes the stored row identified by the record's key.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NoKey`] if the table has no key
    /// - [`CoreError::NotFound`] if no row matched the key
    /// - any hook or store error
    pub fn delete(&mut self, ctx: &Context, db: &dyn Database) -> CoreResult<()> {
        let operation = Operation::Delete;
        let mut record = self.record.lock();

        fire(&mut *record, ctx, db, EventType::BeforeDelete, operation)?;
        let stmt = sql::delete(db.engine(), &self.schema.bind(&record))?;
        let returned = run(&self.schema, ctx, db, &stmt, operation)?;
        self.state = RecordState::Deleted;
        self.last_op = Some(operation);
        read_back(&self.schema, &mut record, &stmt.returning, returned)?;
        fire(&mut *record, ctx, db, EventType::AfterDelete, operation)?;

        settle(&self.record, &self.schema, &mut record, db, operation);
        Ok(())
    }

    fn refuse(&self, operation: Operation) -> CoreError {
        CoreError::invalid_operation(format!(
            "cannot {operation} a {:?} record of table {}",
            self.state,
            self.schema.name()
        ))
    }
}

impl<R: Record> fmt::Debug for Workarea<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workarea")
            .field("table", &self.schema.name())
            .field("state", &self.state)
            .field("last_op", &self.last_op)
            .finish_non_exhaustive()
    }
}

/// Sends `stmt` and hands back the values it returned, if any.
fn run<R>(
    schema: &Schema<R>,
    ctx: &Context,
    db: &dyn Database,
    stmt: &Statement,
    operation: Operation,
) -> CoreResult<Vec<Value>> {
    let table = schema.name();
    debug!(table, %operation, sql = %stmt.sql, args = stmt.args.len(), "executing statement");
    let executor = db.executor();

    if !stmt.has_returning() {
        let affected = executor
            .execute(ctx, &stmt.sql, &stmt.args)
            .map_err(|e| CoreError::from_statement(table, e, executor))?;
        if affected == 0 && operation != Operation::Append {
            return Err(CoreError::NotFound {
                table: table.to_owned(),
            });
        }
        return Ok(Vec::new());
    }

    // zero rows back means no row matched, reported as NotFound
    let row = executor
        .query_row(ctx, &stmt.sql, &stmt.args)
        .map_err(|e| CoreError::from_statement(table, e, executor))?;
    Ok(row.into_values())
}

/// Scans values returned for the columns at `returning` into `record`.
fn read_back<R>(schema: &Schema<R>, record: &mut R, returning: &[usize], values: Vec<Value>) -> CoreResult<()> {
    let mut values = values.into_iter();
    for &index in returning {
        schema.scan(record, index, values.next().unwrap_or(Value::Null))?;
    }
    Ok(())
}

/// Freezes `record` now, or hands it to the open transaction.
fn settle<R: Record>(
    shared: &Arc<Mutex<R>>,
    schema: &Arc<Schema<R>>,
    record: &mut R,
    db: &dyn Database,
    operation: Operation,
) {
    if db.within_transaction() {
        db.defer_freeze(Box::new(PendingRecord {
            record: Arc::clone(shared),
            schema: Arc::clone(schema),
            operation,
        }));
    } else {
        schema.freeze(record);
        trace!(table = schema.name(), %operation, "record frozen");
    }
}

struct PendingRecord<R: Record> {
    record: Arc<Mutex<R>>,
    schema: Arc<Schema<R>>,
    operation: Operation,
}

impl<R: Record> PendingFreeze for PendingRecord<R> {
    fn table(&self) -> &str {
        self.schema.name()
    }

    fn identity(&self) -> *const () {
        Arc::as_ptr(&self.record).cast()
    }

    fn after_commit(&self, ctx: &Context, db: &dyn Database) -> CoreResult<()> {
        fire(&mut *self.record.lock(), ctx, db, EventType::AfterCommit, self.operation)
    }

    fn freeze(&self) {
        self.schema.freeze(&mut self.record.lock());
    }
}
