//! Record types and their lifecycle hooks.

use crate::error::CoreResult;
use crate::schema::SchemaBuilder;
use crate::transaction::Database;
use relmap_store::{Context, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A struct whose fields map onto the columns of one table.
///
/// # Example
///
/// ```rust
/// use relmap_core::{ColumnAttrs, Field, Record, SchemaBuilder};
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
/// ```
pub trait Record: Default + Send + 'static {
    /// Describes the table this type maps to.
    fn define(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self>;

    /// Hooks to run around persistence operations, if any.
    ///
    /// Types with hooks implement [`Lifecycle`] and return `Some(self)`.
    fn lifecycle(&mut self) -> Option<&mut dyn Lifecycle> {
        None
    }
}

/// Points in a record's lifecycle at which hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Before the `INSERT` is built.
    BeforeAppend,
    /// After the `INSERT` succeeded.
    AfterAppend,
    /// Before the `UPDATE` is built.
    BeforeReplace,
    /// After the `UPDATE` succeeded.
    AfterReplace,
    /// Before the `DELETE` is built.
    BeforeDelete,
    /// After the `DELETE` succeeded.
    AfterDelete,
    /// After the root transaction the record was written in committed.
    AfterCommit,
}

/// A persistence operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Insert.
    Append,
    /// Update.
    Replace,
    /// Delete.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Append => "append",
            Self::Replace => "replace",
            Self::Delete => "delete",
        })
    }
}

/// Everything a hook is told about the event it runs for.
pub struct EventParameters<'a> {
    /// Context of the operation.
    pub context: &'a Context,
    /// Database the operation runs against. For [`EventType::AfterCommit`]
    /// this is the connection, as the transaction is already closed.
    pub database: &'a dyn Database,
    /// The event.
    pub event: EventType,
    /// The operation that triggered it.
    pub operation: Operation,
}

impl fmt::Debug for EventParameters<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventParameters")
            .field("event", &self.event)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// Receives lifecycle events for a record.
///
/// An error from a `Before*` hook aborts the operation before any SQL is
/// sent. An error from an `After*` hook is returned to the caller, but
/// the statement has already run.
pub trait Lifecycle {
    /// Called for every event of the record.
    ///
    /// # Errors
    ///
    /// Any error rejects the event.
    fn on_event(&mut self, params: &EventParameters<'_>) -> CoreResult<()>;
}

/// A set of named values that can be loaded into a record.
///
/// See [`Workarea::load`](crate::Workarea::load).
pub trait Source {
    /// Every `(name, value)` pair offered.
    fn fields(&self) -> Vec<(&str, Value)>;
}

impl Source for BTreeMap<String, Value> {
    fn fields(&self) -> Vec<(&str, Value)> {
        self.iter().map(|(k, v)| (k.as_str(), v.clone())).collect()
    }
}

impl<S: std::hash::BuildHasher> Source for HashMap<String, Value, S> {
    fn fields(&self) -> Vec<(&str, Value)> {
        self.iter().map(|(k, v)| (k.as_str(), v.clone())).collect()
    }
}

impl Source for [(&str, Value)] {
    fn fields(&self) -> Vec<(&str, Value)> {
        self.iter().map(|(k, v)| (*k, v.clone())).collect()
    }
}

impl<const N: usize> Source for [(&str, Value); N] {
    fn fields(&self) -> Vec<(&str, Value)> {
        self.as_slice().fields()
    }
}

impl Source for Vec<(&str, Value)> {
    fn fields(&self) -> Vec<(&str, Value)> {
        self.as_slice().fields()
    }
}

/// Runs `record`'s hook for `event`, if it has hooks.
pub(crate) fn fire<R: Record>(
    record: &mut R,
    context: &Context,
    database: &dyn Database,
    event: EventType,
    operation: Operation,
) -> CoreResult<()> {
    match record.lifecycle() {
        Some(hooks) => hooks.on_event(&EventParameters {
            context,
            database,
            event,
            operation,
        }),
        None => Ok(()),
    }
}
