//! Sample record types.
//!
//! - [`User`]: generated UUID primary key, unique email, lifecycle hooks
//! - [`Tag`]: unique key only
//! - [`Sample`]: one column of every field kind, nullable and not
//! - [`Entry`]: no key at all

use chrono::{DateTime, Utc};
use relmap_core::{
    ColumnAttrs, CoreError, CoreResult, DefaultExpr, EventParameters, EventType, Field, Lifecycle,
    Record, SchemaBuilder,
};

/// A user account.
///
/// `id` and `created` are filled by the database. The hooks stamp
/// `updated` before every replace and keep a log of the events seen;
/// setting `fail_on` makes the hook for that event fail.
#[derive(Debug, Default)]
pub struct User {
    /// Generated primary key.
    pub id: Field<String>,
    /// Unique login.
    pub email: Field<String>,
    /// Display name.
    pub name: Field<String>,
    /// Age, if known.
    pub age: Field<Option<i32>>,
    /// Insert time, set by the database.
    pub created: Field<DateTime<Utc>>,
    /// Last replace time, set by the hook.
    pub updated: Field<Option<DateTime<Utc>>>,
    /// Events seen by the hook, oldest first.
    pub events: Vec<EventType>,
    /// Event whose hook should fail.
    pub fail_on: Option<EventType>,
}

impl Record for User {
    fn define(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .table("users")
            .column(
                "id",
                |u| &u.id,
                |u| &mut u.id,
                ColumnAttrs::new()
                    .primary_key()
                    .auto_generated()
                    .not_null()
                    .default_expr(DefaultExpr::NewUuid),
            )
            .column("email", |u| &u.email, |u| &mut u.email, ColumnAttrs::new().unique_key().not_null())
            .column("name", |u| &u.name, |u| &mut u.name, ColumnAttrs::new().not_null())
            .column("age", |u| &u.age, |u| &mut u.age, ColumnAttrs::new())
            .column(
                "created",
                |u| &u.created,
                |u| &mut u.created,
                ColumnAttrs::new()
                    .auto_generated()
                    .not_null()
                    .default_expr(DefaultExpr::Now),
            )
            .column("updated", |u| &u.updated, |u| &mut u.updated, ColumnAttrs::new())
    }

    fn lifecycle(&mut self) -> Option<&mut dyn Lifecycle> {
        Some(self)
    }
}

impl Lifecycle for User {
    fn on_event(&mut self, params: &EventParameters<'_>) -> CoreResult<()> {
        self.events.push(params.event);
        if self.fail_on == Some(params.event) {
            return Err(CoreError::hook(format!("{:?} refused for user", params.event)));
        }
        if params.event == EventType::BeforeReplace {
            self.updated.set(Some(Utc::now()));
        }
        Ok(())
    }
}

/// A label identified by its unique name.
#[derive(Debug, Default)]
pub struct Tag {
    /// Unique name.
    pub name: Field<String>,
    /// Free text.
    pub label: Field<String>,
}

impl Record for Tag {
    fn define(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .table("tags")
            .column("name", |t| &t.name, |t| &mut t.name, ColumnAttrs::new().unique_key().not_null())
            .column("label", |t| &t.label, |t| &mut t.label, ColumnAttrs::new())
    }
}

/// One column per field kind.
#[derive(Debug, Default)]
pub struct Sample {
    /// Primary key.
    pub key: Field<i64>,
    /// Text.
    pub text: Field<String>,
    /// 32-bit integer.
    pub small: Field<i32>,
    /// 64-bit integer.
    pub big: Field<i64>,
    /// Boolean.
    pub flag: Field<bool>,
    /// Double.
    pub ratio: Field<f64>,
    /// Timestamp.
    pub at: Field<DateTime<Utc>>,
    /// Nullable text.
    pub maybe_text: Field<Option<String>>,
    /// Nullable 32-bit integer.
    pub maybe_small: Field<Option<i32>>,
    /// Nullable 64-bit integer.
    pub maybe_big: Field<Option<i64>>,
    /// Nullable boolean.
    pub maybe_flag: Field<Option<bool>>,
    /// Nullable double.
    pub maybe_ratio: Field<Option<f64>>,
    /// Nullable timestamp.
    pub maybe_at: Field<Option<DateTime<Utc>>>,
}

impl Record for Sample {
    fn define(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        let required = ColumnAttrs::new().not_null();
        let optional = ColumnAttrs::new();
        schema
            .table("samples")
            .column("key", |s| &s.key, |s| &mut s.key, required.primary_key())
            .column("text", |s| &s.text, |s| &mut s.text, required)
            .column("small", |s| &s.small, |s| &mut s.small, required)
            .column("big", |s| &s.big, |s| &mut s.big, required)
            .column("flag", |s| &s.flag, |s| &mut s.flag, required)
            .column("ratio", |s| &s.ratio, |s| &mut s.ratio, required)
            .column("at", |s| &s.at, |s| &mut s.at, required)
            .column("maybe_text", |s| &s.maybe_text, |s| &mut s.maybe_text, optional)
            .column("maybe_small", |s| &s.maybe_small, |s| &mut s.maybe_small, optional)
            .column("maybe_big", |s| &s.maybe_big, |s| &mut s.maybe_big, optional)
            .column("maybe_flag", |s| &s.maybe_flag, |s| &mut s.maybe_flag, optional)
            .column("maybe_ratio", |s| &s.maybe_ratio, |s| &mut s.maybe_ratio, optional)
            .column("maybe_at", |s| &s.maybe_at, |s| &mut s.maybe_at, optional)
    }
}

/// A log line with no key.
#[derive(Debug, Default)]
pub struct Entry {
    /// The line.
    pub line: Field<String>,
}

impl Record for Entry {
    fn define(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .table("entries")
            .column("line", |e| &e.line, |e| &mut e.line, ColumnAttrs::new())
    }
}
