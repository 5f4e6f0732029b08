//! Table schemas derived from record type definitions.
//!
//! A record type describes itself once through a [`SchemaBuilder`]:
//! the table name, then one entry per column naming the field accessor
//! and the column attributes. [`SchemaBuilder::build`] validates the
//! description and produces a [`Schema`], which pairs the engine-neutral
//! [`TableDef`] with the typed accessors used to reach each field of a
//! record value.
//!
//! Columns are ordered by name. Every statement built from a schema lists
//! columns in that order, so generated SQL is deterministic.

use crate::error::{CoreError, CoreResult};
use crate::field::{Field, FieldCell, FieldType, Kind};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Database-side default for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultExpr {
    /// No default.
    #[default]
    None,
    /// A freshly generated UUID, as text.
    NewUuid,
    /// The current timestamp.
    Now,
}

/// Attributes attached to a column declaration.
///
/// Columns are nullable unless marked otherwise.
///
/// # Example
///
/// ```rust
/// use relmap_core::{ColumnAttrs, DefaultExpr};
///
/// let id = ColumnAttrs::new()
///     .primary_key()
///     .auto_generated()
///     .not_null()
///     .default_expr(DefaultExpr::NewUuid);
/// assert!(id.is_primary_key());
/// assert!(!id.is_nullable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnAttrs {
    primary_key: bool,
    unique_key: bool,
    auto_generated: bool,
    nullable: bool,
    default: DefaultExpr,
}

impl Default for ColumnAttrs {
    fn default() -> Self {
        Self {
            primary_key: false,
            unique_key: false,
            auto_generated: false,
            nullable: true,
            default: DefaultExpr::None,
        }
    }
}

impl ColumnAttrs {
    /// Plain nullable column without a default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the column as part of the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the column as part of the table's unique key.
    #[must_use]
    pub const fn unique_key(mut self) -> Self {
        self.unique_key = true;
        self
    }

    /// Marks the column as filled by the database.
    ///
    /// Auto-generated columns are never written; their values are read
    /// back after each insert or update.
    #[must_use]
    pub const fn auto_generated(mut self) -> Self {
        self.auto_generated = true;
        self
    }

    /// Declares the column `NOT NULL`.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets nullability explicitly.
    #[must_use]
    pub const fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Sets the database-side default.
    #[must_use]
    pub const fn default_expr(mut self, default: DefaultExpr) -> Self {
        self.default = default;
        self
    }

    /// Whether the column is part of the primary key.
    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Whether the column is nullable.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// Engine-neutral description of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    name: String,
    kind: Kind,
    primary_key: bool,
    unique_key: bool,
    auto_generated: bool,
    nullable: bool,
    default: DefaultExpr,
}

impl ColumnDef {
    /// Builds a column description.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: Kind, attrs: ColumnAttrs) -> Self {
        Self {
            name: name.into(),
            kind,
            primary_key: attrs.primary_key,
            unique_key: attrs.unique_key,
            auto_generated: attrs.auto_generated,
            nullable: attrs.nullable,
            default: attrs.default,
        }
    }

    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of the field bound to this column.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Part of the primary key.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Part of the unique key.
    #[must_use]
    pub fn is_unique_key(&self) -> bool {
        self.unique_key
    }

    /// Filled by the database.
    #[must_use]
    pub fn is_auto_generated(&self) -> bool {
        self.auto_generated
    }

    /// Declared nullable.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Database-side default.
    #[must_use]
    pub fn default_expr(&self) -> DefaultExpr {
        self.default
    }
}

/// Engine-neutral description of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDef {
    name: String,
    columns: Vec<ColumnDef>,
}

impl TableDef {
    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns ordered by name.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Looks a column up by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.position(name).map(|i| &self.columns[i])
    }

    /// Index of the column called `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .binary_search_by(|c| c.name.as_str().cmp(name))
            .ok()
    }

    /// Indices of the primary-key columns.
    #[must_use]
    pub fn primary_key(&self) -> Vec<usize> {
        self.indices(ColumnDef::is_primary_key)
    }

    /// Indices of the unique-key columns.
    #[must_use]
    pub fn unique_key(&self) -> Vec<usize> {
        self.indices(ColumnDef::is_unique_key)
    }

    /// Columns identifying a stored row: the primary key if there is
    /// one, otherwise the unique key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoKey`] when the table has neither.
    pub fn row_key(&self) -> CoreResult<Vec<usize>> {
        let pk = self.primary_key();
        if !pk.is_empty() {
            return Ok(pk);
        }
        let uk = self.unique_key();
        if !uk.is_empty() {
            return Ok(uk);
        }
        Err(CoreError::no_key(&self.name))
    }

    fn indices(&self, pred: impl Fn(&ColumnDef) -> bool) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| pred(c))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Reaches one field of a record value.
trait CellAccess<R>: Send + Sync {
    fn cell<'r>(&self, record: &'r R) -> &'r dyn FieldCell;
    fn cell_mut<'r>(&self, record: &'r mut R) -> &'r mut dyn FieldCell;
}

struct Accessor<R, T: FieldType> {
    get: fn(&R) -> &Field<T>,
    get_mut: fn(&mut R) -> &mut Field<T>,
}

impl<R, T: FieldType> CellAccess<R> for Accessor<R, T> {
    fn cell<'r>(&self, record: &'r R) -> &'r dyn FieldCell {
        (self.get)(record)
    }

    fn cell_mut<'r>(&self, record: &'r mut R) -> &'r mut dyn FieldCell {
        (self.get_mut)(record)
    }
}

/// Validated schema of record type `R`.
///
/// Built once per type by the [`Registry`](crate::Registry) and shared
/// read-only afterwards.
pub struct Schema<R> {
    table: Arc<TableDef>,
    access: Vec<Box<dyn CellAccess<R>>>,
}

impl<R> Schema<R> {
    /// Table description.
    #[must_use]
    pub fn table(&self) -> &TableDef {
        &self.table
    }

    /// Shared handle to the table description.
    #[must_use]
    pub fn table_def(&self) -> Arc<TableDef> {
        Arc::clone(&self.table)
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.table.name()
    }

    /// Field of `record` bound to column `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn cell<'r>(&self, record: &'r R, index: usize) -> &'r dyn FieldCell {
        self.access[index].cell(record)
    }

    /// Mutable field of `record` bound to column `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn cell_mut<'r>(&self, record: &'r mut R, index: usize) -> &'r mut dyn FieldCell {
        self.access[index].cell_mut(record)
    }

    /// Pairs every column with the corresponding field of `record`.
    pub fn bind<'a>(&'a self, record: &'a R) -> BoundRecord<'a> {
        BoundRecord {
            table: &self.table,
            cells: self.access.iter().map(|a| a.cell(record)).collect(),
        }
    }

    /// Whether any field of `record` differs from its baseline.
    pub fn changed(&self, record: &R) -> bool {
        self.access.iter().any(|a| a.cell(record).changed())
    }

    /// Freezes every field of `record`.
    pub fn freeze(&self, record: &mut R) {
        for a in &self.access {
            a.cell_mut(record).freeze();
        }
    }

    /// Resets every field of `record` to the zero value.
    pub fn reset(&self, record: &mut R) {
        for a in &self.access {
            a.cell_mut(record).reset();
        }
    }

    /// Stores a value read from the database into column `index`.
    ///
    /// Values in storage form (integer booleans, textual timestamps) are
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::KindMismatch`] if the value does not fit.
    pub fn scan(&self, record: &mut R, index: usize, value: relmap_store::Value) -> CoreResult<()> {
        let column = &self.table.columns[index];
        self.access[index]
            .cell_mut(record)
            .scan(value)
            .map_err(|rejected| CoreError::KindMismatch {
                column: column.name.clone(),
                expected: column.kind,
                found: rejected.type_name(),
            })
    }
}

impl<R> fmt::Debug for Schema<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema").field("table", &self.table).finish()
    }
}

/// A record's fields paired with the table's columns, index for index.
pub struct BoundRecord<'a> {
    table: &'a TableDef,
    cells: Vec<&'a dyn FieldCell>,
}

impl<'a> BoundRecord<'a> {
    /// Table description.
    #[must_use]
    pub fn table(&self) -> &'a TableDef {
        self.table
    }

    /// Field bound to column `index`.
    #[must_use]
    pub fn cell(&self, index: usize) -> &'a dyn FieldCell {
        self.cells[index]
    }
}

/// Describes a record type's table.
///
/// Obtained inside [`Record::define`](crate::Record::define).
///
/// # Example
///
/// ```rust
/// use relmap_core::{ColumnAttrs, Field, SchemaBuilder};
///
/// #[derive(Default)]
/// struct Tag {
///     name: Field<String>,
///     uses: Field<i64>,
/// }
///
/// let schema = SchemaBuilder::<Tag>::new()
///     .table("tags")
///     .column("name", |t| &t.name, |t| &mut t.name, ColumnAttrs::new().primary_key())
///     .column("uses", |t| &t.uses, |t| &mut t.uses, ColumnAttrs::new())
///     .build()
///     .unwrap();
/// assert_eq!(schema.name(), "tags");
/// assert_eq!(schema.table().primary_key(), vec![0]);
/// ```
pub struct SchemaBuilder<R> {
    table: Option<String>,
    columns: Vec<(ColumnDef, Box<dyn CellAccess<R>>)>,
}

impl<R: 'static> SchemaBuilder<R> {
    /// Starts an empty description.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: None,
            columns: Vec::new(),
        }
    }

    /// Names the table.
    #[must_use]
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table = Some(name.into());
        self
    }

    /// Declares a column bound to the field reached by `get`/`get_mut`.
    #[must_use]
    pub fn column<T: FieldType>(
        mut self,
        name: impl Into<String>,
        get: fn(&R) -> &Field<T>,
        get_mut: fn(&mut R) -> &mut Field<T>,
        attrs: ColumnAttrs,
    ) -> Self {
        self.columns.push((
            ColumnDef::new(name, T::KIND, attrs),
            Box::new(Accessor { get, get_mut }),
        ));
        self
    }

    /// Validates the description.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Schema`] when the table name is missing or
    /// blank, a column name is blank or repeated, or no column is
    /// declared.
    pub fn build(self) -> CoreResult<Schema<R>> {
        let name = match self.table {
            Some(name) if !name.trim().is_empty() => name,
            Some(_) => return Err(CoreError::schema("table name is blank")),
            None => return Err(CoreError::schema("no table name declared")),
        };
        if self.columns.is_empty() {
            return Err(CoreError::schema(format!("table {name} declares no columns")));
        }

        let mut seen = HashSet::new();
        for (column, _) in &self.columns {
            if column.name.trim().is_empty() {
                return Err(CoreError::schema(format!("table {name} has a blank column name")));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(CoreError::schema(format!(
                    "table {name} declares column {} twice",
                    column.name
                )));
            }
        }

        let mut columns = self.columns;
        columns.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        let (columns, access): (Vec<_>, Vec<_>) = columns.into_iter().unzip();

        Ok(Schema {
            table: Arc::new(TableDef { name, columns }),
            access,
        })
    }
}

impl<R: 'static> Default for SchemaBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ScalarKind;
    use relmap_store::Value;

    #[derive(Default)]
    struct Account {
        id: Field<String>,
        email: Field<String>,
        balance: Field<Option<f64>>,
    }

    fn builder() -> SchemaBuilder<Account> {
        SchemaBuilder::<Account>::new()
            .table("accounts")
            .column("id", |a| &a.id, |a| &mut a.id, ColumnAttrs::new().primary_key().not_null())
            .column("email", |a| &a.email, |a| &mut a.email, ColumnAttrs::new().unique_key())
            .column("balance", |a| &a.balance, |a| &mut a.balance, ColumnAttrs::new())
    }

    #[test]
    fn columns_are_sorted_by_name() {
        let schema = builder().build().unwrap();
        let names: Vec<_> = schema.table().columns().iter().map(ColumnDef::name).collect();
        assert_eq!(names, vec!["balance", "email", "id"]);
        assert_eq!(schema.table().position("id"), Some(2));
        assert_eq!(schema.table().column("balance").unwrap().kind(), Kind::nullable(ScalarKind::Double));
    }

    #[test]
    fn accessors_follow_their_columns_after_sorting() {
        let schema = builder().build().unwrap();
        let mut account = Account::default();
        account.id.set("a-1");
        account.email.set("a@example.com");

        let bound = schema.bind(&account);
        assert_eq!(bound.cell(2).value(), Value::from("a-1"));
        assert_eq!(bound.cell(1).value(), Value::from("a@example.com"));
        assert_eq!(bound.cell(0).value(), Value::Null);
    }

    #[test]
    fn row_key_prefers_primary_key() {
        let schema = builder().build().unwrap();
        assert_eq!(schema.table().row_key().unwrap(), vec![2]);

        let unique_only = SchemaBuilder::<Account>::new()
            .table("emails")
            .column("email", |a| &a.email, |a| &mut a.email, ColumnAttrs::new().unique_key())
            .build()
            .unwrap();
        assert_eq!(unique_only.table().row_key().unwrap(), vec![0]);

        let unkeyed = SchemaBuilder::<Account>::new()
            .table("log")
            .column("email", |a| &a.email, |a| &mut a.email, ColumnAttrs::new())
            .build()
            .unwrap();
        assert!(matches!(unkeyed.table().row_key(), Err(CoreError::NoKey { .. })));
    }

    #[test]
    fn missing_table_name_is_rejected() {
        let err = SchemaBuilder::<Account>::new()
            .column("id", |a| &a.id, |a| &mut a.id, ColumnAttrs::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));

        let blank = builder().table("  ").build();
        assert!(matches!(blank, Err(CoreError::Schema { .. })));
    }

    #[test]
    fn bad_columns_are_rejected() {
        let empty = SchemaBuilder::<Account>::new().table("t").build();
        assert!(matches!(empty, Err(CoreError::Schema { .. })));

        let blank = builder()
            .column("", |a| &a.id, |a| &mut a.id, ColumnAttrs::new())
            .build();
        assert!(matches!(blank, Err(CoreError::Schema { .. })));

        let duplicate = builder()
            .column("id", |a| &a.id, |a| &mut a.id, ColumnAttrs::new())
            .build();
        assert!(matches!(duplicate, Err(CoreError::Schema { .. })));
    }

    #[test]
    fn freeze_and_reset_touch_every_field() {
        let schema = builder().build().unwrap();
        let mut account = Account::default();
        account.email.set("x@example.com");
        account.balance.set(Some(1.5));
        assert!(schema.changed(&account));

        schema.freeze(&mut account);
        assert!(!schema.changed(&account));

        schema.reset(&mut account);
        assert!(account.email.get().is_empty());
        assert_eq!(*account.balance.baseline(), None);
    }

    #[test]
    fn scan_reports_kind_mismatch() {
        let schema = builder().build().unwrap();
        let mut account = Account::default();
        let err = schema.scan(&mut account, 0, Value::from("lots")).unwrap_err();
        match err {
            CoreError::KindMismatch { column, found, .. } => {
                assert_eq!(column, "balance");
                assert_eq!(found, "text");
            }
            other => panic!("unexpected error: {other}"),
        }

        schema.scan(&mut account, 0, Value::Double(2.0)).unwrap();
        assert_eq!(*account.balance.get(), Some(2.0));
    }

    #[test]
    fn table_def_serializes() {
        let schema = builder().build().unwrap();
        let json = serde_json::to_value(schema.table()).unwrap();
        assert_eq!(json["name"], "accounts");
        assert_eq!(json["columns"][2]["primary_key"], true);
        assert_eq!(json["columns"][0]["kind"]["scalar"], "double");
    }
}
