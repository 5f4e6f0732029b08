//! # relmap Core
//!
//! A change-tracking record mapper for SQL databases.
//!
//! Application types hold their columns in [`Field`]s, which remember the
//! value last written so only changed columns are sent on update. A type
//! describes its table once through [`Record::define`]; the [`Registry`]
//! turns that into a validated [`Schema`]. A [`Workarea`] runs the
//! insert/update/delete lifecycle for one record, with lifecycle hooks,
//! against a [`Connection`] or an open [`Transaction`].
//!
//! This crate provides:
//! - Typed fields with change tracking ([`Field`])
//! - Explicit schema description and per-type registry
//! - Dialect-aware DDL/DML generation for SQLite and Cockroach ([`sql`])
//! - Record lifecycle with hooks ([`Workarea`], [`Lifecycle`])
//! - Nested transactions through savepoints, with freezing deferred to the
//!   end of the root transaction
//! - Mapping query results back to records ([`ResultSet`])
//!
//! ## Example
//!
//! ```rust
//! use relmap_core::{
//!     ColumnAttrs, Config, Connection, DefaultExpr, Field, Record, Registry, SchemaBuilder,
//!     Workarea,
//! };
//! use relmap_store::Context;
//!
//! #[derive(Default)]
//! struct User {
//!     id: Field<String>,
//!     email: Field<String>,
//! }
//!
//! impl Record for User {
//!     fn define(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
//!         schema
//!             .table("users")
//!             .column(
//!                 "id",
//!                 |u| &u.id,
//!                 |u| &mut u.id,
//!                 ColumnAttrs::new()
//!                     .primary_key()
//!                     .auto_generated()
//!                     .not_null()
//!                     .default_expr(DefaultExpr::NewUuid),
//!             )
//!             .column("email", |u| &u.email, |u| &mut u.email, ColumnAttrs::new().unique_key())
//!     }
//! }
//!
//! let ctx = Context::background();
//! let conn = Connection::open(Config::new()).unwrap();
//! let registry = Registry::new();
//! registry.register::<User>().unwrap();
//! conn.create_tables(&ctx, &registry).unwrap();
//!
//! let mut user = Workarea::<User>::new(&registry).unwrap();
//! user.lock().email.set("ada@example.com");
//!
//! let tx = conn.begin(&ctx).unwrap();
//! user.append(&ctx, &tx).unwrap();
//! tx.commit(&ctx).unwrap();
//!
//! assert_eq!(user.lock().id.get().len(), 36);
//! assert!(!user.changed());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod field;
mod record;
mod registry;
mod resultset;
mod schema;
pub mod sql;
mod transaction;
mod workarea;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use field::{Field, FieldCell, FieldType, Kind, Scalar, ScalarKind};
pub use record::{EventParameters, EventType, Lifecycle, Operation, Record, Source};
pub use registry::Registry;
pub use resultset::ResultSet;
pub use schema::{BoundRecord, ColumnAttrs, ColumnDef, DefaultExpr, Schema, SchemaBuilder, TableDef};
pub use sql::{CreateTableOptions, Statement};
pub use transaction::{Connection, Database, PendingFreeze, Transaction};
pub use workarea::{RecordState, Workarea};
