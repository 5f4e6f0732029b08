//! # relmap Store
//!
//! Statement execution boundary for relmap.
//!
//! The mapper never talks to a database driver directly. Everything it
//! needs from a backing engine goes through the [`Executor`] trait:
//! executing a parameterized statement, reading rows back, and running
//! argument-free control statements (`BEGIN`, `SAVEPOINT`, ...).
//!
//! ## Design Principles
//!
//! - Executors are dumb pipes: they run the SQL text they are given
//! - Arguments are positional [`Value`]s in binding order
//! - Engine failures keep their native error code ([`ErrorCode`]) so
//!   callers can classify them (see [`StoreError::is_duplicate_key`])
//! - Every call takes a [`Context`] carrying cancellation and deadline
//!
//! ## Available Executors
//!
//! - [`SqliteStore`] - SQLite through `rusqlite`, file or in-memory
//! - [`RecordingStore`] - Wrapper that records every statement it forwards
//!
//! ## Example
//!
//! ```rust
//! use relmap_store::{Context, Executor, SqliteStore, Value};
//!
//! let store = SqliteStore::open_in_memory().unwrap();
//! let ctx = Context::background();
//! store.execute_batch(&ctx, "CREATE TABLE t (v TEXT)").unwrap();
//! store.execute(&ctx, "INSERT INTO t (v) VALUES (?1)", &[Value::from("hi")]).unwrap();
//! let row = store.query_row(&ctx, "SELECT v FROM t", &[]).unwrap();
//! assert_eq!(row.get(0), Some(&Value::from("hi")));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod context;
mod engine;
mod error;
mod executor;
mod recording;
mod row;
mod sqlite;
mod value;

pub use context::Context;
pub use engine::Engine;
pub use error::{ErrorCode, StoreError, StoreResult};
pub use executor::Executor;
pub use recording::{RecordedStatement, RecordingStore};
pub use row::Row;
pub use sqlite::SqliteStore;
pub use value::{format_timestamp, parse_timestamp, Value};
