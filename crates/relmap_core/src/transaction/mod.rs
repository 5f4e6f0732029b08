//! Connections, transactions and savepoints.
//!
//! A [`Connection`] runs statements outside any transaction.
//! [`Connection::begin`] opens a root [`Transaction`]; calling
//! [`Transaction::begin`] on an open scope opens a savepoint nested in it.
//! Both implement [`Database`], which is what workarea operations take.
//!
//! Records written inside a transaction are not frozen right away: the
//! write may still be rolled back, and freezing would lose track of which
//! fields differ from what is stored. They are registered with the root
//! scope instead and frozen once the root transaction ends, after their
//! `AfterCommit` hook has run when it committed.
//!
//! Rolling back a savepoint undoes its statements but leaves those
//! registrations in place, so the affected records are still frozen when
//! the root ends.

mod connection;
mod scope;

pub use connection::Connection;
pub use scope::Transaction;

use crate::error::CoreResult;
use relmap_store::{Context, Engine, Executor};

/// Something workarea operations can run against.
pub trait Database {
    /// Engine of the underlying executor.
    fn engine(&self) -> Engine;

    /// The executor statements are sent to.
    fn executor(&self) -> &dyn Executor;

    /// Whether statements run inside a transaction.
    fn within_transaction(&self) -> bool;

    /// Hands over a record to be frozen when the root transaction ends.
    ///
    /// A record already registered keeps its place and takes the newer
    /// registration. Outside a transaction the record is frozen
    /// immediately.
    fn defer_freeze(&self, pending: Box<dyn PendingFreeze>);
}

/// A record waiting for its transaction to end.
pub trait PendingFreeze: Send {
    /// Name of the record's table.
    fn table(&self) -> &str;

    /// Address of the record; equal for registrations of the same record.
    fn identity(&self) -> *const ();

    /// Runs the record's `AfterCommit` hook.
    ///
    /// # Errors
    ///
    /// Returns the hook's error.
    fn after_commit(&self, ctx: &Context, db: &dyn Database) -> CoreResult<()>;

    /// Makes the record's current values its baseline.
    fn freeze(&self);
}
