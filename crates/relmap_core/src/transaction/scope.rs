//! Transaction and savepoint scopes.

use super::{Connection, Database, PendingFreeze};
use crate::error::CoreResult;
use crate::sql::dialect;
use parking_lot::Mutex;
use relmap_store::{Context, Engine, Executor};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

type PendingList = Arc<Mutex<Vec<Box<dyn PendingFreeze>>>>;

/// An open transaction scope: the root transaction or a savepoint.
///
/// A scope ends with [`commit`](Transaction::commit) or
/// [`rollback`](Transaction::rollback), both of which consume it. A scope
/// dropped while still open is rolled back.
///
/// Opening a savepoint borrows the parent mutably, so the parent cannot
/// be used until the savepoint has ended.
///
/// # Example
///
/// ```rust
/// use relmap_core::{Config, Connection};
/// use relmap_store::Context;
///
/// let ctx = Context::background();
/// let conn = Connection::open(Config::new()).unwrap();
///
/// let mut tx = conn.begin(&ctx).unwrap();
/// let inner = tx.begin(&ctx).unwrap();
/// assert!(inner.is_savepoint());
/// inner.rollback(&ctx).unwrap();
/// tx.commit(&ctx).unwrap();
/// ```
pub struct Transaction<'c> {
    conn: &'c Connection,
    savepoint: Option<String>,
    pending: PendingList,
    open: bool,
}

impl<'c> Transaction<'c> {
    pub(crate) fn root(ctx: &Context, conn: &'c Connection) -> CoreResult<Self> {
        let sql = dialect::begin(conn.engine())?;
        conn.executor().execute_batch(ctx, &sql)?;
        debug!("transaction started");
        Ok(Self {
            conn,
            savepoint: None,
            pending: Arc::new(Mutex::new(Vec::new())),
            open: true,
        })
    }

    /// Opens a savepoint nested in this scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the `SAVEPOINT` statement fails.
    pub fn begin(&mut self, ctx: &Context) -> CoreResult<Transaction<'_>> {
        let name = format!(
            "{}_{}",
            self.conn.config().savepoint_prefix,
            Uuid::new_v4().simple()
        );
        let sql = dialect::savepoint(self.engine(), &name)?;
        self.executor().execute_batch(ctx, &sql)?;
        debug!(savepoint = %name, "savepoint opened");
        Ok(Transaction {
            conn: self.conn,
            savepoint: Some(name),
            pending: Arc::clone(&self.pending),
            open: true,
        })
    }

    /// Whether this scope is a savepoint rather than the root.
    #[must_use]
    pub fn is_savepoint(&self) -> bool {
        self.savepoint.is_some()
    }

    /// Savepoint name, or `None` for the root.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.savepoint.as_deref()
    }

    /// Number of records waiting for the root transaction to end.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Commits the scope.
    ///
    /// A savepoint is released; its records stay registered with the
    /// root. The root is committed, then each registered record, in
    /// registration order, has its `AfterCommit` hook run and is frozen.
    ///
    /// # Errors
    ///
    /// Returns an error if the control statement fails; the scope is
    /// then rolled back. If the commit succeeded but an `AfterCommit`
    /// hook failed, the first hook error is returned; the commit stands,
    /// the failing record stays unfrozen and the others are finalized.
    pub fn commit(mut self, ctx: &Context) -> CoreResult<()> {
        match self.savepoint.as_deref() {
            Some(name) => {
                let sql = dialect::release_savepoint(self.engine(), name)?;
                self.executor().execute_batch(ctx, &sql)?;
                self.open = false;
                debug!(savepoint = name, "savepoint released");
                Ok(())
            }
            None => {
                let sql = dialect::commit(self.engine())?;
                self.executor().execute_batch(ctx, &sql)?;
                self.open = false;
                debug!("transaction committed");
                self.finalize(ctx, true)
            }
        }
    }

    /// Rolls the scope back.
    ///
    /// A savepoint is rolled back to its start; its records stay
    /// registered with the root. The root is rolled back and every
    /// registered record is frozen without running hooks.
    ///
    /// # Errors
    ///
    /// Returns an error if the control statement fails.
    pub fn rollback(mut self, ctx: &Context) -> CoreResult<()> {
        self.abort(ctx)
    }

    fn abort(&mut self, ctx: &Context) -> CoreResult<()> {
        self.open = false;
        match self.savepoint.as_deref() {
            Some(name) => {
                let sql = dialect::rollback_to_savepoint(self.engine(), name)?;
                self.executor().execute_batch(ctx, &sql)?;
                debug!(savepoint = name, "savepoint rolled back");
                Ok(())
            }
            None => {
                let sql = dialect::rollback(self.engine())?;
                let result = self.executor().execute_batch(ctx, &sql);
                debug!("transaction rolled back");
                // records are frozen even if ROLLBACK itself failed
                self.finalize(ctx, false)?;
                result.map_err(Into::into)
            }
        }
    }

    fn finalize(&self, ctx: &Context, committed: bool) -> CoreResult<()> {
        let pending = std::mem::take(&mut *self.pending.lock());
        let mut first_err = None;
        for record in pending {
            if committed {
                if let Err(err) = record.after_commit(ctx, self.conn) {
                    warn!(table = record.table(), error = %err, "after-commit hook failed");
                    first_err.get_or_insert(err);
                    continue;
                }
            }
            record.freeze();
            trace!(table = record.table(), "record frozen");
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl Database for Transaction<'_> {
    fn engine(&self) -> Engine {
        self.conn.engine()
    }

    fn executor(&self) -> &dyn Executor {
        self.conn.executor()
    }

    fn within_transaction(&self) -> bool {
        true
    }

    fn defer_freeze(&self, pending: Box<dyn PendingFreeze>) {
        trace!(table = pending.table(), "freeze deferred");
        let mut list = self.pending.lock();
        match list.iter().position(|p| p.identity() == pending.identity()) {
            Some(slot) => list[slot] = pending,
            None => list.push(pending),
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.open {
            warn!(
                savepoint = self.savepoint.as_deref(),
                "transaction scope dropped while open, rolling back"
            );
            if let Err(err) = self.abort(&Context::background()) {
                warn!(error = %err, "implicit rollback failed");
            }
        }
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("savepoint", &self.savepoint)
            .field("pending", &self.pending_count())
            .field("open", &self.open)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::CoreError;
    use relmap_store::{RecordingStore, SqliteStore, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Marker {
        record: Arc<()>,
        frozen: Arc<AtomicUsize>,
        hooked: Arc<AtomicUsize>,
        fail_hook: bool,
    }

    impl PendingFreeze for Marker {
        fn table(&self) -> &str {
            "marker"
        }

        fn identity(&self) -> *const () {
            Arc::as_ptr(&self.record)
        }

        fn after_commit(&self, _ctx: &Context, db: &dyn Database) -> CoreResult<()> {
            assert!(!db.within_transaction());
            self.hooked.fetch_add(1, Ordering::SeqCst);
            if self.fail_hook {
                Err(CoreError::hook("refused"))
            } else {
                Ok(())
            }
        }

        fn freeze(&self) {
            self.frozen.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Counters {
        frozen: Arc<AtomicUsize>,
        hooked: Arc<AtomicUsize>,
    }

    impl Counters {
        fn new() -> Self {
            Self {
                frozen: Arc::new(AtomicUsize::new(0)),
                hooked: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn pending(&self, fail_hook: bool) -> Box<dyn PendingFreeze> {
            self.pending_for(&Arc::new(()), fail_hook)
        }

        fn pending_for(&self, record: &Arc<()>, fail_hook: bool) -> Box<dyn PendingFreeze> {
            Box::new(Marker {
                record: Arc::clone(record),
                frozen: Arc::clone(&self.frozen),
                hooked: Arc::clone(&self.hooked),
                fail_hook,
            })
        }

        fn frozen(&self) -> usize {
            self.frozen.load(Ordering::SeqCst)
        }

        fn hooked(&self) -> usize {
            self.hooked.load(Ordering::SeqCst)
        }
    }

    type Recorder = Arc<RecordingStore<SqliteStore>>;

    fn recording() -> (Connection, Recorder) {
        let store = Arc::new(RecordingStore::new(SqliteStore::open_in_memory().unwrap()));
        (Connection::new(Arc::clone(&store)), store)
    }

    #[test]
    fn commit_runs_hooks_then_freezes_in_order() {
        let ctx = Context::background();
        let (conn, store) = recording();
        let counters = Counters::new();

        let tx = conn.begin(&ctx).unwrap();
        tx.defer_freeze(counters.pending(false));
        tx.defer_freeze(counters.pending(false));
        assert_eq!(tx.pending_count(), 2);
        tx.commit(&ctx).unwrap();

        assert_eq!(counters.hooked(), 2);
        assert_eq!(counters.frozen(), 2);
        assert_eq!(store.sql_log(), vec!["BEGIN", "COMMIT"]);
    }

    #[test]
    fn record_registered_twice_is_finalized_once() {
        let ctx = Context::background();
        let (conn, _store) = recording();
        let counters = Counters::new();
        let record = Arc::new(());

        let mut tx = conn.begin(&ctx).unwrap();
        tx.defer_freeze(counters.pending_for(&record, false));
        tx.defer_freeze(counters.pending(false));
        {
            let sp = tx.begin(&ctx).unwrap();
            sp.defer_freeze(counters.pending_for(&record, false));
            sp.commit(&ctx).unwrap();
        }
        assert_eq!(tx.pending_count(), 2);
        tx.commit(&ctx).unwrap();

        assert_eq!(counters.hooked(), 2);
        assert_eq!(counters.frozen(), 2);
    }

    #[test]
    fn root_rollback_freezes_without_hooks() {
        let ctx = Context::background();
        let (conn, store) = recording();
        let counters = Counters::new();

        let tx = conn.begin(&ctx).unwrap();
        tx.defer_freeze(counters.pending(false));
        tx.rollback(&ctx).unwrap();
        assert_eq!(store.sql_log(), vec!["BEGIN", "ROLLBACK"]);

        assert_eq!(counters.hooked(), 0);
        assert_eq!(counters.frozen(), 1);
    }

    #[test]
    fn savepoint_registrations_reach_the_root() {
        let ctx = Context::background();
        let (conn, store) = recording();
        let counters = Counters::new();

        let mut tx = conn.begin(&ctx).unwrap();
        {
            let mut sp1 = tx.begin(&ctx).unwrap();
            sp1.defer_freeze(counters.pending(false));
            let sp2 = sp1.begin(&ctx).unwrap();
            sp2.defer_freeze(counters.pending(false));
            sp2.rollback(&ctx).unwrap();
            assert_eq!(sp1.pending_count(), 2);
            sp1.commit(&ctx).unwrap();
        }
        assert_eq!(tx.pending_count(), 2);
        assert_eq!(counters.frozen(), 0);

        tx.commit(&ctx).unwrap();
        assert_eq!(counters.frozen(), 2);

        let log = store.sql_log();
        assert_eq!(log.len(), 6);
        assert!(log[1].starts_with("SAVEPOINT \"sp_"));
        assert!(log[3].starts_with("ROLLBACK TO SAVEPOINT \"sp_"));
        assert!(log[4].starts_with("RELEASE SAVEPOINT \"sp_"));
        assert_eq!(log[5], "COMMIT");
    }

    #[test]
    fn savepoint_names_use_prefix() {
        let ctx = Context::background();
        let conn = Connection::with_config(
            SqliteStore::open_in_memory().unwrap(),
            Config::new().savepoint_prefix("nest"),
        );
        let mut tx = conn.begin(&ctx).unwrap();
        assert_eq!(tx.name(), None);
        let sp = tx.begin(&ctx).unwrap();
        let name = sp.name().unwrap().to_owned();
        assert!(name.starts_with("nest_"));
        assert_eq!(name.len(), "nest_".len() + 32);
        sp.commit(&ctx).unwrap();
        tx.commit(&ctx).unwrap();
    }

    #[test]
    fn failing_hook_leaves_only_that_record_unfrozen() {
        let ctx = Context::background();
        let (conn, _store) = recording();
        let counters = Counters::new();

        let tx = conn.begin(&ctx).unwrap();
        tx.defer_freeze(counters.pending(true));
        tx.defer_freeze(counters.pending(false));
        let err = tx.commit(&ctx).unwrap_err();

        assert!(matches!(err, CoreError::Hook { .. }));
        assert_eq!(counters.hooked(), 2);
        assert_eq!(counters.frozen(), 1);
    }

    #[test]
    fn dropped_scope_rolls_back() {
        let ctx = Context::background();
        let conn = Connection::new(SqliteStore::open_in_memory().unwrap());
        conn.executor()
            .execute_batch(&ctx, "CREATE TABLE t (v INTEGER)")
            .unwrap();
        let counters = Counters::new();

        {
            let tx = conn.begin(&ctx).unwrap();
            tx.executor()
                .execute(&ctx, "INSERT INTO t (v) VALUES (?1)", &[Value::Integer(1)])
                .unwrap();
            tx.defer_freeze(counters.pending(false));
        }

        let rows = conn.executor().query(&ctx, "SELECT v FROM t", &[]).unwrap();
        assert!(rows.is_empty());
        assert_eq!(counters.frozen(), 1);
        assert_eq!(counters.hooked(), 0);

        // the connection is usable again
        conn.begin(&ctx).unwrap().commit(&ctx).unwrap();
    }

    #[test]
    fn savepoint_rollback_undoes_only_its_statements() {
        let ctx = Context::background();
        let conn = Connection::new(SqliteStore::open_in_memory().unwrap());
        conn.executor()
            .execute_batch(&ctx, "CREATE TABLE t (v INTEGER)")
            .unwrap();
        let insert = |db: &dyn Database, v: i64| {
            db.executor()
                .execute(&ctx, "INSERT INTO t (v) VALUES (?1)", &[Value::Integer(v)])
                .unwrap();
        };

        let mut tx = conn.begin(&ctx).unwrap();
        insert(&tx, 1);
        let sp = tx.begin(&ctx).unwrap();
        insert(&sp, 2);
        sp.rollback(&ctx).unwrap();
        tx.commit(&ctx).unwrap();

        let rows = conn.executor().query(&ctx, "SELECT v FROM t", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(0), Some(&Value::Integer(1)));
    }
}
