//! Executor context: the read-only handle passed to every executor at
//! construction.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::common::{Rid, TransactionId, Value};
use crate::transaction::{IsolationLevel, LockManager, TransactionTable, WriteRecord};
use crate::Result;

/// Bundles a transaction's identity and isolation level, the lock
/// manager, the shared transaction table, and the catalog. `lock_manager`
/// is `None` for unlocked execution (tests, read-only scans run outside
/// any transaction).
pub struct ExecutorContext {
    pub txn_id: TransactionId,
    pub isolation_level: IsolationLevel,
    pub lock_manager: Option<Arc<LockManager>>,
    pub txns: TransactionTable,
    pub catalog: Arc<Catalog>,
}

impl ExecutorContext {
    pub fn new(
        txn_id: TransactionId,
        isolation_level: IsolationLevel,
        lock_manager: Option<Arc<LockManager>>,
        txns: TransactionTable,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            txn_id,
            isolation_level,
            lock_manager,
            txns,
            catalog,
        }
    }

    fn holds_exclusive(&self, rid: Rid) -> bool {
        self.txns
            .lock()
            .get(&self.txn_id)
            .map(|t| t.holds_exclusive(&rid))
            .unwrap_or(false)
    }

    fn holds_shared(&self, rid: Rid) -> bool {
        self.txns
            .lock()
            .get(&self.txn_id)
            .map(|t| t.holds_shared(&rid))
            .unwrap_or(false)
    }

    /// Applies the isolation-dependent read-lock protocol used by scan
    /// executors: no lock under READ_UNCOMMITTED, acquire-then-release
    /// under READ_COMMITTED, acquire-and-hold under REPEATABLE_READ.
    pub fn acquire_read_lock(&self, rid: Rid) -> Result<()> {
        let Some(lm) = &self.lock_manager else {
            return Ok(());
        };
        match self.isolation_level {
            IsolationLevel::ReadUncommitted => Ok(()),
            IsolationLevel::ReadCommitted => {
                if !self.holds_exclusive(rid) {
                    lm.lock_shared(self.txn_id, rid)?;
                    lm.unlock(self.txn_id, rid)?;
                }
                Ok(())
            }
            IsolationLevel::RepeatableRead => {
                if !self.holds_exclusive(rid) && !self.holds_shared(rid) {
                    lm.lock_shared(self.txn_id, rid)?;
                }
                Ok(())
            }
        }
    }

    /// Ensures an exclusive lock is held before a mutation executor
    /// writes a row: upgrades a held shared lock in place, or acquires
    /// exclusive outright.
    pub fn acquire_write_lock(&self, rid: Rid) -> Result<()> {
        let Some(lm) = &self.lock_manager else {
            return Ok(());
        };
        if self.holds_exclusive(rid) {
            return Ok(());
        }
        if self.holds_shared(rid) {
            lm.lock_upgrade(self.txn_id, rid)?;
        } else {
            lm.lock_exclusive(self.txn_id, rid)?;
        }
        Ok(())
    }

    /// Appends an undo-log entry for the running transaction. A vanished
    /// transaction (already committed and reaped) silently drops the
    /// record, since there is nothing left to roll back.
    pub fn record_write(&self, record: WriteRecord) {
        if let Some(txn) = self.txns.lock().get_mut(&self.txn_id) {
            txn.write_log.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    fn ctx_with_lock_manager(isolation: IsolationLevel) -> (ExecutorContext, Arc<LockManager>) {
        let mut map = HashMap::new();
        map.insert(1, Transaction::new(1, isolation));
        let txns: TransactionTable = Arc::new(Mutex::new(map));
        let lm = Arc::new(LockManager::new(txns.clone()));
        let ctx = ExecutorContext::new(1, isolation, Some(lm.clone()), txns, Arc::new(Catalog::new()));
        (ctx, lm)
    }

    #[test]
    fn read_committed_releases_lock_immediately() {
        let (ctx, lm) = ctx_with_lock_manager(IsolationLevel::ReadCommitted);
        let rid = Rid::new(1, 0);
        ctx.acquire_read_lock(rid).unwrap();
        // If the shared lock were still held the queue would be
        // non-empty and this immediate re-acquisition would block
        // forever instead of returning.
        lm.lock_exclusive(1, rid).unwrap();
    }

    #[test]
    fn repeatable_read_holds_lock() {
        let (ctx, _lm) = ctx_with_lock_manager(IsolationLevel::RepeatableRead);
        let rid = Rid::new(1, 0);
        ctx.acquire_read_lock(rid).unwrap();
        assert!(ctx.holds_shared(rid));
    }

    #[test]
    fn write_lock_upgrades_held_shared_lock() {
        let (ctx, _lm) = ctx_with_lock_manager(IsolationLevel::RepeatableRead);
        let rid = Rid::new(1, 0);
        ctx.acquire_read_lock(rid).unwrap();
        ctx.acquire_write_lock(rid).unwrap();
        assert!(ctx.holds_exclusive(rid));
        assert!(!ctx.holds_shared(rid));
    }
}
