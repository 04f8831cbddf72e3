// Transaction manager for coordinating transaction lifecycle.
//
// This module provides the core transaction management functionality,
// including beginning, committing, and aborting transactions. It shares
// its transaction table directly with the [`LockManager`] it owns, since
// the lock manager needs to read and write transaction state (isolation
// level, 2PL phase, lock sets) on every call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::common::TransactionId;

use super::error::{TransactionError, TransactionResult};
use super::lock_manager::{LockManager, TransactionTable};
use super::types::{IsolationLevel, Transaction, TransactionState};

/// Transaction manager for lifecycle management.
///
/// Coordinates transaction begin, commit, and abort operations, and
/// integrates with the lock manager for 2PL enforcement.
pub struct TransactionManager {
    next_txn_id: Mutex<TransactionId>,
    txns: TransactionTable,
    lock_manager: Arc<LockManager>,
    default_isolation: IsolationLevel,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::with_isolation(IsolationLevel::ReadCommitted)
    }

    pub fn with_isolation(default_isolation: IsolationLevel) -> Self {
        let txns: TransactionTable = Arc::new(Mutex::new(HashMap::new()));
        let lock_manager = Arc::new(LockManager::new(txns.clone()));
        Self {
            next_txn_id: Mutex::new(1),
            txns,
            lock_manager,
            default_isolation,
        }
    }

    /// Returns the shared transaction table, for wiring into a
    /// [`super::deadlock::DeadlockDetector`].
    pub fn transaction_table(&self) -> TransactionTable {
        self.txns.clone()
    }

    /// Returns the lock manager, for wiring into a
    /// [`super::deadlock::DeadlockDetector`] or handing to executors.
    pub fn lock_manager(&self) -> Arc<LockManager> {
        self.lock_manager.clone()
    }

    /// Begins a new transaction with the manager's default isolation
    /// level.
    pub fn begin(&self) -> TransactionId {
        self.begin_with_isolation(self.default_isolation)
    }

    pub fn begin_with_isolation(&self, isolation_level: IsolationLevel) -> TransactionId {
        let txn_id = {
            let mut next_id = self.next_txn_id.lock();
            let id = *next_id;
            *next_id += 1;
            id
        };
        self.txns
            .lock()
            .insert(txn_id, Transaction::new(txn_id, isolation_level));
        debug!(txn_id, "transaction begin");
        txn_id
    }

    /// Releases every lock the transaction still holds and marks it
    /// committed.
    pub fn commit(&self, txn_id: TransactionId) -> TransactionResult<()> {
        self.release_all_locks(txn_id)?;
        let mut txns = self.txns.lock();
        let txn = txns
            .get_mut(&txn_id)
            .ok_or(TransactionError::TransactionNotFound(txn_id))?;
        txn.state = TransactionState::Committed;
        debug!(txn_id, "transaction committed");
        Ok(())
    }

    /// Releases every lock the transaction still holds and marks it
    /// aborted. Idempotent: a transaction already aborted by the lock
    /// manager or the deadlock detector can still be explicitly aborted
    /// by its caller.
    pub fn abort(&self, txn_id: TransactionId) -> TransactionResult<()> {
        self.release_all_locks(txn_id)?;
        let mut txns = self.txns.lock();
        let txn = txns
            .get_mut(&txn_id)
            .ok_or(TransactionError::TransactionNotFound(txn_id))?;
        txn.state = TransactionState::Aborted;
        debug!(txn_id, "transaction aborted");
        Ok(())
    }

    fn release_all_locks(&self, txn_id: TransactionId) -> TransactionResult<()> {
        let (shared, exclusive) = {
            let txns = self.txns.lock();
            let txn = txns
                .get(&txn_id)
                .ok_or(TransactionError::TransactionNotFound(txn_id))?;
            (
                txn.shared_lock_set.iter().copied().collect::<Vec<_>>(),
                txn.exclusive_lock_set.iter().copied().collect::<Vec<_>>(),
            )
        };
        for rid in shared.into_iter().chain(exclusive.into_iter()) {
            // The transaction's own lock sets are only ever populated by
            // the lock manager, so a held entry always has a matching
            // queue entry to release.
            self.lock_manager.unlock(txn_id, rid).ok();
        }
        Ok(())
    }

    pub fn get_transaction(&self, txn_id: TransactionId) -> Option<Transaction> {
        self.txns.lock().get(&txn_id).cloned()
    }

    pub fn get_state(&self, txn_id: TransactionId) -> Option<TransactionState> {
        self.txns.lock().get(&txn_id).map(|t| t.state)
    }

    pub fn is_active(&self, txn_id: TransactionId) -> bool {
        matches!(
            self.get_state(txn_id),
            Some(TransactionState::Growing) | Some(TransactionState::Shrinking)
        )
    }

    pub fn active_count(&self) -> usize {
        self.txns
            .lock()
            .values()
            .filter(|t| !matches!(t.state, TransactionState::Committed | TransactionState::Aborted))
            .count()
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Rid;

    #[test]
    fn begin_assigns_increasing_ids() {
        let tm = TransactionManager::new();
        assert_eq!(tm.begin(), 1);
        assert_eq!(tm.begin(), 2);
    }

    #[test]
    fn commit_releases_locks_and_marks_committed() {
        let tm = TransactionManager::new();
        let txn_id = tm.begin_with_isolation(IsolationLevel::RepeatableRead);
        let rid = Rid::new(1, 0);
        tm.lock_manager().lock_shared(txn_id, rid).unwrap();

        tm.commit(txn_id).unwrap();

        assert_eq!(tm.get_state(txn_id), Some(TransactionState::Committed));
        let txn = tm.get_transaction(txn_id).unwrap();
        assert!(txn.shared_lock_set.is_empty());
    }

    #[test]
    fn abort_releases_locks_and_marks_aborted() {
        let tm = TransactionManager::new();
        let txn_id = tm.begin();
        let rid = Rid::new(1, 0);
        tm.lock_manager().lock_exclusive(txn_id, rid).unwrap();

        tm.abort(txn_id).unwrap();

        assert_eq!(tm.get_state(txn_id), Some(TransactionState::Aborted));
        let txn = tm.get_transaction(txn_id).unwrap();
        assert!(txn.exclusive_lock_set.is_empty());
    }

    #[test]
    fn commit_on_unknown_transaction_fails() {
        let tm = TransactionManager::new();
        assert!(matches!(
            tm.commit(999),
            Err(TransactionError::TransactionNotFound(999))
        ));
    }

    #[test]
    fn released_lock_is_available_to_other_transaction() {
        let tm = TransactionManager::new();
        let t1 = tm.begin();
        let t2 = tm.begin();
        let rid = Rid::new(1, 0);
        tm.lock_manager().lock_exclusive(t1, rid).unwrap();
        tm.commit(t1).unwrap();

        tm.lock_manager().lock_exclusive(t2, rid).unwrap();
        assert!(tm.get_transaction(t2).unwrap().holds_exclusive(&rid));
    }
}
