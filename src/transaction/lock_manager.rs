// Lock management for transaction concurrency control.
//
// Implements strict two-phase locking at row granularity: shared/exclusive
// modes, FIFO per-key queues, and in-place lock upgrade.
//
// A single global latch guards the entire lock table; every queue within
// it carries its own condition variable so a waiter only wakes when its
// own key changes. Grant predicates and wake loops are modeled directly
// on the reference lock manager this design was ported from: SHARED
// grants as soon as no EXCLUSIVE request is ahead of it in the queue,
// EXCLUSIVE and upgrade grant only at the head.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::common::{Rid, TransactionId};

use super::error::{AbortReason, TransactionError, TransactionResult};
use super::types::{IsolationLevel, LockMode, Transaction, TransactionState};

struct LockRequest {
    txn_id: TransactionId,
    mode: LockMode,
    granted: bool,
}

struct LockRequestQueue {
    requests: VecDeque<LockRequest>,
    upgrading: bool,
    cvar: Arc<Condvar>,
}

impl LockRequestQueue {
    fn new() -> Self {
        Self {
            requests: VecDeque::new(),
            upgrading: false,
            cvar: Arc::new(Condvar::new()),
        }
    }
}

/// Shared table of active transactions, keyed by id.
///
/// Owned jointly by the [`super::manager::TransactionManager`] and the
/// [`LockManager`] it hands out — the lock manager never owns a
/// transaction, it only looks one up by id, per the external contract.
pub type TransactionTable = Arc<Mutex<HashMap<TransactionId, Transaction>>>;

pub struct LockManager {
    latch: Mutex<HashMap<Rid, LockRequestQueue>>,
    txns: TransactionTable,
}

impl LockManager {
    pub fn new(txns: TransactionTable) -> Self {
        Self {
            latch: Mutex::new(HashMap::new()),
            txns,
        }
    }

    fn abort_with(&self, txn_id: TransactionId, rid: Rid, reason: AbortReason) -> TransactionError {
        if let Some(txn) = self.txns.lock().get_mut(&txn_id) {
            txn.state = TransactionState::Aborted;
        }
        warn!(txn_id, %rid, %reason, "transaction aborted by lock manager");
        TransactionError::abort(txn_id, rid, reason)
    }

    fn is_aborted(&self, txn_id: TransactionId) -> bool {
        self.txns
            .lock()
            .get(&txn_id)
            .map(|t| t.is_aborted())
            .unwrap_or(false)
    }

    /// Returns `Err` if acquiring a lock is illegal before even looking at
    /// the lock table: shared-on-read-uncommitted, or any lock attempt
    /// after the transaction has entered `Shrinking` under
    /// `RepeatableRead`.
    fn check_can_acquire(
        &self,
        txn_id: TransactionId,
        rid: Rid,
        mode: LockMode,
    ) -> TransactionResult<()> {
        let shared_on_read_uncommitted;
        let shrinking_violation;
        {
            let txns = self.txns.lock();
            let txn = txns
                .get(&txn_id)
                .ok_or(TransactionError::TransactionNotFound(txn_id))?;
            shared_on_read_uncommitted =
                mode == LockMode::Shared && txn.isolation_level == IsolationLevel::ReadUncommitted;
            shrinking_violation = txn.isolation_level == IsolationLevel::RepeatableRead
                && txn.state != TransactionState::Growing;
        }
        if shared_on_read_uncommitted {
            return Err(self.abort_with(txn_id, rid, AbortReason::LockSharedOnReadUncommitted));
        }
        if shrinking_violation {
            return Err(self.abort_with(txn_id, rid, AbortReason::LockOnShrinking));
        }
        Ok(())
    }

    fn already_holds(&self, txn_id: TransactionId, rid: Rid, mode: LockMode) -> bool {
        let txns = self.txns.lock();
        match txns.get(&txn_id) {
            Some(txn) => match mode {
                LockMode::Shared => txn.holds_shared(&rid),
                LockMode::Exclusive => txn.holds_exclusive(&rid),
            },
            None => false,
        }
    }

    fn record_granted(&self, txn_id: TransactionId, rid: Rid, mode: LockMode) {
        if let Some(txn) = self.txns.lock().get_mut(&txn_id) {
            match mode {
                LockMode::Shared => {
                    txn.shared_lock_set.insert(rid);
                }
                LockMode::Exclusive => {
                    txn.exclusive_lock_set.insert(rid);
                }
            }
        }
    }

    /// Acquires a shared lock on `rid`, blocking until compatible or
    /// aborted.
    pub fn lock_shared(&self, txn_id: TransactionId, rid: Rid) -> TransactionResult<()> {
        self.check_can_acquire(txn_id, rid, LockMode::Shared)?;
        if self.already_holds(txn_id, rid, LockMode::Shared) {
            return Ok(());
        }

        let mut table = self.latch.lock();
        let immediately_granted = {
            let queue = table.entry(rid).or_insert_with(LockRequestQueue::new);
            let compatible = !queue.requests.iter().any(|r| r.mode == LockMode::Exclusive);
            queue.requests.push_back(LockRequest {
                txn_id,
                mode: LockMode::Shared,
                granted: compatible,
            });
            compatible
        };
        if immediately_granted {
            drop(table);
            debug!(txn_id, %rid, "shared lock granted immediately");
            self.record_granted(txn_id, rid, LockMode::Shared);
            return Ok(());
        }

        let cvar = table.get(&rid).unwrap().cvar.clone();
        loop {
            cvar.wait(&mut table);
            if self.is_aborted(txn_id) {
                self.cleanup_waiter(&mut table, txn_id, rid);
                return Err(TransactionError::abort(txn_id, rid, AbortReason::Deadlock));
            }
            let queue = table.get_mut(&rid).unwrap();
            let mut exclusive_ahead = false;
            for req in queue.requests.iter_mut() {
                if req.txn_id == txn_id {
                    if !exclusive_ahead {
                        req.granted = true;
                    }
                    break;
                }
                if req.mode == LockMode::Exclusive {
                    exclusive_ahead = true;
                }
            }
            if queue
                .requests
                .iter()
                .any(|r| r.txn_id == txn_id && r.granted)
            {
                break;
            }
        }
        drop(table);
        debug!(txn_id, %rid, "shared lock granted after wait");
        self.record_granted(txn_id, rid, LockMode::Shared);
        Ok(())
    }

    /// Acquires an exclusive lock on `rid`, blocking until it reaches the
    /// head of the queue or the transaction is aborted.
    pub fn lock_exclusive(&self, txn_id: TransactionId, rid: Rid) -> TransactionResult<()> {
        self.check_can_acquire(txn_id, rid, LockMode::Exclusive)?;
        if self.already_holds(txn_id, rid, LockMode::Exclusive) {
            return Ok(());
        }

        let mut table = self.latch.lock();
        let immediately_granted = {
            let queue = table.entry(rid).or_insert_with(LockRequestQueue::new);
            let granted = queue.requests.is_empty();
            queue.requests.push_back(LockRequest {
                txn_id,
                mode: LockMode::Exclusive,
                granted,
            });
            granted
        };
        if immediately_granted {
            drop(table);
            debug!(txn_id, %rid, "exclusive lock granted immediately");
            self.record_granted(txn_id, rid, LockMode::Exclusive);
            return Ok(());
        }

        let cvar = table.get(&rid).unwrap().cvar.clone();
        loop {
            cvar.wait(&mut table);
            if self.is_aborted(txn_id) {
                self.cleanup_waiter(&mut table, txn_id, rid);
                return Err(TransactionError::abort(txn_id, rid, AbortReason::Deadlock));
            }
            let queue = table.get_mut(&rid).unwrap();
            if queue.requests.front().map(|r| r.txn_id) == Some(txn_id) {
                queue.requests.front_mut().unwrap().granted = true;
                break;
            }
        }
        drop(table);
        debug!(txn_id, %rid, "exclusive lock granted after wait");
        self.record_granted(txn_id, rid, LockMode::Exclusive);
        Ok(())
    }

    /// Upgrades a held shared lock to exclusive in place.
    pub fn lock_upgrade(&self, txn_id: TransactionId, rid: Rid) -> TransactionResult<()> {
        self.check_can_acquire(txn_id, rid, LockMode::Exclusive)?;
        if self.already_holds(txn_id, rid, LockMode::Exclusive) {
            return Ok(());
        }

        let mut table = self.latch.lock();
        let immediately_granted = {
            let queue = table
                .get_mut(&rid)
                .expect("upgrade requires an existing queue holding the shared lock");
            if queue.upgrading {
                drop(table);
                return Err(self.abort_with(txn_id, rid, AbortReason::UpgradeConflict));
            }
            queue.upgrading = true;
            let idx = queue
                .requests
                .iter()
                .position(|r| r.txn_id == txn_id)
                .expect("upgrader must already hold the shared lock");
            queue.requests[idx].mode = LockMode::Exclusive;
            let is_head = idx == 0;
            let next_not_granted = queue.requests.get(idx + 1).map(|r| !r.granted).unwrap_or(true);
            if is_head && next_not_granted {
                queue.requests[idx].granted = true;
                queue.upgrading = false;
                true
            } else {
                queue.requests[idx].granted = false;
                false
            }
        };
        if immediately_granted {
            drop(table);
            debug!(txn_id, %rid, "lock upgrade granted immediately");
            self.complete_upgrade(txn_id, rid);
            return Ok(());
        }

        let cvar = table.get(&rid).unwrap().cvar.clone();
        loop {
            cvar.wait(&mut table);
            if self.is_aborted(txn_id) {
                if let Some(queue) = table.get_mut(&rid) {
                    queue.upgrading = false;
                }
                self.cleanup_waiter(&mut table, txn_id, rid);
                return Err(TransactionError::abort(txn_id, rid, AbortReason::Deadlock));
            }
            let queue = table.get_mut(&rid).unwrap();
            if queue.requests.front().map(|r| r.txn_id) == Some(txn_id) {
                queue.requests.front_mut().unwrap().granted = true;
                queue.upgrading = false;
                break;
            }
        }
        drop(table);
        debug!(txn_id, %rid, "lock upgrade granted after wait");
        self.complete_upgrade(txn_id, rid);
        Ok(())
    }

    fn complete_upgrade(&self, txn_id: TransactionId, rid: Rid) {
        if let Some(txn) = self.txns.lock().get_mut(&txn_id) {
            txn.shared_lock_set.remove(&rid);
            txn.exclusive_lock_set.insert(rid);
        }
    }

    /// Removes a waiter's own queue entry after it discovers it was
    /// aborted. Only ever touches the caller's own entry.
    fn cleanup_waiter(
        &self,
        table: &mut HashMap<Rid, LockRequestQueue>,
        txn_id: TransactionId,
        rid: Rid,
    ) {
        if let Some(queue) = table.get_mut(&rid) {
            queue.requests.retain(|r| r.txn_id != txn_id);
            if queue.requests.is_empty() {
                table.remove(&rid);
            }
        }
    }

    /// Releases `txn`'s lock on `rid`. Transitions `RepeatableRead`
    /// transactions from `Growing` to `Shrinking` on first release.
    pub fn unlock(&self, txn_id: TransactionId, rid: Rid) -> TransactionResult<()> {
        let mut table = self.latch.lock();
        let queue = match table.get_mut(&rid) {
            Some(q) => q,
            None => {
                drop(table);
                return Err(self.no_lock_held_error(txn_id, rid));
            }
        };
        let pos = match queue.requests.iter().position(|r| r.txn_id == txn_id) {
            Some(p) => p,
            None => {
                drop(table);
                return Err(self.no_lock_held_error(txn_id, rid));
            }
        };
        let removed_mode = queue.requests.remove(pos).unwrap().mode;

        let should_broadcast = match queue.requests.front() {
            Some(front) if !front.granted => true,
            Some(front) => {
                queue.upgrading
                    && front.mode == LockMode::Exclusive
                    && queue.requests.get(1).map(|r| !r.granted).unwrap_or(true)
            }
            None => false,
        };
        let cvar = queue.cvar.clone();
        if queue.requests.is_empty() {
            table.remove(&rid);
        }
        if should_broadcast {
            cvar.notify_all();
        }
        drop(table);

        debug!(txn_id, %rid, "lock released");
        let mut txns = self.txns.lock();
        if let Some(txn) = txns.get_mut(&txn_id) {
            if txn.isolation_level == IsolationLevel::RepeatableRead
                && txn.state == TransactionState::Growing
            {
                txn.state = TransactionState::Shrinking;
            }
            match removed_mode {
                LockMode::Shared => {
                    txn.shared_lock_set.remove(&rid);
                }
                LockMode::Exclusive => {
                    txn.exclusive_lock_set.remove(&rid);
                }
            }
        }
        Ok(())
    }

    fn no_lock_held_error(&self, txn_id: TransactionId, rid: Rid) -> TransactionError {
        if let Some(txn) = self.txns.lock().get_mut(&txn_id) {
            txn.state = TransactionState::Aborted;
        }
        TransactionError::UnlockNotHeld { txn_id, rid }
    }

    /// Snapshot of `(holder, waiter)` edges for the waits-for graph: every
    /// waiter waits on every granted holder of the same key, plus every
    /// other granted holder gets an edge to an in-progress upgrader.
    pub(super) fn waits_for_edges(&self) -> Vec<(TransactionId, TransactionId)> {
        let table = self.latch.lock();
        let mut edges = Vec::new();
        for queue in table.values() {
            let granted: Vec<TransactionId> = queue
                .requests
                .iter()
                .filter(|r| r.granted && !self.is_aborted(r.txn_id))
                .map(|r| r.txn_id)
                .collect();
            let waiting: Vec<TransactionId> = queue
                .requests
                .iter()
                .filter(|r| !r.granted && !self.is_aborted(r.txn_id))
                .map(|r| r.txn_id)
                .collect();
            for &holder in &granted {
                for &waiter in &waiting {
                    if holder != waiter {
                        edges.push((holder, waiter));
                    }
                }
            }
            if queue.upgrading {
                if let Some(upgrader) = queue.requests.iter().find(|r| !r.granted) {
                    for &holder in &granted {
                        if holder != upgrader.txn_id {
                            edges.push((holder, upgrader.txn_id));
                        }
                    }
                }
            }
        }
        edges
    }

    /// Broadcasts the condition variable of the key `txn_id` is currently
    /// waiting on, if any. Used by the deadlock detector after marking a
    /// victim aborted.
    pub(super) fn wake_waiter(&self, txn_id: TransactionId) {
        let table = self.latch.lock();
        for queue in table.values() {
            if queue
                .requests
                .iter()
                .any(|r| r.txn_id == txn_id && !r.granted)
            {
                queue.cvar.notify_all();
            }
        }
    }
}
