//! Transaction-specific error types.
//!
//! This module provides structured error handling for the transaction
//! subsystem using `thiserror` for ergonomic error definitions.

use thiserror::Error;

use crate::common::{Rid, TransactionId};

/// Result type alias for transaction operations.
pub type TransactionResult<T> = std::result::Result<T, TransactionError>;

/// Why a lock-manager call aborted a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// A shared lock was requested under `ReadUncommitted`.
    LockSharedOnReadUncommitted,
    /// A lock was requested after the transaction entered `Shrinking`.
    LockOnShrinking,
    /// Another transaction is already upgrading this key.
    UpgradeConflict,
    /// This transaction was chosen as the deadlock victim.
    Deadlock,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AbortReason::LockSharedOnReadUncommitted => "lock shared on read uncommitted",
            AbortReason::LockOnShrinking => "lock on shrinking",
            AbortReason::UpgradeConflict => "upgrade conflict",
            AbortReason::Deadlock => "deadlock",
        };
        write!(f, "{}", s)
    }
}

/// Comprehensive error type for transaction operations.
#[derive(Debug, Error, Clone)]
pub enum TransactionError {
    #[error("transaction {txn_id} aborted on {rid}: {reason}")]
    Abort {
        txn_id: TransactionId,
        rid: Rid,
        reason: AbortReason,
    },

    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    #[error("transaction {txn_id} attempted to unlock {rid} without holding it")]
    UnlockNotHeld { txn_id: TransactionId, rid: Rid },
}

impl TransactionError {
    pub fn abort(txn_id: TransactionId, rid: Rid, reason: AbortReason) -> Self {
        TransactionError::Abort {
            txn_id,
            rid,
            reason,
        }
    }

    pub fn reason(&self) -> Option<AbortReason> {
        match self {
            TransactionError::Abort { reason, .. } => Some(*reason),
            TransactionError::TransactionNotFound(_) => None,
            TransactionError::UnlockNotHeld { .. } => None,
        }
    }

    pub fn is_deadlock(&self) -> bool {
        matches!(self.reason(), Some(AbortReason::Deadlock))
    }
}
