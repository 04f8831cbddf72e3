//! Transaction management: strict two-phase locking, isolation levels,
//! and deadlock detection.
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`types`] | Core types: `Transaction`, `IsolationLevel`, `LockMode` |
//! | [`error`] | Transaction-specific error types |
//! | [`manager`] | Transaction lifecycle management |
//! | [`lock_manager`] | Lock acquisition and release |
//! | [`deadlock`] | Deadlock detection and resolution |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use rusty_db::transaction::TransactionManager;
//!
//! let manager = TransactionManager::new();
//! let txn_id = manager.begin();
//! manager.lock_manager().lock_exclusive(txn_id, rid)?;
//! manager.commit(txn_id)?;
//! ```

pub mod deadlock;
pub mod error;
pub mod lock_manager;
pub mod manager;
pub mod types;

pub use deadlock::{DeadlockDetector, DeadlockDetectorConfig};
pub use error::{AbortReason, TransactionError, TransactionResult};
pub use lock_manager::{LockManager, TransactionTable};
pub use manager::TransactionManager;
pub use types::{IsolationLevel, LockMode, Transaction, TransactionState, WriteRecord};
