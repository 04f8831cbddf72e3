//! Transactional concurrency-control core and iterator-model query executors.
//!
//! The lock manager ([`transaction::lock_manager`]) implements strict
//! two-phase locking at row granularity with shared/exclusive modes, lock
//! upgrades, and a background deadlock detector. The executor framework
//! ([`execution`]) pulls rows through a tree of executors, acquiring and
//! releasing locks through the lock manager according to each
//! transaction's isolation level.

pub mod catalog;
pub mod common;
pub mod error;
pub mod execution;
pub mod index;
pub mod storage;
pub mod transaction;

pub use error::{DbError, Result};

use std::time::Duration;

/// Runtime configuration for the concurrency-control core.
#[derive(Debug, Clone)]
pub struct Config {
    /// How often the deadlock detector rebuilds the waits-for graph.
    pub deadlock_detection_interval: Duration,
    /// Whether the background deadlock detector thread runs at all.
    pub deadlock_detection_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            deadlock_detection_interval: Duration::from_millis(50),
            deadlock_detection_enabled: true,
        }
    }
}

/// Initializes a `tracing_subscriber` capture layer exactly once so
/// `debug!`/`warn!` output from the lock manager and detector is visible
/// under `cargo test -- --nocapture`. Safe to call from every test.
#[cfg(test)]
pub(crate) fn init_test_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}
