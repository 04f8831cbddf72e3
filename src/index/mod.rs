//! Minimal ordered index stand-in.
//!
//! The real B+-tree index is an external collaborator this crate does not
//! implement; this module only supplies enough of its surface
//! (`begin_iterator`, `insert_entry`, `delete_entry`) to drive `IndexScan`
//! and `NestedIndexJoin`.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::common::{Rid, TransactionId, Value};

/// A single-key, possibly-duplicate ordered index.
pub struct OrderedIndex {
    entries: RwLock<BTreeMap<Value, Vec<Rid>>>,
}

impl OrderedIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Inserts `(key, rid)`. `txn` is accepted for symmetry with the
    /// original index API but this stand-in does not lock index pages.
    pub fn insert_entry(&self, key: Value, rid: Rid, _txn: TransactionId) {
        self.entries.write().entry(key).or_default().push(rid);
    }

    /// Removes `(key, rid)`, dropping the key entirely once its last rid is
    /// removed.
    pub fn delete_entry(&self, key: &Value, rid: Rid, _txn: TransactionId) {
        let mut entries = self.entries.write();
        if let Some(rids) = entries.get_mut(key) {
            rids.retain(|r| *r != rid);
            if rids.is_empty() {
                entries.remove(key);
            }
        }
    }

    /// Ordered `(key, rid)` pairs from the smallest key, flattening
    /// duplicate-key buckets in insertion order within each key.
    pub fn begin_iterator(&self) -> Vec<(Value, Rid)> {
        self.entries
            .read()
            .iter()
            .flat_map(|(k, rids)| rids.iter().map(move |r| (k.clone(), *r)))
            .collect()
    }

    /// All rids for an exact key match.
    pub fn lookup(&self, key: &Value) -> Vec<Rid> {
        self.entries.read().get(key).cloned().unwrap_or_default()
    }
}

impl Default for OrderedIndex {
    fn default() -> Self {
        Self::new()
    }
}
