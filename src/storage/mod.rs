//! Minimal in-memory table storage.
//!
//! Executors never touch a buffer pool or page layout directly in this
//! core; they see a [`TableHeap`] that hands out [`Tuple`]s by [`Rid`].
//! There is no persistence, no page format, and no buffer pool here — the
//! real storage engine is an external collaborator this crate does not
//! implement.

use parking_lot::RwLock;

use crate::common::{Rid, Value};

/// A row of values plus its physical identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    pub rid: Rid,
    pub values: Vec<Value>,
}

impl Tuple {
    pub fn new(rid: Rid, values: Vec<Value>) -> Self {
        Self { rid, values }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

struct Slot {
    tuple: Tuple,
    deleted: bool,
}

/// An append-mostly heap of tuples for a single table.
///
/// Inserts append a new slot and return its `Rid`; deletes tombstone the
/// slot rather than physically removing it (mirroring `MarkDelete` in the
/// original table heap, where physical removal is deferred); updates
/// overwrite a slot's values in place.
pub struct TableHeap {
    page: u64,
    slots: RwLock<Vec<Slot>>,
}

impl TableHeap {
    pub fn new(page: u64) -> Self {
        Self {
            page,
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Inserts a tuple, assigning it a fresh `Rid`. Returns the new `Rid`.
    pub fn insert_tuple(&self, values: Vec<Value>) -> Rid {
        let mut slots = self.slots.write();
        let rid = Rid::new(self.page, slots.len() as u32);
        slots.push(Slot {
            tuple: Tuple::new(rid, values),
            deleted: false,
        });
        rid
    }

    /// Fetches a tuple by `Rid`. Returns `None` if the slot is deleted or
    /// out of range.
    pub fn get_tuple(&self, rid: Rid) -> Option<Tuple> {
        let slots = self.slots.read();
        slots
            .get(rid.slot as usize)
            .filter(|s| !s.deleted)
            .map(|s| s.tuple.clone())
    }

    /// Tombstones the slot at `rid`. Returns `false` if already deleted or
    /// absent.
    pub fn mark_delete(&self, rid: Rid) -> bool {
        let mut slots = self.slots.write();
        match slots.get_mut(rid.slot as usize) {
            Some(s) if !s.deleted => {
                s.deleted = true;
                true
            }
            _ => false,
        }
    }

    /// Overwrites the values at `rid` in place. Returns `false` if the slot
    /// is deleted or absent.
    pub fn update_tuple(&self, rid: Rid, values: Vec<Value>) -> bool {
        let mut slots = self.slots.write();
        match slots.get_mut(rid.slot as usize) {
            Some(s) if !s.deleted => {
                s.tuple = Tuple::new(rid, values);
                true
            }
            _ => false,
        }
    }

    /// Snapshot of all non-deleted tuples in insertion order, for
    /// `SeqScan`'s begin-to-end iteration.
    pub fn iter(&self) -> TableIterator {
        let slots = self.slots.read();
        let tuples = slots
            .iter()
            .filter(|s| !s.deleted)
            .map(|s| s.tuple.clone())
            .collect();
        TableIterator { tuples, pos: 0 }
    }
}

/// A cursor over a [`TableHeap`]'s tuples at the moment `iter()` was
/// called.
pub struct TableIterator {
    tuples: Vec<Tuple>,
    pos: usize,
}

impl Iterator for TableIterator {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        let item = self.tuples.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }
}
