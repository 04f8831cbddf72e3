//! Delete executor: tombstones rows from a child stream and removes their
//! index entries. Produces no visible output — `next()` drains the child
//! to completion as a side effect and always returns `None`.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::{IndexInfo, Schema};
use crate::common::Rid;
use crate::storage::{TableHeap, Tuple};
use crate::transaction::WriteRecord;
use crate::Result;

use super::context::ExecutorContext;
use super::Executor;

pub struct DeleteExecutor {
    ctx: Arc<ExecutorContext>,
    table: String,
    heap: Arc<TableHeap>,
    indexes: Vec<IndexInfo>,
    child: Box<dyn Executor>,
    output_schema: Schema,
    done: bool,
    rows_deleted: usize,
}

impl DeleteExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        table: String,
        heap: Arc<TableHeap>,
        indexes: Vec<IndexInfo>,
        child: Box<dyn Executor>,
        output_schema: Schema,
    ) -> Self {
        Self {
            ctx,
            table,
            heap,
            indexes,
            child,
            output_schema,
            done: false,
            rows_deleted: 0,
        }
    }
}

impl Executor for DeleteExecutor {
    fn init(&mut self) -> Result<()> {
        debug!(table = %self.table, "delete init");
        self.done = false;
        self.rows_deleted = 0;
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.done {
            return Ok(None);
        }
        while let Some((tuple, rid)) = self.child.next()? {
            self.ctx.acquire_write_lock(rid)?;
            self.ctx.record_write(WriteRecord::Deleted {
                table: self.table.clone(),
                rid,
                previous: tuple.values.clone(),
            });
            self.heap.mark_delete(rid);
            for index in &self.indexes {
                let key = index.project_key(&tuple.values);
                self.ctx.record_write(WriteRecord::IndexDelete {
                    index: index.name.clone(),
                    key: key.clone(),
                    rid,
                });
                index.index.delete_entry(&key, rid, self.ctx.txn_id);
            }
            self.rows_deleted += 1;
        }
        self.done = true;
        debug!(table = %self.table, rows_deleted = self.rows_deleted, "delete done");
        Ok(None)
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}
