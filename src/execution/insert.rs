//! Insert executor: writes rows into a table heap and maintains every
//! attached index.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::{IndexInfo, Schema};
use crate::common::{Rid, Value};
use crate::storage::{TableHeap, Tuple};
use crate::transaction::WriteRecord;
use crate::Result;

use super::context::ExecutorContext;
use super::Executor;

/// Where insert rows come from: literal values enumerated from the plan,
/// or produced by a child executor.
pub enum InsertSource {
    Raw(Vec<Vec<Value>>),
    Child(Box<dyn Executor>),
}

pub struct InsertExecutor {
    ctx: Arc<ExecutorContext>,
    table: String,
    heap: Arc<TableHeap>,
    indexes: Vec<IndexInfo>,
    source: InsertSource,
    raw_pos: usize,
    rows_inserted: usize,
    output_schema: Schema,
}

impl InsertExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        table: String,
        heap: Arc<TableHeap>,
        indexes: Vec<IndexInfo>,
        source: InsertSource,
        output_schema: Schema,
    ) -> Self {
        Self {
            ctx,
            table,
            heap,
            indexes,
            source,
            raw_pos: 0,
            rows_inserted: 0,
            output_schema,
        }
    }
}

impl Executor for InsertExecutor {
    fn init(&mut self) -> Result<()> {
        debug!(table = %self.table, "insert init");
        self.raw_pos = 0;
        self.rows_inserted = 0;
        if let InsertSource::Child(child) = &mut self.source {
            child.init()?;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let values = match &mut self.source {
            InsertSource::Raw(rows) => {
                if self.raw_pos >= rows.len() {
                    debug!(table = %self.table, rows_inserted = self.rows_inserted, "insert done");
                    return Ok(None);
                }
                let values = rows[self.raw_pos].clone();
                self.raw_pos += 1;
                values
            }
            InsertSource::Child(child) => match child.next()? {
                Some((tuple, _)) => tuple.values,
                None => {
                    debug!(table = %self.table, rows_inserted = self.rows_inserted, "insert done");
                    return Ok(None);
                }
            },
        };

        let rid = self.heap.insert_tuple(values.clone());
        self.ctx.acquire_write_lock(rid)?;
        self.ctx.record_write(WriteRecord::Inserted {
            table: self.table.clone(),
            rid,
        });
        for index in &self.indexes {
            let key = index.project_key(&values);
            index.index.insert_entry(key.clone(), rid, self.ctx.txn_id);
            self.ctx.record_write(WriteRecord::IndexInsert {
                index: index.name.clone(),
                key,
                rid,
            });
        }
        self.rows_inserted += 1;
        Ok(Some((Tuple::new(rid, values), rid)))
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}
