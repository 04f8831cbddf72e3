//! Update executor: recomputes each child row through a set of per-column
//! expressions, rewrites the heap slot in place, and re-keys every index.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::{IndexInfo, Schema};
use crate::common::Rid;
use crate::storage::{TableHeap, Tuple};
use crate::transaction::WriteRecord;
use crate::Result;

use super::context::ExecutorContext;
use super::expressions::Expr;
use super::Executor;

pub struct UpdateExecutor {
    ctx: Arc<ExecutorContext>,
    table: String,
    heap: Arc<TableHeap>,
    indexes: Vec<IndexInfo>,
    child: Box<dyn Executor>,
    assignments: Vec<Expr>,
    output_schema: Schema,
    rows_updated: usize,
}

impl UpdateExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        table: String,
        heap: Arc<TableHeap>,
        indexes: Vec<IndexInfo>,
        child: Box<dyn Executor>,
        assignments: Vec<Expr>,
        output_schema: Schema,
    ) -> Self {
        Self {
            ctx,
            table,
            heap,
            indexes,
            child,
            assignments,
            output_schema,
            rows_updated: 0,
        }
    }
}

impl Executor for UpdateExecutor {
    fn init(&mut self) -> Result<()> {
        debug!(table = %self.table, "update init");
        self.rows_updated = 0;
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let Some((old_tuple, rid)) = self.child.next()? else {
            debug!(table = %self.table, rows_updated = self.rows_updated, "update done");
            return Ok(None);
        };

        self.ctx.acquire_write_lock(rid)?;
        let new_values = self
            .assignments
            .iter()
            .map(|e| e.evaluate(&old_tuple))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.ctx.record_write(WriteRecord::Updated {
            table: self.table.clone(),
            rid,
            previous: old_tuple.values.clone(),
        });
        self.heap.update_tuple(rid, new_values.clone());
        for index in &self.indexes {
            let old_key = index.project_key(&old_tuple.values);
            let new_key = index.project_key(&new_values);
            if old_key != new_key {
                self.ctx.record_write(WriteRecord::IndexDelete {
                    index: index.name.clone(),
                    key: old_key.clone(),
                    rid,
                });
                self.ctx.record_write(WriteRecord::IndexInsert {
                    index: index.name.clone(),
                    key: new_key.clone(),
                    rid,
                });
                index.index.delete_entry(&old_key, rid, self.ctx.txn_id);
                index.index.insert_entry(new_key, rid, self.ctx.txn_id);
            }
        }
        self.rows_updated += 1;
        Ok(Some((Tuple::new(rid, new_values), rid)))
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Column, DataType};
    use crate::common::Value;
    use crate::execution::seq_scan::SeqScanExecutor;
    use crate::index::OrderedIndex;
    use crate::transaction::{IsolationLevel, Transaction, TransactionTable};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    fn ctx() -> Arc<ExecutorContext> {
        let txns: TransactionTable = Arc::new(Mutex::new(HashMap::new()));
        txns.lock().insert(1, Transaction::new(1, IsolationLevel::ReadCommitted));
        Arc::new(ExecutorContext::new(
            1,
            IsolationLevel::ReadCommitted,
            None,
            txns,
            Arc::new(Catalog::new()),
        ))
    }

    fn schema() -> Schema {
        Schema::new(
            "t".to_string(),
            vec![Column {
                name: "id".to_string(),
                data_type: DataType::Integer,
                nullable: false,
            }],
        )
    }

    #[test]
    fn update_rewrites_heap_and_reindexes() {
        let ctx = ctx();
        let heap = Arc::new(TableHeap::new(1));
        let rid = heap.insert_tuple(vec![Value::Integer(1)]);
        let index = Arc::new(OrderedIndex::new());
        index.insert_entry(Value::Integer(1), rid, 1);
        let indexes = vec![IndexInfo {
            name: "idx_id".to_string(),
            key_columns: vec![0],
            index: index.clone(),
        }];

        let scan = Box::new(SeqScanExecutor::new(
            ctx.clone(),
            heap.clone(),
            None,
            vec![Expr::column(0)],
            schema(),
        ));
        let assignments = vec![Expr::binary(
            super::super::expressions::BinaryOperator::Add,
            Expr::column(0),
            Expr::literal(Value::Integer(100)),
        )];
        let mut exec = UpdateExecutor::new(
            ctx,
            "t".to_string(),
            heap.clone(),
            indexes,
            scan,
            assignments,
            schema(),
        );
        exec.init().unwrap();
        let (tuple, _) = exec.next().unwrap().unwrap();
        assert_eq!(tuple.get(0), Some(&Value::Integer(101)));
        assert_eq!(heap.get_tuple(rid).unwrap().get(0), Some(&Value::Integer(101)));
        assert!(index.lookup(&Value::Integer(1)).is_empty());
        assert_eq!(index.lookup(&Value::Integer(101)), vec![rid]);
    }

    #[test]
    fn update_preserving_key_leaves_index_entry_untouched() {
        let ctx = ctx();
        let heap = Arc::new(TableHeap::new(1));
        let rid = heap.insert_tuple(vec![Value::Integer(5)]);
        let index = Arc::new(OrderedIndex::new());
        index.insert_entry(Value::Integer(5), rid, 1);
        let indexes = vec![IndexInfo {
            name: "idx_id".to_string(),
            key_columns: vec![0],
            index: index.clone(),
        }];
        let scan = Box::new(SeqScanExecutor::new(
            ctx.clone(),
            heap.clone(),
            None,
            vec![Expr::column(0)],
            schema(),
        ));
        let assignments = vec![Expr::column(0)];
        let mut exec = UpdateExecutor::new(ctx, "t".to_string(), heap, indexes, scan, assignments, schema());
        exec.init().unwrap();
        exec.next().unwrap();
        assert_eq!(index.lookup(&Value::Integer(5)), vec![rid]);
    }
}
