//! Index scan: iterates a B+-tree-shaped index from its begin iterator,
//! fetching each matching tuple from the table heap.
//!
//! Unlike sequential scan, index scan never acquires locks — a read-only
//! scan of this kind is assumed to run under a read-only transaction.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::Schema;
use crate::common::{Rid, Value};
use crate::index::OrderedIndex;
use crate::storage::{TableHeap, Tuple};
use crate::Result;

use super::expressions::Expr;
use super::Executor;

pub struct IndexScanExecutor {
    index: Arc<OrderedIndex>,
    heap: Arc<TableHeap>,
    predicate: Option<Expr>,
    projections: Vec<Expr>,
    output_schema: Schema,
    entries: Vec<(Value, Rid)>,
    pos: usize,
}

impl IndexScanExecutor {
    pub fn new(
        index: Arc<OrderedIndex>,
        heap: Arc<TableHeap>,
        predicate: Option<Expr>,
        projections: Vec<Expr>,
        output_schema: Schema,
    ) -> Self {
        Self {
            index,
            heap,
            predicate,
            projections,
            output_schema,
            entries: Vec::new(),
            pos: 0,
        }
    }
}

impl Executor for IndexScanExecutor {
    fn init(&mut self) -> Result<()> {
        debug!(table = %self.output_schema.name, "index scan init");
        self.entries = self.index.begin_iterator();
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        while self.pos < self.entries.len() {
            let (_, rid) = self.entries[self.pos];
            self.pos += 1;
            let Some(raw) = self.heap.get_tuple(rid) else {
                continue;
            };
            if let Some(pred) = &self.predicate {
                if !pred.evaluate(&raw)?.is_truthy() {
                    continue;
                }
            }
            let values = self
                .projections
                .iter()
                .map(|e| e.evaluate(&raw))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            return Ok(Some((Tuple::new(raw.rid, values), raw.rid)));
        }
        debug!(table = %self.output_schema.name, "index scan exhausted");
        Ok(None)
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType};
    use crate::common::Value;

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
    fn yields_rows_in_key_order() {
        let heap = Arc::new(TableHeap::new(1));
        let r1 = heap.insert_tuple(vec![Value::Integer(20)]);
        let r2 = heap.insert_tuple(vec![Value::Integer(10)]);
        let index = Arc::new(OrderedIndex::new());
        index.insert_entry(Value::Integer(20), r1, 1);
        index.insert_entry(Value::Integer(10), r2, 1);

        let mut exec =
            IndexScanExecutor::new(index, heap, None, vec![Expr::column(0)], schema());
        exec.init().unwrap();
        let (first, _) = exec.next().unwrap().unwrap();
        assert_eq!(first.get(0), Some(&Value::Integer(10)));
        let (second, _) = exec.next().unwrap().unwrap();
        assert_eq!(second.get(0), Some(&Value::Integer(20)));
        assert!(exec.next().unwrap().is_none());
    }

    #[test]
    fn skips_entries_for_deleted_tuples() {
        let heap = Arc::new(TableHeap::new(1));
        let r1 = heap.insert_tuple(vec![Value::Integer(1)]);
        heap.mark_delete(r1);
        let index = Arc::new(OrderedIndex::new());
        index.insert_entry(Value::Integer(1), r1, 1);

        let mut exec =
            IndexScanExecutor::new(index, heap, None, vec![Expr::column(0)], schema());
        exec.init().unwrap();
        assert!(exec.next().unwrap().is_none());
    }
}
