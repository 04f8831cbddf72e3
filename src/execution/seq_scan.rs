//! Sequential scan: iterates a table heap from begin to end, applying the
//! isolation-dependent read-lock protocol per row.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::Schema;
use crate::common::Rid;
use crate::storage::{TableHeap, TableIterator, Tuple};
use crate::Result;

use super::context::ExecutorContext;
use super::expressions::Expr;
use super::Executor;

pub struct SeqScanExecutor {
    ctx: Arc<ExecutorContext>,
    heap: Arc<TableHeap>,
    predicate: Option<Expr>,
    projections: Vec<Expr>,
    output_schema: Schema,
    iter: Option<TableIterator>,
    rows_scanned: usize,
}

impl SeqScanExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        heap: Arc<TableHeap>,
        predicate: Option<Expr>,
        projections: Vec<Expr>,
        output_schema: Schema,
    ) -> Self {
        Self {
            ctx,
            heap,
            predicate,
            projections,
            output_schema,
            iter: None,
            rows_scanned: 0,
        }
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> Result<()> {
        debug!(table = %self.output_schema.name, "seq scan init");
        self.iter = Some(self.heap.iter());
        self.rows_scanned = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let iter = self.iter.as_mut().expect("next called before init");
        loop {
            let Some(raw) = iter.next() else {
                debug!(
                    table = %self.output_schema.name,
                    rows_scanned = self.rows_scanned,
                    "seq scan exhausted"
                );
                return Ok(None);
            };
            self.rows_scanned += 1;
            self.ctx.acquire_read_lock(raw.rid)?;

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
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::common::Value;
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
            vec![crate::catalog::Column {
                name: "id".to_string(),
                data_type: crate::catalog::DataType::Integer,
                nullable: false,
            }],
        )
    }

    #[test]
    fn scans_all_rows_without_predicate() {
        let heap = Arc::new(TableHeap::new(1));
        heap.insert_tuple(vec![Value::Integer(1)]);
        heap.insert_tuple(vec![Value::Integer(2)]);
        let mut exec = SeqScanExecutor::new(ctx(), heap, None, vec![Expr::column(0)], schema());
        exec.init().unwrap();
        assert!(exec.next().unwrap().is_some());
        assert!(exec.next().unwrap().is_some());
        assert!(exec.next().unwrap().is_none());
    }

    #[test]
    fn predicate_filters_rows() {
        let heap = Arc::new(TableHeap::new(1));
        heap.insert_tuple(vec![Value::Integer(1)]);
        heap.insert_tuple(vec![Value::Integer(2)]);
        let predicate = Expr::binary(
            super::super::expressions::BinaryOperator::Eq,
            Expr::column(0),
            Expr::literal(Value::Integer(2)),
        );
        let mut exec =
            SeqScanExecutor::new(ctx(), heap, Some(predicate), vec![Expr::column(0)], schema());
        exec.init().unwrap();
        let (tuple, _) = exec.next().unwrap().unwrap();
        assert_eq!(tuple.get(0), Some(&Value::Integer(2)));
        assert!(exec.next().unwrap().is_none());
    }
}
