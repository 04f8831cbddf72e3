//! Limit/offset executor: discards the first `offset` rows from its child,
//! then forwards up to `limit` rows before terminating the stream early.

use tracing::debug;

use crate::catalog::Schema;
use crate::common::Rid;
use crate::storage::Tuple;
use crate::Result;

use super::Executor;

pub struct LimitExecutor {
    child: Box<dyn Executor>,
    offset: usize,
    limit: Option<usize>,
    skipped: usize,
    produced: usize,
}

impl LimitExecutor {
    pub fn new(child: Box<dyn Executor>, offset: usize, limit: Option<usize>) -> Self {
        Self {
            child,
            offset,
            limit,
            skipped: 0,
            produced: 0,
        }
    }
}

impl Executor for LimitExecutor {
    fn init(&mut self) -> Result<()> {
        self.skipped = 0;
        self.produced = 0;
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if let Some(limit) = self.limit {
            if self.produced >= limit {
                return Ok(None);
            }
        }
        while self.skipped < self.offset {
            if self.child.next()?.is_none() {
                return Ok(None);
            }
            self.skipped += 1;
        }
        match self.child.next()? {
            Some(row) => {
                self.produced += 1;
                Ok(Some(row))
            }
            None => {
                debug!(produced = self.produced, "limit exhausted by child");
                Ok(None)
            }
        }
    }

    fn output_schema(&self) -> &Schema {
        self.child.output_schema()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType};
    use crate::common::Value;
    use crate::storage::TableHeap;
    use crate::transaction::{IsolationLevel, Transaction, TransactionTable};
    use crate::catalog::Catalog;
    use crate::execution::context::ExecutorContext;
    use crate::execution::expressions::Expr;
    use crate::execution::seq_scan::SeqScanExecutor;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

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

    fn scan_of(values: &[i64]) -> Box<dyn Executor> {
        let heap = Arc::new(TableHeap::new(1));
        for v in values {
            heap.insert_tuple(vec![Value::Integer(*v)]);
        }
        Box::new(SeqScanExecutor::new(ctx(), heap, None, vec![Expr::column(0)], schema()))
    }

    #[test]
    fn limit_caps_row_count() {
        let mut exec = LimitExecutor::new(scan_of(&[1, 2, 3, 4]), 0, Some(2));
        exec.init().unwrap();
        assert!(exec.next().unwrap().is_some());
        assert!(exec.next().unwrap().is_some());
        assert!(exec.next().unwrap().is_none());
    }

    #[test]
    fn offset_skips_leading_rows() {
        let mut exec = LimitExecutor::new(scan_of(&[1, 2, 3]), 2, None);
        exec.init().unwrap();
        let (tuple, _) = exec.next().unwrap().unwrap();
        assert_eq!(tuple.get(0), Some(&Value::Integer(3)));
        assert!(exec.next().unwrap().is_none());
    }

    #[test]
    fn offset_past_end_yields_nothing() {
        let mut exec = LimitExecutor::new(scan_of(&[1]), 5, Some(10));
        exec.init().unwrap();
        assert!(exec.next().unwrap().is_none());
    }
}
