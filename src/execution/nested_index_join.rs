//! Nested-loop join whose inner side is materialized through a named
//! index's full iterator rather than a table scan: for each outer row,
//! the join predicate is evaluated generically against every inner row
//! reachable through the index, exactly as a plain nested-loop join would
//! evaluate it against a scanned inner table.

use std::sync::Arc;

use crate::catalog::Schema;
use crate::common::{Rid, Value};
use crate::index::OrderedIndex;
use crate::storage::{TableHeap, Tuple};
use crate::Result;

use super::expressions::Expr;
use super::Executor;

pub struct NestedIndexJoinExecutor {
    outer: Box<dyn Executor>,
    inner_heap: Arc<TableHeap>,
    inner_index: Arc<OrderedIndex>,
    predicate: Option<Expr>,
    output_schema: Schema,
    inner_tuples: Vec<Tuple>,
    current_outer: Option<Tuple>,
    inner_pos: usize,
}

impl NestedIndexJoinExecutor {
    pub fn new(
        outer: Box<dyn Executor>,
        inner_heap: Arc<TableHeap>,
        inner_index: Arc<OrderedIndex>,
        predicate: Option<Expr>,
        output_schema: Schema,
    ) -> Self {
        Self {
            outer,
            inner_heap,
            inner_index,
            predicate,
            output_schema,
            inner_tuples: Vec::new(),
            current_outer: None,
            inner_pos: 0,
        }
    }

    fn advance_outer(&mut self) -> Result<bool> {
        let Some((tuple, _)) = self.outer.next()? else {
            self.current_outer = None;
            return Ok(false);
        };
        self.inner_pos = 0;
        self.current_outer = Some(tuple);
        Ok(true)
    }
}

impl Executor for NestedIndexJoinExecutor {
    fn init(&mut self) -> Result<()> {
        self.outer.init()?;
        self.inner_tuples = self
            .inner_index
            .begin_iterator()
            .into_iter()
            .filter_map(|(_, rid)| self.inner_heap.get_tuple(rid))
            .collect();
        self.current_outer = None;
        self.inner_pos = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        loop {
            if self.current_outer.is_none() && !self.advance_outer()? {
                return Ok(None);
            }
            if self.inner_pos >= self.inner_tuples.len() {
                if !self.advance_outer()? {
                    return Ok(None);
                }
                continue;
            }

            let inner_tuple = &self.inner_tuples[self.inner_pos];
            self.inner_pos += 1;
            let outer_tuple = self.current_outer.as_ref().expect("checked above");

            if let Some(pred) = &self.predicate {
                if !pred.evaluate_join(outer_tuple, inner_tuple)?.is_truthy() {
                    continue;
                }
            }

            let mut values: Vec<Value> = outer_tuple.values.clone();
            values.extend(inner_tuple.values.clone());
            let result_rid = outer_tuple.rid;
            return Ok(Some((Tuple::new(result_rid, values), result_rid)));
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Column, DataType};
    use crate::execution::context::ExecutorContext;
    use crate::execution::expressions::BinaryOperator;
    use crate::execution::seq_scan::SeqScanExecutor;
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

    fn schema(name: &str) -> Schema {
        Schema::new(
            name.to_string(),
            vec![Column {
                name: "id".to_string(),
                data_type: DataType::Integer,
                nullable: false,
            }],
        )
    }

    fn equi_join_predicate() -> Expr {
        Expr::binary(BinaryOperator::Eq, Expr::column(0), Expr::column(1))
    }

    #[test]
    fn joins_outer_rows_through_inner_index() {
        let outer_heap = Arc::new(TableHeap::new(1));
        outer_heap.insert_tuple(vec![Value::Integer(1)]);
        outer_heap.insert_tuple(vec![Value::Integer(2)]);
        let outer = Box::new(SeqScanExecutor::new(
            ctx(),
            outer_heap,
            None,
            vec![Expr::column(0)],
            schema("outer"),
        ));

        let inner_heap = Arc::new(TableHeap::new(2));
        let r1 = inner_heap.insert_tuple(vec![Value::Integer(1), Value::String("match".to_string())]);
        let inner_index = Arc::new(OrderedIndex::new());
        inner_index.insert_entry(Value::Integer(1), r1, 1);

        let mut exec = NestedIndexJoinExecutor::new(
            outer,
            inner_heap,
            inner_index,
            Some(equi_join_predicate()),
            schema("joined"),
        );
        exec.init().unwrap();
        let (tuple, _) = exec.next().unwrap().unwrap();
        assert_eq!(tuple.get(0), Some(&Value::Integer(1)));
        assert_eq!(tuple.get(1), Some(&Value::Integer(1)));
        assert_eq!(tuple.get(2), Some(&Value::String("match".to_string())));
        assert!(exec.next().unwrap().is_none());
    }

    #[test]
    fn outer_row_with_no_inner_match_produces_nothing() {
        let outer_heap = Arc::new(TableHeap::new(1));
        outer_heap.insert_tuple(vec![Value::Integer(99)]);
        let outer = Box::new(SeqScanExecutor::new(
            ctx(),
            outer_heap,
            None,
            vec![Expr::column(0)],
            schema("outer"),
        ));
        let inner_heap = Arc::new(TableHeap::new(2));
        let inner_index = Arc::new(OrderedIndex::new());
        let mut exec = NestedIndexJoinExecutor::new(
            outer,
            inner_heap,
            inner_index,
            Some(equi_join_predicate()),
            schema("joined"),
        );
        exec.init().unwrap();
        assert!(exec.next().unwrap().is_none());
    }

    #[test]
    fn non_equi_predicate_matches_across_the_full_materialized_inner_set() {
        let outer_heap = Arc::new(TableHeap::new(1));
        outer_heap.insert_tuple(vec![Value::Integer(5)]);
        let outer = Box::new(SeqScanExecutor::new(
            ctx(),
            outer_heap,
            None,
            vec![Expr::column(0)],
            schema("outer"),
        ));

        let inner_heap = Arc::new(TableHeap::new(2));
        let r1 = inner_heap.insert_tuple(vec![Value::Integer(1)]);
        let r2 = inner_heap.insert_tuple(vec![Value::Integer(9)]);
        let inner_index = Arc::new(OrderedIndex::new());
        inner_index.insert_entry(Value::Integer(1), r1, 1);
        inner_index.insert_entry(Value::Integer(9), r2, 1);

        // A point lookup keyed on the outer value would find nothing in
        // the index (no entry equals 5); a range predicate like this one
        // only matches by scanning every materialized inner row.
        let predicate = Expr::binary(BinaryOperator::Lt, Expr::column(1), Expr::column(0));
        let mut exec = NestedIndexJoinExecutor::new(
            outer,
            inner_heap,
            inner_index,
            Some(predicate),
            schema("joined"),
        );
        exec.init().unwrap();
        let (tuple, _) = exec.next().unwrap().unwrap();
        assert_eq!(tuple.get(1), Some(&Value::Integer(1)));
        assert!(exec.next().unwrap().is_none());
    }
}
