//! Nested-loop join: materializes both children at `init()` and produces
//! every (left, right) pair whose join predicate holds, iterating right
//! rows for each left row in turn.

use crate::catalog::Schema;
use crate::common::{Rid, Value};
use crate::storage::Tuple;
use crate::Result;

use super::expressions::Expr;
use super::Executor;

pub struct NestedLoopJoinExecutor {
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    predicate: Option<Expr>,
    output_schema: Schema,
    left_rows: Vec<Tuple>,
    right_rows: Vec<Tuple>,
    left_pos: usize,
    right_pos: usize,
}

impl NestedLoopJoinExecutor {
    pub fn new(
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
        predicate: Option<Expr>,
        output_schema: Schema,
    ) -> Self {
        Self {
            left,
            right,
            predicate,
            output_schema,
            left_rows: Vec::new(),
            right_rows: Vec::new(),
            left_pos: 0,
            right_pos: 0,
        }
    }
}

impl Executor for NestedLoopJoinExecutor {
    fn init(&mut self) -> Result<()> {
        self.left.init()?;
        self.right.init()?;
        self.left_rows.clear();
        while let Some((tuple, _)) = self.left.next()? {
            self.left_rows.push(tuple);
        }
        self.right_rows.clear();
        while let Some((tuple, _)) = self.right.next()? {
            self.right_rows.push(tuple);
        }
        self.left_pos = 0;
        self.right_pos = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        loop {
            if self.left_pos >= self.left_rows.len() {
                return Ok(None);
            }
            if self.right_pos >= self.right_rows.len() {
                self.right_pos = 0;
                self.left_pos += 1;
                continue;
            }
            let left = &self.left_rows[self.left_pos];
            let right = &self.right_rows[self.right_pos];
            self.right_pos += 1;

            if let Some(pred) = &self.predicate {
                if !pred.evaluate_join(left, right)?.is_truthy() {
                    continue;
                }
            }
            let mut values: Vec<Value> = left.values.clone();
            values.extend(right.values.clone());
            let rid = left.rid;
            return Ok(Some((Tuple::new(rid, values), rid)));
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}
