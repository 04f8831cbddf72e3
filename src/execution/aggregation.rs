//! Hash aggregation: drains its child at `init()` into a group-by table,
//! folding each group's aggregate calls incrementally, then emits one
//! projected row per surviving group at `next()`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::catalog::Schema;
use crate::common::{Rid, Value};
use crate::storage::Tuple;
use crate::Result;

use super::expressions::Expr;
use super::Executor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
}

#[derive(Debug, Clone)]
pub struct AggregateCall {
    pub function: AggregateFunction,
    pub arg: Expr,
}

impl AggregateCall {
    pub fn new(function: AggregateFunction, arg: Expr) -> Self {
        Self { function, arg }
    }
}

#[derive(Clone)]
struct AccumulatorState {
    count: i64,
    sum: Option<Value>,
    min: Option<Value>,
    max: Option<Value>,
}

impl AccumulatorState {
    fn new() -> Self {
        Self {
            count: 0,
            sum: None,
            min: None,
            max: None,
        }
    }

    fn fold(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }
        self.count += 1;
        self.sum = Some(match (&self.sum, value) {
            (None, v) => v.clone(),
            (Some(Value::Integer(a)), Value::Integer(b)) => Value::Integer(a + b),
            (Some(a), b) => Value::Float(as_f64(a) + as_f64(b)),
        });
        self.min = Some(match &self.min {
            None => value.clone(),
            Some(m) if value < m => value.clone(),
            Some(m) => m.clone(),
        });
        self.max = Some(match &self.max {
            None => value.clone(),
            Some(m) if value > m => value.clone(),
            Some(m) => m.clone(),
        });
    }

    fn result(&self, function: AggregateFunction, rows_in_group: i64) -> Value {
        match function {
            AggregateFunction::CountStar => Value::Integer(rows_in_group),
            AggregateFunction::Count => Value::Integer(self.count),
            AggregateFunction::Sum => self.sum.clone().unwrap_or(Value::Null),
            AggregateFunction::Min => self.min.clone().unwrap_or(Value::Null),
            AggregateFunction::Max => self.max.clone().unwrap_or(Value::Null),
        }
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Integer(i) => *i as f64,
        Value::Float(f) => *f,
        _ => 0.0,
    }
}

struct Group {
    key: Vec<Value>,
    rows: i64,
    accumulators: Vec<AccumulatorState>,
}

pub struct AggregationExecutor {
    child: Box<dyn Executor>,
    group_by: Vec<Expr>,
    aggregates: Vec<AggregateCall>,
    having: Option<Expr>,
    output_schema: Schema,
    groups: Vec<Group>,
    pos: usize,
}

impl AggregationExecutor {
    pub fn new(
        child: Box<dyn Executor>,
        group_by: Vec<Expr>,
        aggregates: Vec<AggregateCall>,
        having: Option<Expr>,
        output_schema: Schema,
    ) -> Self {
        Self {
            child,
            group_by,
            aggregates,
            having,
            output_schema,
            groups: Vec::new(),
            pos: 0,
        }
    }
}

impl Executor for AggregationExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        let mut order: Vec<Vec<Value>> = Vec::new();
        let mut table: HashMap<Vec<Value>, Group> = HashMap::new();

        while let Some((tuple, _)) = self.child.next()? {
            let key = self
                .group_by
                .iter()
                .map(|e| e.evaluate(&tuple))
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let group = table.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                Group {
                    key: key.clone(),
                    rows: 0,
                    accumulators: self.aggregates.iter().map(|_| AccumulatorState::new()).collect(),
                }
            });
            group.rows += 1;
            for (acc, call) in group.accumulators.iter_mut().zip(&self.aggregates) {
                let value = call.arg.evaluate(&tuple)?;
                acc.fold(&value);
            }
        }

        self.groups = order
            .into_iter()
            .map(|key| table.remove(&key).expect("key present from insertion"))
            .collect();
        self.pos = 0;
        debug!(groups = self.groups.len(), "aggregation built group table");
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        while self.pos < self.groups.len() {
            let group = &self.groups[self.pos];
            self.pos += 1;

            let mut values = group.key.clone();
            for (call, acc) in self.aggregates.iter().zip(&group.accumulators) {
                values.push(acc.result(call.function, group.rows));
            }
            let row = Tuple::new(Rid::new(0, (self.pos - 1) as u32), values);

            if let Some(having) = &self.having {
                if !having.evaluate(&row)?.is_truthy() {
                    continue;
                }
            }
            return Ok(Some((row.clone(), row.rid)));
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}
