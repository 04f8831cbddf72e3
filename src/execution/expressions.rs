//! Expression evaluation for predicates, projections, and join
//! conditions.
//!
//! Expressions are evaluated against either a single tuple (scans,
//! mutations) or a pair of tuples produced by a join; column indices in
//! the pair case address the left tuple first, then the right.

use crate::common::Value;
use crate::storage::Tuple;

use super::error::ExecutionError;

pub type ExprResult<T> = std::result::Result<T, ExecutionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(usize),
    Literal(Value),
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn column(index: usize) -> Self {
        Expr::Column(index)
    }

    pub fn literal(value: Value) -> Self {
        Expr::Literal(value)
    }

    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Evaluates against a single tuple (scans, mutation predicates).
    pub fn evaluate(&self, tuple: &Tuple) -> ExprResult<Value> {
        match self {
            Expr::Column(i) => tuple
                .get(*i)
                .cloned()
                .ok_or(ExecutionError::ColumnOutOfBounds(*i)),
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Binary { op, left, right } => {
                apply(*op, left.evaluate(tuple)?, right.evaluate(tuple)?)
            }
        }
    }

    /// Evaluates against a joined (left, right) tuple pair. Column
    /// indices less than `left.values.len()` address the left tuple; the
    /// remainder address the right tuple.
    pub fn evaluate_join(&self, left: &Tuple, right: &Tuple) -> ExprResult<Value> {
        match self {
            Expr::Column(i) => {
                if *i < left.values.len() {
                    Ok(left.values[*i].clone())
                } else {
                    right
                        .values
                        .get(*i - left.values.len())
                        .cloned()
                        .ok_or(ExecutionError::ColumnOutOfBounds(*i))
                }
            }
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Binary { op, left: l, right: r } => apply(
                *op,
                l.evaluate_join(left, right)?,
                r.evaluate_join(left, right)?,
            ),
        }
    }
}

fn apply(op: BinaryOperator, left: Value, right: Value) -> ExprResult<Value> {
    use BinaryOperator::*;
    match op {
        Eq => Ok(Value::Boolean(left == right)),
        NotEq => Ok(Value::Boolean(left != right)),
        Lt => Ok(Value::Boolean(left < right)),
        Lte => Ok(Value::Boolean(left <= right)),
        Gt => Ok(Value::Boolean(left > right)),
        Gte => Ok(Value::Boolean(left >= right)),
        And => Ok(Value::Boolean(left.is_truthy() && right.is_truthy())),
        Or => Ok(Value::Boolean(left.is_truthy() || right.is_truthy())),
        Add | Sub | Mul | Div => arithmetic(op, left, right),
    }
}

fn arithmetic(op: BinaryOperator, left: Value, right: Value) -> ExprResult<Value> {
    use BinaryOperator::*;
    if let (Value::Integer(a), Value::Integer(b)) = (&left, &right) {
        return match op {
            Add => Ok(Value::Integer(a + b)),
            Sub => Ok(Value::Integer(a - b)),
            Mul => Ok(Value::Integer(a * b)),
            Div if *b == 0 => Err(ExecutionError::DivisionByZero),
            Div => Ok(Value::Integer(a / b)),
            _ => unreachable!(),
        };
    }
    let a = as_f64(&left)?;
    let b = as_f64(&right)?;
    match op {
        Add => Ok(Value::Float(a + b)),
        Sub => Ok(Value::Float(a - b)),
        Mul => Ok(Value::Float(a * b)),
        Div if b == 0.0 => Err(ExecutionError::DivisionByZero),
        Div => Ok(Value::Float(a / b)),
        _ => unreachable!(),
    }
}

fn as_f64(value: &Value) -> ExprResult<f64> {
    match value {
        Value::Integer(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(ExecutionError::TypeError(format!(
            "expected a numeric value, got {}",
            other.type_name()
        ))),
    }
}
