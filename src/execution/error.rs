//! Execution-layer errors: expression evaluation and executor plumbing.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("column index {0} out of bounds")]
    ColumnOutOfBounds(usize),

    #[error("type error: {0}")]
    TypeError(String),

    #[error("division by zero")]
    DivisionByZero,
}
